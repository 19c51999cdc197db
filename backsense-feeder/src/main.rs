//! backsense: replay recorded Backsense CAN traffic through the decoder.
//!
//! Supports:
//! - Decoding a frame log and printing every detection record
//! - Tracking a frame log into the slot store and printing the final table
//! - Showing or initializing the bus layout configuration

use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser, Subcommand};
use comfy_table::{Cell, Table};
use log::info;

use backsense_core::config::{self, Config};
use backsense_core::{
    BacksenseError, DetectionRecord, FrameDecoder, IdLayout, RawFrame, SharedSlotStore,
};

mod capture;
mod replay;

use capture::FrameReader;
use replay::ReplayStats;

#[derive(Parser)]
#[command(
    name = "backsense",
    version,
    about = "Backsense radar CAN frame decoder"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a CAN frame log and print each detection
    Decode {
        /// candump log file, or `-` for stdin
        file: PathBuf,

        /// Print one JSON object per detection
        #[arg(long)]
        json: bool,

        /// Stop at the first rejected frame
        #[arg(long)]
        strict: bool,

        /// Config file (defaults to ~/.backsense/config.yaml)
        #[arg(long, env = "BACKSENSE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Replay a CAN frame log into the slot store and print the table
    Track {
        /// candump log file, or `-` for stdin
        file: PathBuf,

        /// Number of sensors on the bus (overrides config)
        #[arg(long)]
        sensors: Option<usize>,

        /// Config file (defaults to ~/.backsense/config.yaml)
        #[arg(long, env = "BACKSENSE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Decode {
            file,
            json,
            strict,
            config,
        } => cmd_decode(&file, json, strict, config.as_deref()),
        Commands::Track {
            file,
            sensors,
            config,
        } => cmd_track(&file, sensors, config.as_deref()),
        Commands::Config { init } => cmd_config(init),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Layout from the config file, with an optional sensor count override.
fn resolve_layout(config_path: Option<&Path>, sensors: Option<usize>) -> anyhow::Result<IdLayout> {
    let mut config = match config_path {
        Some(path) => config::load_config_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => config::load_config(),
    };
    if let Some(n) = sensors {
        config.bus.sensors = n;
    }
    Ok(config.layout()?)
}

fn read_log(file: &Path) -> anyhow::Result<Vec<RawFrame>> {
    let log = FrameReader::new(file)
        .read_all()
        .with_context(|| format!("reading {}", file.display()))?;
    if log.malformed > 0 {
        eprintln!("Skipped {} malformed lines", log.malformed);
    }
    info!("read {} frames from {}", log.frames.len(), file.display());
    Ok(log.frames)
}

fn cmd_decode(
    file: &Path,
    json: bool,
    strict: bool,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let decoder = FrameDecoder::new(resolve_layout(config_path, None)?);
    let frames = read_log(file)?;

    let mut stats = ReplayStats::default();
    for (i, frame) in frames.iter().enumerate() {
        match decoder.decode(frame) {
            Ok(record) => {
                print_record(&record, json)?;
                stats.record(Ok(()));
            }
            Err(e) if strict => {
                return Err(strict_failure(i, frame, e.into()));
            }
            Err(e) => stats.record(Err(e)),
        }
    }

    eprintln!("{stats}");
    Ok(())
}

fn strict_failure(index: usize, frame: &RawFrame, err: BacksenseError) -> anyhow::Error {
    anyhow::Error::new(err).context(format!("frame {} (id {:#x}) rejected", index + 1, frame.id))
}

fn print_record(record: &DetectionRecord, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(record)?);
    } else {
        println!("{record}");
    }
    Ok(())
}

fn cmd_track(file: &Path, sensors: Option<usize>, config_path: Option<&Path>) -> anyhow::Result<()> {
    let layout = resolve_layout(config_path, sensors)?;
    let decoder = FrameDecoder::new(layout);
    let store = SharedSlotStore::new(layout.sensors);
    let frames = read_log(file)?;

    // The producer owns the write side; this thread only reads.
    let producer = {
        let store = store.clone();
        thread::spawn(move || replay::replay_into(&frames, &decoder, &store))
    };
    let stats = producer
        .join()
        .map_err(|_| anyhow!("replay thread panicked"))?;

    let snapshot = store.snapshot();
    for sensor in 0..layout.sensors {
        println!("Sensor {sensor}");
        print_row(&snapshot.row(sensor)[..layout.objects_per_sensor]);
    }

    eprintln!("{stats}");
    eprintln!(
        "{} occupied slots, {} staleness resets",
        snapshot.occupied(),
        snapshot.reset_count()
    );
    Ok(())
}

fn print_row(row: &[Option<DetectionRecord>]) {
    let mut table = Table::new();
    table.set_header(vec![
        "Id",
        "Radius",
        "Angle",
        "X Coord",
        "Y Coord",
        "Relative Speed",
        "Signal Power",
        "Object Id",
        "Appearance",
        "Trigger",
        "Detection",
    ]);

    for cell in row {
        match cell {
            Some(r) => table.add_row(vec![
                Cell::new(r.hex_id()),
                Cell::new(format!("{:.2}", r.polar_radius)),
                Cell::new(r.polar_angle),
                Cell::new(format!("{:.2}", r.x)),
                Cell::new(format!("{:.2}", r.y)),
                Cell::new(format!("{:.1}", r.relative_speed)),
                Cell::new(r.signal_power),
                Cell::new(r.object_id),
                Cell::new(r.appearance_status),
                Cell::new(r.trigger_event),
                Cell::new(r.detection_flag),
            ]),
            None => table.add_row(vec![Cell::new("-"); 11]),
        };
    }

    println!("{table}");
}

fn cmd_config(init: bool) -> anyhow::Result<()> {
    if init {
        let path = config::save_config(&Config::default())?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let path = config::config_file();
    let config = config::load_config();
    let layout = config.layout()?;
    println!("# {}", path.display());
    print!("{}", config::render_config(&config)?);
    println!(
        "# detection ids {:#x}..{:#x}",
        layout.base_id,
        layout.window_end()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
