//! Shared constants, frame/record types, and error enums for backsense-core.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

/// Every detection frame carries exactly this many payload bytes.
pub const PAYLOAD_LEN: usize = 8;

/// Identifier of object 0 on sensor 0.
pub const BASE_ID: u32 = 0x310;

/// Identifier distance between consecutive sensors.
pub const ID_STRIDE: u32 = 0x10;

/// Most sensors a single bus can carry.
pub const MAX_SENSORS: usize = 8;

/// Most objects a sensor reports at once.
pub const MAX_OBJECTS_PER_SENSOR: usize = 8;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Per-frame decode outcome. Both variants are routine on a busy bus: the
/// caller drops the frame and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("wrong frame length: expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: i32 },
    #[error("identifier {0:#x} is not a detection frame")]
    UnrecognizedId(u32),
}

/// All errors produced by backsense-core.
#[derive(Debug, Error)]
pub enum BacksenseError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("invalid identifier layout: {0}")]
    InvalidLayout(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BacksenseError>;

// ---------------------------------------------------------------------------
// Raw frames
// ---------------------------------------------------------------------------

/// One frame as delivered by the bus transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    pub id: u32,
    pub payload: [u8; PAYLOAD_LEN],
    /// Data length reported by the transport. Anything but 8 is rejected.
    pub byte_count: i32,
}

impl RawFrame {
    /// Full-length frame.
    pub fn new(id: u32, payload: [u8; PAYLOAD_LEN]) -> Self {
        RawFrame {
            id,
            payload,
            byte_count: PAYLOAD_LEN as i32,
        }
    }

    /// Build from a transport buffer of any length.
    ///
    /// Short buffers are zero-padded and keep their real byte count, so the
    /// decoder rejects them. Bytes past the eighth are not stored.
    pub fn from_bytes(id: u32, data: &[u8]) -> Self {
        let mut payload = [0u8; PAYLOAD_LEN];
        let n = data.len().min(PAYLOAD_LEN);
        payload[..n].copy_from_slice(&data[..n]);
        RawFrame {
            id,
            payload,
            byte_count: i32::try_from(data.len()).unwrap_or(i32::MAX),
        }
    }

    /// The bytes the transport actually delivered.
    pub fn data(&self) -> &[u8] {
        let n = usize::try_from(self.byte_count)
            .unwrap_or(0)
            .min(PAYLOAD_LEN);
        &self.payload[..n]
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// Storage address of one object's latest reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Slot {
    pub sensor: usize,
    pub object: usize,
}

impl Slot {
    pub fn new(sensor: usize, object: usize) -> Self {
        Slot { sensor, object }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sensor {} / object {}", self.sensor, self.object)
    }
}

// ---------------------------------------------------------------------------
// Detection record
// ---------------------------------------------------------------------------

/// Physical quantities decoded from one detection frame.
///
/// Built once per successful decode and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionRecord {
    /// Source frame identifier.
    pub id: u32,
    /// Distance to the object [m].
    pub polar_radius: f64,
    /// Bearing of the object [deg], negative to the left.
    pub polar_angle: i32,
    /// Longitudinal position [m].
    pub x: f64,
    /// Lateral position [m].
    pub y: f64,
    /// Closing speed, sign and unit per sensor calibration.
    pub relative_speed: f64,
    pub signal_power: i32,
    pub object_id: i32,
    pub appearance_status: i32,
    pub trigger_event: i32,
    pub detection_flag: i32,
}

impl DetectionRecord {
    /// Identifier as lowercase hex, without prefix.
    pub fn hex_id(&self) -> String {
        format!("{:x}", self.id)
    }
}

impl fmt::Display for DetectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Id: {}", self.hex_id())?;
        writeln!(f, "Polar Radius: {}", self.polar_radius)?;
        writeln!(f, "Polar Angle: {}", self.polar_angle)?;
        writeln!(f, "X: {}", self.x)?;
        writeln!(f, "Y: {}", self.y)?;
        writeln!(f, "Relative Speed: {}", self.relative_speed)?;
        writeln!(f, "Signal Power: {}", self.signal_power)?;
        writeln!(f, "Object Id: {}", self.object_id)?;
        writeln!(f, "Object Appearance: {}", self.appearance_status)?;
        writeln!(f, "Trigger Event: {}", self.trigger_event)?;
        writeln!(f, "Detection Flag: {}", self.detection_flag)?;
        write!(f, "----------------------------------------")
    }
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Decode a hex string into bytes. Case-insensitive, must be even length.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for chunk in hex.as_bytes().chunks(2) {
        let high = hex_digit(chunk[0])?;
        let low = hex_digit(chunk[1])?;
        bytes.push((high << 4) | low);
    }
    Some(bytes)
}

/// Format payload bytes as space-separated uppercase hex, e.g. `10 44 00 6C`.
pub fn format_payload(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 3);
    for (i, &b) in data.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    s
}

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
