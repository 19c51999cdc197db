//! Read CAN frame logs.
//!
//! Accepted line formats (as written by can-utils):
//! - `(1700000000.123456) can0 310#1044086C82220000`   candump -l
//! - `  can0  310   [8]  10 44 08 6C 82 22 00 00`       candump
//! - `310#1044086C82220000`                            bare
//!
//! Blank lines and `#` comments are skipped. Malformed lines are counted.

use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use backsense_core::types::{hex_decode, BacksenseError, RawFrame, Result};

/// Largest data length any CAN frame can declare (CAN FD).
const MAX_DATA_LEN: usize = 64;

/// Frames read from one log, plus how many lines could not be parsed.
#[derive(Debug, Default)]
pub struct FrameLog {
    pub frames: Vec<RawFrame>,
    pub malformed: usize,
}

/// Read frames from a log file, or stdin when the path is `-`.
pub struct FrameReader {
    path: PathBuf,
}

impl FrameReader {
    pub fn new(path: &Path) -> Self {
        FrameReader {
            path: path.to_path_buf(),
        }
    }

    pub fn read_all(&self) -> io::Result<FrameLog> {
        if self.path.as_os_str() == "-" {
            read_frames(io::stdin().lock())
        } else {
            read_frames(BufReader::new(fs::File::open(&self.path)?))
        }
    }
}

/// Parse every line of `reader`.
pub fn read_frames<R: BufRead>(reader: R) -> io::Result<FrameLog> {
    let mut log = FrameLog::default();
    for (i, line) in reader.lines().enumerate() {
        match parse_frame_line(&line?) {
            Ok(Some(frame)) => log.frames.push(frame),
            Ok(None) => {}
            Err(e) => {
                log::debug!("line {}: {e}", i + 1);
                log.malformed += 1;
            }
        }
    }
    Ok(log)
}

/// Parse one log line. `Ok(None)` for blank lines and comments.
pub fn parse_frame_line(line: &str) -> Result<Option<RawFrame>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut tokens: Vec<&str> = line.split_whitespace().collect();
    // candump -l timestamp
    if tokens.first().is_some_and(|t| t.starts_with('(')) {
        tokens.remove(0);
    }

    if let Some(compact) = tokens.iter().find(|t| t.contains('#')) {
        return parse_compact(compact).map(Some);
    }

    let len_pos = tokens
        .iter()
        .position(|t| t.starts_with('[') && t.ends_with(']'))
        .ok_or_else(|| invalid(line, "no frame found"))?;
    if len_pos == 0 {
        return Err(invalid(line, "missing identifier"));
    }
    let id = parse_id(tokens[len_pos - 1]).ok_or_else(|| invalid(line, "bad identifier"))?;
    let declared: usize = tokens[len_pos]
        .trim_matches(|c| c == '[' || c == ']')
        .parse()
        .map_err(|_| invalid(line, "bad length"))?;
    if declared > MAX_DATA_LEN {
        return Err(invalid(line, "bad length"));
    }

    let mut data = Vec::with_capacity(declared);
    for tok in &tokens[len_pos + 1..] {
        if tok.len() != 2 {
            return Err(invalid(line, "bad data byte"));
        }
        let byte = hex_decode(tok).ok_or_else(|| invalid(line, "bad data byte"))?;
        data.extend(byte);
    }
    if data.len() != declared {
        return Err(invalid(line, "length does not match data"));
    }
    Ok(Some(RawFrame::from_bytes(id, &data)))
}

/// `ID#DATA`, data optionally dotted (`10.44.08`).
fn parse_compact(token: &str) -> Result<RawFrame> {
    let (id, data) = token
        .split_once('#')
        .ok_or_else(|| invalid(token, "missing '#'"))?;
    let id = parse_id(id).ok_or_else(|| invalid(token, "bad identifier"))?;
    if data.starts_with(['R', 'r']) {
        return Err(invalid(token, "remote frame"));
    }
    let data: String = data.chars().filter(|&c| c != '.').collect();
    let bytes = hex_decode(&data).ok_or_else(|| invalid(token, "bad data"))?;
    Ok(RawFrame::from_bytes(id, &bytes))
}

fn parse_id(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 8 {
        return None;
    }
    u32::from_str_radix(s, 16).ok()
}

fn invalid(line: &str, why: &str) -> BacksenseError {
    BacksenseError::InvalidFrame(format!("{why}: {line:?}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PAYLOAD: [u8; 8] = [0x10, 0x44, 0x08, 0x6C, 0x82, 0x22, 0x00, 0x00];

    #[test]
    fn test_parse_candump_log_line() {
        let frame = parse_frame_line("(1700000000.123456) can0 310#1044086C82220000")
            .unwrap()
            .unwrap();
        assert_eq!(frame, RawFrame::new(0x310, PAYLOAD));
    }

    #[test]
    fn test_parse_bare_line() {
        let frame = parse_frame_line("325#1044086c82220000").unwrap().unwrap();
        assert_eq!(frame.id, 0x325);
        assert_eq!(frame.byte_count, 8);
    }

    #[test]
    fn test_parse_dotted_data() {
        let frame = parse_frame_line("310#10.44.08.6C.82.22.00.00")
            .unwrap()
            .unwrap();
        assert_eq!(frame.payload, PAYLOAD);
    }

    #[test]
    fn test_parse_console_line() {
        let frame = parse_frame_line("  can0  310   [8]  10 44 08 6C 82 22 00 00")
            .unwrap()
            .unwrap();
        assert_eq!(frame, RawFrame::new(0x310, PAYLOAD));
    }

    #[test]
    fn test_parse_short_frame_keeps_length() {
        let frame = parse_frame_line("can0 7DF [3] 02 01 0C").unwrap().unwrap();
        assert_eq!(frame.id, 0x7DF);
        assert_eq!(frame.byte_count, 3);
        assert_eq!(frame.data(), &[0x02, 0x01, 0x0C]);
    }

    #[test]
    fn test_parse_empty_data() {
        let frame = parse_frame_line("310#").unwrap().unwrap();
        assert_eq!(frame.byte_count, 0);
    }

    #[test]
    fn test_skip_blank_and_comment() {
        assert!(parse_frame_line("").unwrap().is_none());
        assert!(parse_frame_line("   ").unwrap().is_none());
        assert!(parse_frame_line("# recorded on the test track").unwrap().is_none());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_frame_line("hello world").is_err());
        assert!(parse_frame_line("XYZ#1044").is_err());
        assert!(parse_frame_line("310#104").is_err()); // odd digits
        assert!(parse_frame_line("310#R").is_err());
        assert!(parse_frame_line("can0 310 [8] 10 44").is_err());
        assert!(parse_frame_line("[8] 10 44").is_err());
        assert!(parse_frame_line("123456789#00").is_err());
        assert!(parse_frame_line("can0 310 [65] 10 44").is_err());
        assert!(parse_frame_line("can0 310 [18446744073709551615] 10 44").is_err());
        assert!(parse_frame_line("can0 310 [4000000000000] 10 44").is_err());
    }

    #[test]
    fn test_huge_declared_length_is_skipped() {
        let text = "can0 310 [18446744073709551615] 10 44\n310#1044086C82220000\n";
        let log = read_frames(text.as_bytes()).unwrap();
        assert_eq!(log.frames.len(), 1);
        assert_eq!(log.malformed, 1);
    }

    #[test]
    fn test_read_frames_counts_malformed() {
        let text = "# log\n310#1044086C82220000\nnot a frame\n\ncan0 320 [8] 00 00 00 00 00 00 00 00\n";
        let log = read_frames(text.as_bytes()).unwrap();
        assert_eq!(log.frames.len(), 2);
        assert_eq!(log.malformed, 1);
        assert_eq!(log.frames[1].id, 0x320);
    }

    #[test]
    fn test_frame_reader_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(0.000000) can0 310#1044086C82220000").unwrap();
        writeln!(file, "(0.001000) can0 311#1044086C82220000").unwrap();
        let log = FrameReader::new(file.path()).read_all().unwrap();
        assert_eq!(log.frames.len(), 2);
        assert_eq!(log.malformed, 0);
    }

    #[test]
    fn test_frame_reader_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FrameReader::new(&dir.path().join("none.log")).read_all().is_err());
    }
}
