//! Feed recorded frames through the decoder into a slot store.

use std::fmt;

use backsense_core::types::format_payload;
use backsense_core::{DecodeError, FrameDecoder, RawFrame, SharedSlotStore};
use log::trace;

/// Per-run frame counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub frames: u64,
    pub decoded: u64,
    pub wrong_length: u64,
    pub unrecognized: u64,
}

impl ReplayStats {
    pub fn record(&mut self, outcome: Result<(), DecodeError>) {
        self.frames += 1;
        match outcome {
            Ok(()) => self.decoded += 1,
            Err(DecodeError::WrongLength { .. }) => self.wrong_length += 1,
            Err(DecodeError::UnrecognizedId(_)) => self.unrecognized += 1,
        }
    }
}

impl fmt::Display for ReplayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, {} decoded, {} unrecognized id, {} wrong length",
            self.frames, self.decoded, self.unrecognized, self.wrong_length
        )
    }
}

/// Decode `frames` in order and write each record to its slot.
pub fn replay_into(
    frames: &[RawFrame],
    decoder: &FrameDecoder,
    store: &SharedSlotStore,
) -> ReplayStats {
    let mut stats = ReplayStats::default();
    for frame in frames {
        trace!(
            "RCV {:>5x} [{}] {}",
            frame.id,
            frame.byte_count,
            format_payload(frame.data())
        );
        let outcome = decoder
            .process(frame)
            .map(|(slot, record)| store.update(slot, record));
        stats.record(outcome);
    }
    stats
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
