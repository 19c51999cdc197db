//! Decode classified frames into detection records.
//!
//! A frame is rejected for two reasons only: a data length other than eight
//! bytes, or an identifier outside the detection window. Everything else
//! decodes, including configuration frames whose fields carry no physical
//! meaning. Raw bytes outside their declared range are logged, not rejected.

use log::trace;

use crate::field::{extract, Quantity, CATALOGUE};
use crate::frame::IdLayout;
use crate::types::{DecodeError, DetectionRecord, RawFrame, Slot, PAYLOAD_LEN};

/// Frame decoder bound to one identifier layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoder {
    layout: IdLayout,
}

impl FrameDecoder {
    pub fn new(layout: IdLayout) -> Self {
        FrameDecoder { layout }
    }

    pub fn layout(&self) -> &IdLayout {
        &self.layout
    }

    pub fn classify(&self, id: u32) -> Option<Slot> {
        self.layout.classify(id)
    }

    /// Decode a frame into a record.
    pub fn decode(&self, frame: &RawFrame) -> Result<DetectionRecord, DecodeError> {
        self.process(frame).map(|(_, record)| record)
    }

    /// Decode a frame and return the slot it belongs to.
    pub fn process(&self, frame: &RawFrame) -> Result<(Slot, DetectionRecord), DecodeError> {
        if frame.byte_count != PAYLOAD_LEN as i32 {
            return Err(DecodeError::WrongLength {
                expected: PAYLOAD_LEN,
                actual: frame.byte_count,
            });
        }
        let slot = self.classify(frame.id).ok_or_else(|| {
            trace!("dropping frame {:#x}: not a detection id", frame.id);
            DecodeError::UnrecognizedId(frame.id)
        })?;
        Ok((slot, decode_payload(frame.id, &frame.payload)))
    }
}

/// Apply the whole field catalogue to a payload.
///
/// Cannot fail: any eight bytes map to some record.
pub fn decode_payload(id: u32, payload: &[u8; PAYLOAD_LEN]) -> DetectionRecord {
    if log::log_enabled!(log::Level::Trace) {
        for info in &CATALOGUE {
            let byte = payload[info.spec.byte_index];
            if !info.spec.raw_in_range(byte) {
                trace!(
                    "frame {id:#x}: {} raw byte {byte:#04x} outside {:#04x}..={:#04x}",
                    info.name,
                    info.spec.raw_min,
                    info.spec.raw_max
                );
            }
        }
    }

    DetectionRecord {
        id,
        polar_radius: extract(payload, Quantity::PolarRadius.spec()),
        polar_angle: extract(payload, Quantity::PolarAngle.spec()),
        x: extract(payload, Quantity::X.spec()),
        y: extract(payload, Quantity::Y.spec()),
        relative_speed: extract(payload, Quantity::RelativeSpeed.spec()),
        signal_power: extract(payload, Quantity::SignalPower.spec()),
        object_id: extract(payload, Quantity::ObjectId.spec()),
        appearance_status: extract(payload, Quantity::AppearanceStatus.spec()),
        trigger_event: extract(payload, Quantity::TriggerEvent.spec()),
        detection_flag: extract(payload, Quantity::DetectionFlag.spec()),
    }
}

/// Classify and decode in one call, using the default layout.
pub fn decode_frame(
    id: u32,
    payload: [u8; PAYLOAD_LEN],
    byte_count: i32,
) -> Result<DetectionRecord, DecodeError> {
    FrameDecoder::default().decode(&RawFrame {
        id,
        payload,
        byte_count,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
