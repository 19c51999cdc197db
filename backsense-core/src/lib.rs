//! backsense-core: decoding and slot storage for Backsense radar CAN frames.
//!
//! No threads, no bus access: the caller delivers `(id, payload, length)`
//! frames and reads back the latest detection per sensor object. Shared by
//! the `backsense` replay tool and any host that owns a live CAN channel.

pub mod config;
pub mod decode;
pub mod field;
pub mod frame;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root
pub use decode::{decode_frame, FrameDecoder};
pub use field::{extract, FieldSpec, Quantity};
pub use frame::{classify, IdLayout};
pub use store::{SharedSlotStore, SlotStore, RESET_INTERVAL};
pub use types::*;
