//! Classify frame identifiers into detection slots.
//!
//! Detection frames occupy one block of identifiers per sensor:
//! sensor `s`, object `o` transmits on `base_id + s * id_stride + o`.
//! Identifiers past the last object of a block (0x318..0x31F with the
//! default layout) belong to other message types sharing the bus.
//!
//! Classification is a pure function of an immutable `IdLayout`, so it can
//! be called from any number of threads without synchronization.

use serde::{Deserialize, Serialize};

use crate::types::{
    BacksenseError, Result, Slot, BASE_ID, ID_STRIDE, MAX_OBJECTS_PER_SENSOR, MAX_SENSORS,
};

/// Static identifier-to-slot configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdLayout {
    pub base_id: u32,
    pub id_stride: u32,
    pub sensors: usize,
    pub objects_per_sensor: usize,
}

impl IdLayout {
    /// Layout of a fully populated Backsense bus.
    pub const DEFAULT: IdLayout = IdLayout {
        base_id: BASE_ID,
        id_stride: ID_STRIDE,
        sensors: MAX_SENSORS,
        objects_per_sensor: MAX_OBJECTS_PER_SENSOR,
    };

    /// Validated layout.
    pub fn new(
        base_id: u32,
        id_stride: u32,
        sensors: usize,
        objects_per_sensor: usize,
    ) -> Result<Self> {
        if !(1..=MAX_SENSORS).contains(&sensors) {
            return Err(BacksenseError::InvalidLayout(format!(
                "sensor count {sensors} outside 1..={MAX_SENSORS}"
            )));
        }
        if !(1..=MAX_OBJECTS_PER_SENSOR).contains(&objects_per_sensor) {
            return Err(BacksenseError::InvalidLayout(format!(
                "objects per sensor {objects_per_sensor} outside 1..={MAX_OBJECTS_PER_SENSOR}"
            )));
        }
        if (objects_per_sensor as u64) > u64::from(id_stride) {
            return Err(BacksenseError::InvalidLayout(format!(
                "objects per sensor {objects_per_sensor} exceed identifier stride {id_stride:#x}"
            )));
        }
        let layout = IdLayout {
            base_id,
            id_stride,
            sensors,
            objects_per_sensor,
        };
        if layout.window_end() > u64::from(u32::MAX) + 1 {
            return Err(BacksenseError::InvalidLayout(format!(
                "identifier window {base_id:#x} + {sensors} * {id_stride:#x} overflows 32 bits"
            )));
        }
        Ok(layout)
    }

    /// Default layout restricted to the first `sensors` sensors.
    pub fn with_sensors(sensors: usize) -> Result<Self> {
        IdLayout::new(BASE_ID, ID_STRIDE, sensors, MAX_OBJECTS_PER_SENSOR)
    }

    /// One past the last identifier of the window.
    pub fn window_end(&self) -> u64 {
        u64::from(self.base_id) + self.sensors as u64 * u64::from(self.id_stride)
    }

    /// Resolve an identifier to its slot, or `None` for non-detection frames.
    pub fn classify(&self, id: u32) -> Option<Slot> {
        if id < self.base_id || u64::from(id) >= self.window_end() {
            return None;
        }
        let rel = id - self.base_id;
        let sensor = (rel / self.id_stride) as usize;
        let object = (rel % self.id_stride) as usize;
        if object >= self.objects_per_sensor {
            return None;
        }
        Some(Slot { sensor, object })
    }

    /// Identifier transmitted for `slot`. Inverse of `classify`.
    ///
    /// # Panics
    /// If `slot` is outside this layout.
    pub fn identifier(&self, slot: Slot) -> u32 {
        assert!(
            slot.sensor < self.sensors && slot.object < self.objects_per_sensor,
            "{slot} outside layout of {} sensors x {} objects",
            self.sensors,
            self.objects_per_sensor
        );
        self.base_id + slot.sensor as u32 * self.id_stride + slot.object as u32
    }

    /// Every identifier that classifies, in ascending order.
    pub fn detection_ids(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.sensors).flat_map(move |sensor| {
            (0..self.objects_per_sensor).map(move |object| self.identifier(Slot { sensor, object }))
        })
    }
}

impl Default for IdLayout {
    fn default() -> Self {
        IdLayout::DEFAULT
    }
}

/// Classify against the default layout.
pub fn classify(id: u32) -> Option<Slot> {
    IdLayout::DEFAULT.classify(id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
