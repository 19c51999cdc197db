//! Latest detection per `(sensor, object)` slot.
//!
//! Pure state: no I/O, no clocks. Objects that stop being detected are not
//! expired individually. Instead the whole table is cleared every
//! `RESET_INTERVAL` updates, which bounds how long a stale reading can stay
//! visible. Readers see an empty table right after each reset until fresh
//! frames arrive.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use crate::types::{DetectionRecord, Slot, MAX_OBJECTS_PER_SENSOR, MAX_SENSORS};

/// Number of updates between full table resets.
pub const RESET_INTERVAL: usize = MAX_OBJECTS_PER_SENSOR * MAX_SENSORS;

type Row = [Option<DetectionRecord>; MAX_OBJECTS_PER_SENSOR];

// ---------------------------------------------------------------------------
// SlotStore
// ---------------------------------------------------------------------------

/// Fixed `sensors x MAX_OBJECTS_PER_SENSOR` table of optional records.
#[derive(Debug, Clone)]
pub struct SlotStore {
    rows: Vec<Row>,
    update_count: usize,
    resets: u64,
}

impl SlotStore {
    /// Empty table for `sensor_count` sensors.
    ///
    /// # Panics
    /// If `sensor_count` exceeds `MAX_SENSORS`.
    pub fn new(sensor_count: usize) -> Self {
        assert!(
            sensor_count <= MAX_SENSORS,
            "sensor count {sensor_count} exceeds maximum of {MAX_SENSORS}"
        );
        SlotStore {
            rows: vec![[None; MAX_OBJECTS_PER_SENSOR]; sensor_count],
            update_count: 0,
            resets: 0,
        }
    }

    pub fn sensor_count(&self) -> usize {
        self.rows.len()
    }

    /// Updates since the last reset.
    pub fn update_count(&self) -> usize {
        self.update_count
    }

    /// Full resets performed so far.
    pub fn reset_count(&self) -> u64 {
        self.resets
    }

    /// Overwrite the cell at `slot`, then apply the staleness policy.
    ///
    /// # Panics
    /// If `slot` is outside the table.
    pub fn update(&mut self, slot: Slot, record: DetectionRecord) {
        self.check_slot(slot);
        self.rows[slot.sensor][slot.object] = Some(record);

        self.update_count += 1;
        if self.update_count >= RESET_INTERVAL {
            self.update_count = 0;
            self.clear_rows();
            self.resets += 1;
            debug!(
                "slot store reset #{} after {RESET_INTERVAL} updates",
                self.resets
            );
        }
    }

    /// Record stored at `slot`, if any.
    ///
    /// # Panics
    /// If `slot` is outside the table.
    pub fn get(&self, slot: Slot) -> Option<&DetectionRecord> {
        self.check_slot(slot);
        self.rows[slot.sensor][slot.object].as_ref()
    }

    /// All object cells of one sensor, in object order.
    ///
    /// # Panics
    /// If `sensor` is outside the table.
    pub fn row(&self, sensor: usize) -> &[Option<DetectionRecord>] {
        assert!(
            sensor < self.rows.len(),
            "sensor index {sensor} outside store of {} sensors",
            self.rows.len()
        );
        &self.rows[sensor]
    }

    /// Number of non-empty cells.
    pub fn occupied(&self) -> usize {
        self.rows.iter().flatten().filter(|cell| cell.is_some()).count()
    }

    /// Occupied cells with their slots, in sensor then object order.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &DetectionRecord)> + '_ {
        self.rows.iter().enumerate().flat_map(|(sensor, row)| {
            row.iter().enumerate().filter_map(move |(object, cell)| {
                cell.as_ref().map(|record| (Slot { sensor, object }, record))
            })
        })
    }

    /// Empty every cell and restart the update counter.
    pub fn clear(&mut self) {
        self.clear_rows();
        self.update_count = 0;
    }

    fn clear_rows(&mut self) {
        for row in &mut self.rows {
            row.fill(None);
        }
    }

    fn check_slot(&self, slot: Slot) {
        assert!(
            slot.sensor < self.rows.len() && slot.object < MAX_OBJECTS_PER_SENSOR,
            "{slot} outside store of {} sensors x {MAX_OBJECTS_PER_SENSOR} objects",
            self.rows.len()
        );
    }
}

// ---------------------------------------------------------------------------
// SharedSlotStore
// ---------------------------------------------------------------------------

/// Cloneable handle for one producer and any number of readers.
///
/// A single `RwLock` covers the table: `update` (including a reset) runs
/// under the write lock, so readers never see a partially cleared table.
/// Readers get owned copies and hold the lock only while copying.
#[derive(Debug, Clone)]
pub struct SharedSlotStore {
    inner: Arc<RwLock<SlotStore>>,
}

impl SharedSlotStore {
    /// # Panics
    /// If `sensor_count` exceeds `MAX_SENSORS`.
    pub fn new(sensor_count: usize) -> Self {
        SharedSlotStore {
            inner: Arc::new(RwLock::new(SlotStore::new(sensor_count))),
        }
    }

    pub fn update(&self, slot: Slot, record: DetectionRecord) {
        self.write().update(slot, record);
    }

    pub fn get(&self, slot: Slot) -> Option<DetectionRecord> {
        self.read().get(slot).copied()
    }

    pub fn row(&self, sensor: usize) -> Vec<Option<DetectionRecord>> {
        self.read().row(sensor).to_vec()
    }

    /// Consistent copy of the whole table.
    pub fn snapshot(&self) -> SlotStore {
        self.read().clone()
    }

    /// Shared access for reads that must see several values at once.
    pub fn read(&self) -> RwLockReadGuard<'_, SlotStore> {
        // The table is valid between operations, so a poisoned lock is usable.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SlotStore> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<SlotStore> for SharedSlotStore {
    fn from(store: SlotStore) -> Self {
        SharedSlotStore {
            inner: Arc::new(RwLock::new(store)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_payload;
    use crate::frame::IdLayout;

    fn record(id: u32) -> DetectionRecord {
        decode_payload(id, &[0x10, 0x80, 0x08, 0x80, 0x80, 0x20, 0x00, 0x01])
    }

    fn record_for(slot: Slot) -> DetectionRecord {
        record(IdLayout::DEFAULT.identifier(slot))
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = SlotStore::new(2);
        assert_eq!(store.sensor_count(), 2);
        assert_eq!(store.occupied(), 0);
        assert!(store.row(1).iter().all(Option::is_none));
        assert_eq!(store.row(0).len(), MAX_OBJECTS_PER_SENSOR);
    }

    #[test]
    #[should_panic(expected = "exceeds maximum")]
    fn test_too_many_sensors_panics() {
        SlotStore::new(MAX_SENSORS + 1);
    }

    #[test]
    fn test_update_then_row() {
        let mut store = SlotStore::new(2);
        let slot = Slot::new(1, 3);
        store.update(slot, record_for(slot));

        let row = store.row(1);
        assert_eq!(row[3], Some(record_for(slot)));
        for (i, cell) in row.iter().enumerate() {
            if i != 3 {
                assert!(cell.is_none(), "object {i} should be untouched");
            }
        }
        assert!(store.row(0).iter().all(Option::is_none));
    }

    #[test]
    fn test_update_overwrites() {
        let mut store = SlotStore::new(1);
        let slot = Slot::new(0, 0);
        store.update(slot, record(0x310));
        let mut newer = record(0x310);
        newer.polar_radius = 9.5;
        store.update(slot, newer);

        assert_eq!(store.get(slot).map(|r| r.polar_radius), Some(9.5));
        assert_eq!(store.occupied(), 1);
    }

    #[test]
    fn test_get_empty_slot() {
        let store = SlotStore::new(1);
        assert!(store.get(Slot::new(0, 5)).is_none());
    }

    #[test]
    #[should_panic(expected = "outside store")]
    fn test_update_out_of_range_sensor_panics() {
        let mut store = SlotStore::new(1);
        store.update(Slot::new(1, 0), record(0x320));
    }

    #[test]
    #[should_panic(expected = "outside store")]
    fn test_update_out_of_range_object_panics() {
        let mut store = SlotStore::new(1);
        store.update(Slot::new(0, MAX_OBJECTS_PER_SENSOR), record(0x318));
    }

    #[test]
    #[should_panic(expected = "sensor index 3")]
    fn test_row_out_of_range_panics() {
        SlotStore::new(3).row(3);
    }

    #[test]
    fn test_reset_after_interval_same_slot() {
        let mut store = SlotStore::new(1);
        let slot = Slot::new(0, 0);
        for _ in 0..RESET_INTERVAL - 1 {
            store.update(slot, record(0x310));
        }
        assert!(store.get(slot).is_some());
        assert_eq!(store.update_count(), RESET_INTERVAL - 1);

        store.update(slot, record(0x310));
        assert_eq!(store.occupied(), 0);
        assert_eq!(store.update_count(), 0);
        assert_eq!(store.reset_count(), 1);
    }

    #[test]
    fn test_reset_after_interval_spread_slots() {
        let mut store = SlotStore::new(MAX_SENSORS);
        let slots: Vec<Slot> = (0..RESET_INTERVAL)
            .map(|i| Slot::new(i % MAX_SENSORS, (i * 3) % MAX_OBJECTS_PER_SENSOR))
            .collect();

        for slot in &slots[..RESET_INTERVAL - 1] {
            store.update(*slot, record_for(*slot));
        }
        assert!(store.occupied() > 0);

        let last = slots[RESET_INTERVAL - 1];
        store.update(last, record_for(last));
        for sensor in 0..MAX_SENSORS {
            assert!(store.row(sensor).iter().all(Option::is_none));
        }
    }

    #[test]
    fn test_counting_restarts_after_reset() {
        let mut store = SlotStore::new(1);
        let slot = Slot::new(0, 2);
        for _ in 0..RESET_INTERVAL + 5 {
            store.update(slot, record_for(slot));
        }
        assert_eq!(store.update_count(), 5);
        assert!(store.get(slot).is_some());

        for _ in 0..RESET_INTERVAL - 5 {
            store.update(slot, record_for(slot));
        }
        assert_eq!(store.reset_count(), 2);
        assert_eq!(store.occupied(), 0);
    }

    #[test]
    fn test_clear() {
        let mut store = SlotStore::new(1);
        store.update(Slot::new(0, 1), record(0x311));
        store.clear();
        assert_eq!(store.occupied(), 0);
        assert_eq!(store.update_count(), 0);
        assert_eq!(store.reset_count(), 0);
    }

    #[test]
    fn test_iter_occupied_in_order() {
        let mut store = SlotStore::new(2);
        for slot in [Slot::new(1, 0), Slot::new(0, 6), Slot::new(0, 1)] {
            store.update(slot, record_for(slot));
        }
        let ids: Vec<u32> = store.iter().map(|(_, r)| r.id).collect();
        assert_eq!(ids, vec![0x311, 0x316, 0x320]);
        let slots: Vec<Slot> = store.iter().map(|(s, _)| s).collect();
        assert_eq!(slots[2], Slot::new(1, 0));
    }

    #[test]
    fn test_zero_sensor_store() {
        let store = SlotStore::new(0);
        assert_eq!(store.occupied(), 0);
        assert_eq!(store.iter().count(), 0);
    }

    #[test]
    fn test_shared_store_roundtrip() {
        let shared = SharedSlotStore::new(1);
        let reader = shared.clone();
        let slot = Slot::new(0, 4);
        shared.update(slot, record_for(slot));

        assert_eq!(reader.get(slot), Some(record_for(slot)));
        assert_eq!(reader.row(0)[4], Some(record_for(slot)));
        assert_eq!(reader.snapshot().occupied(), 1);
    }

    #[test]
    fn test_shared_store_readers_never_see_partial_reset() {
        let shared = SharedSlotStore::new(MAX_SENSORS);
        let layout = IdLayout::DEFAULT;

        let writer = {
            let shared = shared.clone();
            std::thread::spawn(move || {
                for round in 0..20 {
                    for id in layout.detection_ids() {
                        let slot = layout.classify(id).unwrap();
                        let mut r = record(id);
                        r.signal_power = round;
                        shared.update(slot, r);
                    }
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let store = shared.read();
                        // Each update fills at most one cell since the last reset.
                        assert!(store.occupied() <= store.update_count());
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        // 20 full passes over 64 slots is exactly 20 resets.
        assert_eq!(shared.read().reset_count(), 20);
        assert_eq!(shared.read().occupied(), 0);
    }
}
