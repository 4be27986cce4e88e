use crate::catalog::{SLOT_COUNT, TimeSlot};
use crate::estimation::model::{CrowdLabel, CrowdScale, load_percent, total_load_percent};
use crate::state::DATE_FORMAT;
use crate::store::{KeyValueStore, StoreError, load_json, save_json};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use time::Date;
use tracing::debug;

/// Largest pre-existing load a slot is seeded with.
pub const MAX_BASELINE_COUNT: u32 = 7;
pub const DEFAULT_SLOT_CAPACITY: u32 = 8;

pub type SlotCounts = BTreeMap<TimeSlot, u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotDensity {
    pub slot: TimeSlot,
    pub count: u32,
    pub load_percent: u32,
    pub crowd_label: CrowdLabel,
}

/// Per-slot densities for one branch and date, in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensitySnapshot {
    pub slots: Vec<SlotDensity>,
    pub average_load_percent: u32,
}

impl DensitySnapshot {
    pub fn get(&self, slot: TimeSlot) -> Option<&SlotDensity> {
        self.slots.iter().find(|density| density.slot == slot)
    }
}

/// Booking counts per (branch, date, slot).
///
/// Counts for a key are seeded lazily on first access with a random baseline
/// in `0..=MAX_BASELINE_COUNT` drawn from the injected generator, then stored
/// so later reads are stable. Bookings only ever add to a count.
pub struct SlotDensityModel {
    kv: Arc<dyn KeyValueStore>,
    rng: StdRng,
    capacity: u32,
    scale: Box<dyn CrowdScale>,
}

impl fmt::Debug for SlotDensityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotDensityModel")
            .field("capacity", &self.capacity)
            .field("scale", &self.scale.name())
            .finish()
    }
}

impl SlotDensityModel {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        rng: StdRng,
        capacity: u32,
        scale: Box<dyn CrowdScale>,
    ) -> Self {
        Self {
            kv,
            rng,
            capacity,
            scale,
        }
    }

    pub fn with_seed(
        kv: Arc<dyn KeyValueStore>,
        seed: u64,
        capacity: u32,
        scale: Box<dyn CrowdScale>,
    ) -> Self {
        Self::new(kv, StdRng::seed_from_u64(seed), capacity, scale)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn counts(&mut self, branch_id: &str, date: Date) -> Result<SlotCounts, StoreError> {
        let key = counts_key(branch_id, date);
        if let Some(stored) = load_json::<BTreeMap<String, u32>>(self.kv.as_ref(), &key)? {
            return Ok(decode_counts(stored));
        }

        let seeded: SlotCounts = TimeSlot::all()
            .map(|slot| (slot, self.rng.gen_range(0..=MAX_BASELINE_COUNT)))
            .collect();
        debug!(branch_id, key = %key, "Seeded baseline slot counts");
        self.store_counts(&key, &seeded)?;
        Ok(seeded)
    }

    /// Replaces the counts for a branch and date. Slots not listed become 0.
    pub fn seed_counts(
        &mut self,
        branch_id: &str,
        date: Date,
        counts: &[(TimeSlot, u32)],
    ) -> Result<(), StoreError> {
        let mut all: SlotCounts = TimeSlot::all().map(|slot| (slot, 0)).collect();
        all.extend(counts.iter().copied());
        self.store_counts(&counts_key(branch_id, date), &all)
    }

    /// Writes back counts previously read with [`Self::counts`].
    pub fn restore_counts(
        &mut self,
        branch_id: &str,
        date: Date,
        counts: &SlotCounts,
    ) -> Result<(), StoreError> {
        self.store_counts(&counts_key(branch_id, date), counts)
    }

    /// Adds one booking to `slot` and returns its new count.
    pub fn record_booking(
        &mut self,
        branch_id: &str,
        date: Date,
        slot: TimeSlot,
    ) -> Result<u32, StoreError> {
        let mut counts = self.counts(branch_id, date)?;
        let count = counts.entry(slot).or_insert(0);
        *count = count.saturating_add(1);
        let updated = *count;
        self.store_counts(&counts_key(branch_id, date), &counts)?;
        Ok(updated)
    }

    pub fn classify(&self, count: u32) -> CrowdLabel {
        self.scale.classify(count, self.capacity)
    }

    pub fn average_load(&mut self, branch_id: &str, date: Date) -> Result<u32, StoreError> {
        let counts = self.counts(branch_id, date)?;
        Ok(self.average_of(&counts))
    }

    pub fn snapshot(&mut self, branch_id: &str, date: Date) -> Result<DensitySnapshot, StoreError> {
        let counts = self.counts(branch_id, date)?;
        let slots = counts
            .iter()
            .map(|(&slot, &count)| SlotDensity {
                slot,
                count,
                load_percent: load_percent(count, self.capacity),
                crowd_label: self.classify(count),
            })
            .collect();
        Ok(DensitySnapshot {
            slots,
            average_load_percent: self.average_of(&counts),
        })
    }

    fn average_of(&self, counts: &SlotCounts) -> u32 {
        let total: u64 = counts.values().map(|&count| u64::from(count)).sum();
        total_load_percent(total, SLOT_COUNT as u64 * u64::from(self.capacity))
    }

    fn store_counts(&self, key: &str, counts: &SlotCounts) -> Result<(), StoreError> {
        let encoded: BTreeMap<&str, u32> = counts
            .iter()
            .map(|(slot, count)| (slot.label(), *count))
            .collect();
        save_json(self.kv.as_ref(), key, &encoded)
    }
}

pub fn counts_key(branch_id: &str, date: Date) -> String {
    let date = date
        .format(DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string());
    format!("slot_counts:{branch_id}|{date}")
}

// Labels that no longer parse are dropped; the slot reads as 0 afterwards.
fn decode_counts(stored: BTreeMap<String, u32>) -> SlotCounts {
    let mut counts: SlotCounts = TimeSlot::all().map(|slot| (slot, 0)).collect();
    for (label, count) in stored {
        if let Ok(slot) = TimeSlot::parse(&label) {
            counts.insert(slot, count);
        }
    }
    counts
}
