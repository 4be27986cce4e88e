//! Session storage: the key-value capability and the appointment store on top of it.

use crate::estimation::wait_time::QueueScope;
use crate::lifecycle::AppointmentStatus;
use crate::state::{Appointment, StatusCategory};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

pub mod memory;

pub const APPOINTMENTS_KEY: &str = "appointments";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Lock,
    #[error("failed to encode or decode stored value: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Storage medium for session state. Values are JSON documents.
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    store.set(key, serde_json::to_string(value)?)
}

/// Ordered collection of every appointment in the session.
///
/// Appointments are never removed; finalized ones stay for history. Every
/// mutation is written through to the backing [`KeyValueStore`].
#[derive(Debug)]
pub struct AppointmentStore {
    kv: Arc<dyn KeyValueStore>,
    appointments: Vec<Appointment>,
}

impl AppointmentStore {
    /// Opens the store, resuming any appointments already persisted in `kv`.
    pub fn open(kv: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let mut appointments: Vec<Appointment> =
            load_json(kv.as_ref(), APPOINTMENTS_KEY)?.unwrap_or_default();
        appointments.sort_by_key(Appointment::queue_key);
        Ok(Self { kv, appointments })
    }

    pub fn all(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn get(&self, id: &str) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    pub fn next_sequence(&self) -> u64 {
        self.appointments
            .iter()
            .map(|a| a.sequence + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn insert(&mut self, appointment: Appointment) -> Result<(), StoreError> {
        let mut next = self.appointments.clone();
        next.push(appointment);
        next.sort_by_key(Appointment::queue_key);
        self.commit(next)
    }

    /// Moves an appointment to `status`, stamping the change time. Returns the
    /// updated record, or `None` when the id is unknown.
    pub fn set_status(
        &mut self,
        id: &str,
        status: AppointmentStatus,
        at: OffsetDateTime,
    ) -> Result<Option<Appointment>, StoreError> {
        let Some(index) = self.appointments.iter().position(|a| a.id == id) else {
            return Ok(None);
        };
        let mut next = self.appointments.clone();
        next[index].status = status;
        next[index].status_changed_at = at;
        let updated = next[index].clone();
        self.commit(next)?;
        Ok(Some(updated))
    }

    /// The earliest-created appointment that is not finalized.
    pub fn active(&self) -> Option<&Appointment> {
        self.appointments.iter().find(|a| !a.status.is_terminal())
    }

    pub fn has_live(&self) -> bool {
        self.active().is_some()
    }

    /// Non-finalized appointments queued before `target` at the same branch
    /// and date, in creation order. With [`QueueScope::Slot`] only those
    /// sharing the target's slot count.
    pub fn ahead_of(&self, target: &Appointment, scope: QueueScope) -> Vec<&Appointment> {
        let target_key = target.queue_key();
        self.appointments
            .iter()
            .filter(|a| a.id != target.id)
            .filter(|a| !a.status.is_terminal())
            .filter(|a| a.branch_id == target.branch_id && a.visit_date == target.visit_date)
            .filter(|a| a.queue_key() < target_key)
            .filter(|a| match scope {
                QueueScope::Day => true,
                QueueScope::Slot => a.time_slot == target.time_slot,
            })
            .collect()
    }

    pub fn by_category(&self, category: StatusCategory) -> Vec<&Appointment> {
        self.appointments
            .iter()
            .filter(|a| category.includes(a.status))
            .collect()
    }

    // Memory only changes once the write has gone through.
    fn commit(&mut self, next: Vec<Appointment>) -> Result<(), StoreError> {
        save_json(self.kv.as_ref(), APPOINTMENTS_KEY, &next)?;
        self.appointments = next;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::memory::MemoryStore;
    use super::{KeyValueStore, StoreError};
    use std::sync::Mutex;

    /// Memory store that fails writes to one chosen key.
    #[derive(Debug, Default)]
    pub struct RefusingStore {
        inner: MemoryStore,
        refused: Mutex<Option<String>>,
    }

    impl RefusingStore {
        pub fn refuse(&self, key: Option<&str>) {
            if let Ok(mut refused) = self.refused.lock() {
                *refused = key.map(str::to_string);
            }
        }
    }

    impl KeyValueStore for RefusingStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
            let refused = self.refused.lock().map_err(|_| StoreError::Lock)?;
            if refused.as_deref() == Some(key) {
                return Err(StoreError::Lock);
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }
}
