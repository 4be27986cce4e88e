use crate::lifecycle::{AppointmentStatus, UserAction};
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unknown service: {0}")]
    UnknownService(String),
    #[error("unknown branch: {0}")]
    UnknownBranch(String),
    #[error("unknown time slot: {0}")]
    UnknownSlot(String),
    #[error("appointment not found: {0}")]
    AppointmentNotFound(String),
    #[error("invalid visit date: {0}")]
    InvalidDate(String),
    #[error("slot {slot} is no longer available on {date}")]
    SlotUnavailable { slot: String, date: String },
    #[error("{action} rejected for appointment in status {status}")]
    TransitionRejected {
        status: AppointmentStatus,
        action: UserAction,
    },
    #[error("appointment {0} is already finalized")]
    AppointmentFinalized(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("state lock poisoned")]
    StateLock,
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::UnknownService(_)
                | AppError::UnknownBranch(_)
                | AppError::UnknownSlot(_)
                | AppError::AppointmentNotFound(_)
        )
    }
}
