use crate::advisory::Advisor;
use crate::catalog::{ServiceId, TimeSlot};
use crate::engine::VisitEngine;
use crate::error::AppError;
use crate::lifecycle::AppointmentStatus;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tokio::sync::watch;

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

time::serde::format_description!(pub iso_date, Date, "[year]-[month]-[day]");

pub fn parse_visit_date(raw: &str) -> Result<Date, AppError> {
    Date::parse(raw.trim(), DATE_FORMAT).map_err(|_| AppError::InvalidDate(raw.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub service_id: ServiceId,
    pub branch_id: String,
    pub branch_name: String,
    #[serde(with = "iso_date")]
    pub visit_date: Date,
    pub time_slot: TimeSlot,
    pub user_name: String,
    pub status: AppointmentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Creation index within the session; breaks `created_at` ties.
    pub sequence: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub status_changed_at: OffsetDateTime,
}

impl Appointment {
    /// FIFO position key.
    pub fn queue_key(&self) -> (OffsetDateTime, u64) {
        (self.created_at, self.sequence)
    }
}

/// Status groupings used by history and listing views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    #[default]
    All,
    Active,
    Upcoming,
    Completed,
    Cancelled,
    History,
}

impl StatusCategory {
    pub fn includes(self, status: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        match self {
            StatusCategory::All => true,
            StatusCategory::Active => matches!(status, Arrived | InProgress),
            StatusCategory::Upcoming => matches!(status, Scheduled | Missed),
            StatusCategory::Completed => status == Completed,
            StatusCategory::Cancelled => status == Cancelled,
            StatusCategory::History => status.is_terminal(),
        }
    }
}

impl FromStr for StatusCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(StatusCategory::All),
            "active" => Ok(StatusCategory::Active),
            "upcoming" => Ok(StatusCategory::Upcoming),
            "completed" => Ok(StatusCategory::Completed),
            "cancelled" => Ok(StatusCategory::Cancelled),
            "history" => Ok(StatusCategory::History),
            other => Err(format!("unknown status category: {other}")),
        }
    }
}

#[derive(Debug)]
pub struct AppState {
    engine: VisitEngine,
    advisor: Option<Arc<dyn Advisor>>,
    appointments_tx: watch::Sender<Vec<Appointment>>,
}

impl AppState {
    pub fn new(engine: VisitEngine) -> Self {
        let (appointments_tx, _appointments_rx) = watch::channel(engine.appointments().to_vec());
        Self {
            engine,
            advisor: None,
            appointments_tx,
        }
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn advisor(&self) -> Option<Arc<dyn Advisor>> {
        self.advisor.clone()
    }

    pub fn engine(&self) -> &VisitEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut VisitEngine {
        &mut self.engine
    }

    pub fn subscribe_appointments(&self) -> watch::Receiver<Vec<Appointment>> {
        self.appointments_tx.subscribe()
    }

    /// Pushes the current appointment list to subscribers. Having none is fine.
    pub fn publish_appointments(&self) {
        self.appointments_tx
            .send_replace(self.engine.appointments().to_vec());
    }
}
