//! The visit engine: bookings, recommendations, wait estimates and lifecycle.
//!
//! Every operation takes `now` explicitly. Before a user action is applied the
//! appointment is first brought up to date with [`lifecycle::tick`], so a
//! status the timer has already finalized wins over a late request.

use crate::catalog::{Branch, ServiceId, TimeSlot};
use crate::error::AppError;
use crate::estimation::density::{DEFAULT_SLOT_CAPACITY, DensitySnapshot, SlotDensityModel};
use crate::estimation::recommend::{Recommendation, RecommendationEngine};
use crate::estimation::wait_time::{QueueScope, WaitEstimate, WaitTimeEstimator, WaitTimeParams};
use crate::estimation::{CrowdScaleKind, create_scale};
use crate::lifecycle::{self, AppointmentStatus, LifecycleSettings, UserAction};
use crate::state::{Appointment, DATE_FORMAT, StatusCategory};
use crate::store::{AppointmentStore, KeyValueStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use time::{Date, OffsetDateTime};
use tracing::{error, info, warn};

/// Upper bound on automatic steps applied to one appointment per tick.
const MAX_TICK_STEPS: usize = 4;
const ID_BASE: u64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub slot_capacity: u32,
    pub crowd_scale: CrowdScaleKind,
    pub queue_scope: QueueScope,
    /// Seed for baseline slot counts.
    pub seed: u64,
    pub wait: WaitTimeParams,
    pub lifecycle: LifecycleSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            crowd_scale: CrowdScaleKind::default(),
            queue_scope: QueueScope::default(),
            seed: 42,
            wait: WaitTimeParams::default(),
            lifecycle: LifecycleSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub service_id: ServiceId,
    pub branch_id: String,
    pub visit_date: Date,
    pub time_slot: TimeSlot,
    pub user_name: String,
}

/// What the caller needs to book a replacement after a reschedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingContext {
    pub service_id: ServiceId,
    pub branch_id: String,
    #[serde(with = "crate::state::iso_date")]
    pub visit_date: Date,
    pub previous_slot: TimeSlot,
    /// `None` when no slot remains bookable on that date.
    pub recommendation: Option<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub appointment_id: String,
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
}

#[derive(Debug)]
pub struct VisitEngine {
    branches: Vec<Branch>,
    density: SlotDensityModel,
    recommender: RecommendationEngine,
    estimator: WaitTimeEstimator,
    store: AppointmentStore,
    lifecycle: LifecycleSettings,
    queue_scope: QueueScope,
}

impl VisitEngine {
    pub fn new(
        settings: EngineSettings,
        branches: Vec<Branch>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Result<Self, AppError> {
        let store = AppointmentStore::open(Arc::clone(&kv))?;
        let density = SlotDensityModel::with_seed(
            kv,
            settings.seed,
            settings.slot_capacity,
            create_scale(settings.crowd_scale),
        );
        Ok(Self {
            branches,
            density,
            recommender: RecommendationEngine,
            estimator: WaitTimeEstimator::new(settings.wait),
            store,
            lifecycle: settings.lifecycle,
            queue_scope: settings.queue_scope,
        })
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch(&self, branch_id: &str) -> Result<&Branch, AppError> {
        self.branches
            .iter()
            .find(|branch| branch.id == branch_id.trim())
            .ok_or_else(|| AppError::UnknownBranch(branch_id.to_string()))
    }

    pub fn lifecycle_settings(&self) -> &LifecycleSettings {
        &self.lifecycle
    }

    pub fn book_slot(
        &mut self,
        request: BookingRequest,
        now: OffsetDateTime,
    ) -> Result<Appointment, AppError> {
        let branch = self.branch(&request.branch_id)?.clone();
        if !self.slot_open(request.visit_date, request.time_slot, now) {
            warn!(
                branch_id = %branch.id,
                slot = %request.time_slot,
                "Booking rejected, slot already started"
            );
            return Err(AppError::SlotUnavailable {
                slot: request.time_slot.to_string(),
                date: format_date(request.visit_date),
            });
        }

        let previous = self.density.counts(&branch.id, request.visit_date)?;
        let count = self
            .density
            .record_booking(&branch.id, request.visit_date, request.time_slot)?;

        let sequence = self.store.next_sequence();
        let appointment = Appointment {
            id: format!("APP-{}", ID_BASE + sequence),
            service_id: request.service_id,
            branch_id: branch.id,
            branch_name: branch.name,
            visit_date: request.visit_date,
            time_slot: request.time_slot,
            user_name: request.user_name.trim().to_string(),
            status: AppointmentStatus::Scheduled,
            created_at: now,
            sequence,
            status_changed_at: now,
        };
        if let Err(err) = self.store.insert(appointment.clone()) {
            if let Err(restore) =
                self.density
                    .restore_counts(&appointment.branch_id, appointment.visit_date, &previous)
            {
                error!(error = %restore, "Failed to roll back slot count");
            }
            return Err(err.into());
        }

        info!(
            appointment_id = %appointment.id,
            slot = %appointment.time_slot,
            slot_count = count,
            "Appointment booked"
        );
        Ok(appointment)
    }

    pub fn density(&mut self, branch_id: &str, date: Date) -> Result<DensitySnapshot, AppError> {
        let branch_id = self.branch(branch_id)?.id.clone();
        Ok(self.density.snapshot(&branch_id, date)?)
    }

    /// Best slot for `branch_id` on `date` among slots that have not started.
    pub fn recommendation(
        &mut self,
        branch_id: &str,
        date: Date,
        now: OffsetDateTime,
    ) -> Result<Recommendation, AppError> {
        let snapshot = self.density(branch_id, date)?;
        let settings = self.lifecycle;
        self.recommender
            .recommend_where(&snapshot, |slot| now <= settings.slot_start(date, slot))
            .ok_or_else(|| AppError::SlotUnavailable {
                slot: "any".to_string(),
                date: format_date(date),
            })
    }

    /// Reads current counts without recording anything, so repeated calls
    /// with no booking in between return the same estimate.
    ///
    /// The target and everyone sharing its branch and date are settled at
    /// `now` first, so appointments the timer would already have finalized
    /// never count as ahead.
    pub fn wait_estimate(
        &mut self,
        appointment_id: &str,
        now: OffsetDateTime,
    ) -> Result<WaitEstimate, AppError> {
        let appointment = self.settle(appointment_id, now, &mut Vec::new())?;
        if appointment.status.is_terminal() {
            return Err(AppError::AppointmentFinalized(appointment.id));
        }

        let same_day: Vec<String> = self
            .store
            .all()
            .iter()
            .filter(|a| !a.status.is_terminal() && a.id != appointment.id)
            .filter(|a| a.branch_id == appointment.branch_id && a.visit_date == appointment.visit_date)
            .map(|a| a.id.clone())
            .collect();
        for id in same_day {
            self.settle(&id, now, &mut Vec::new())?;
        }

        let counts = self
            .density
            .counts(&appointment.branch_id, appointment.visit_date)?;
        let count = counts.get(&appointment.time_slot).copied().unwrap_or(0);
        let crowd_label = self.density.classify(count);

        let ahead = self.store.ahead_of(&appointment, self.queue_scope);
        Ok(self.estimator.estimate(&ahead, crowd_label))
    }

    pub fn mark_arrival(
        &mut self,
        appointment_id: &str,
        now: OffsetDateTime,
    ) -> Result<Appointment, AppError> {
        self.apply(appointment_id, UserAction::MarkArrival, now)
    }

    pub fn cancel(&mut self, appointment_id: &str, now: OffsetDateTime) -> Result<Appointment, AppError> {
        self.apply(appointment_id, UserAction::Cancel, now)
    }

    /// Cancels the appointment and returns what is needed to book again.
    pub fn request_reschedule(
        &mut self,
        appointment_id: &str,
        now: OffsetDateTime,
    ) -> Result<BookingContext, AppError> {
        let cancelled = self.apply(appointment_id, UserAction::Reschedule, now)?;

        let recommendation = match self.recommendation(&cancelled.branch_id, cancelled.visit_date, now) {
            Ok(recommendation) => Some(recommendation),
            Err(AppError::SlotUnavailable { .. }) => None,
            Err(err) => return Err(err),
        };

        Ok(BookingContext {
            service_id: cancelled.service_id,
            branch_id: cancelled.branch_id,
            visit_date: cancelled.visit_date,
            previous_slot: cancelled.time_slot,
            recommendation,
        })
    }

    /// Appointments in `category`, in creation order.
    pub fn list_appointments(&self, category: StatusCategory) -> Vec<&Appointment> {
        self.store.by_category(category)
    }

    pub fn appointment(&self, appointment_id: &str) -> Option<&Appointment> {
        self.store.get(appointment_id)
    }

    pub fn appointments(&self) -> &[Appointment] {
        self.store.all()
    }

    pub fn active_appointment(&self) -> Option<&Appointment> {
        self.store.active()
    }

    pub fn has_live_appointments(&self) -> bool {
        self.store.has_live()
    }

    /// Applies every automatic transition due at `now`.
    pub fn tick_all(&mut self, now: OffsetDateTime) -> Result<Vec<Transition>, AppError> {
        let live: Vec<String> = self
            .store
            .all()
            .iter()
            .filter(|a| !a.status.is_terminal())
            .map(|a| a.id.clone())
            .collect();

        let mut transitions = Vec::new();
        for id in live {
            self.settle(&id, now, &mut transitions)?;
        }
        Ok(transitions)
    }

    /// Overwrites slot counts for a branch and date. Slots not listed become 0.
    pub fn seed_counts(
        &mut self,
        branch_id: &str,
        date: Date,
        counts: &[(TimeSlot, u32)],
    ) -> Result<(), StoreError> {
        self.density.seed_counts(branch_id, date, counts)
    }

    fn apply(
        &mut self,
        appointment_id: &str,
        action: UserAction,
        now: OffsetDateTime,
    ) -> Result<Appointment, AppError> {
        let current = self.settle(appointment_id, now, &mut Vec::new())?;

        let next = match lifecycle::apply_action(current.status, action) {
            Ok(next) => next,
            Err(err) => {
                warn!(
                    appointment_id = %current.id,
                    status = %current.status,
                    action = %action,
                    "Action rejected"
                );
                return Err(err);
            }
        };

        let updated = self
            .store
            .set_status(&current.id, next, now)?
            .ok_or_else(|| AppError::AppointmentNotFound(appointment_id.to_string()))?;
        info!(
            appointment_id = %updated.id,
            from = %current.status,
            to = %updated.status,
            action = %action,
            "Appointment updated"
        );
        Ok(updated)
    }

    // Runs tick until nothing more is due, recording each step.
    fn settle(
        &mut self,
        appointment_id: &str,
        now: OffsetDateTime,
        transitions: &mut Vec<Transition>,
    ) -> Result<Appointment, AppError> {
        let mut current = self.find(appointment_id)?.clone();
        for _ in 0..MAX_TICK_STEPS {
            let Some(next) = lifecycle::tick(&current, now, &self.lifecycle) else {
                break;
            };
            let from = current.status;
            current = self
                .store
                .set_status(&current.id, next, now)?
                .ok_or_else(|| AppError::AppointmentNotFound(appointment_id.to_string()))?;
            info!(
                appointment_id = %current.id,
                from = %from,
                to = %next,
                "Automatic transition"
            );
            transitions.push(Transition {
                appointment_id: current.id.clone(),
                from,
                to: next,
            });
        }
        Ok(current)
    }

    fn find(&self, appointment_id: &str) -> Result<&Appointment, AppError> {
        self.store
            .get(appointment_id.trim())
            .ok_or_else(|| AppError::AppointmentNotFound(appointment_id.to_string()))
    }

    fn slot_open(&self, date: Date, slot: TimeSlot, now: OffsetDateTime) -> bool {
        now <= self.lifecycle.slot_start(date, slot)
    }
}

fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string())
}
