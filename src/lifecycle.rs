//! Appointment status state machine.
//!
//! User actions go through [`apply_action`]; time-driven moves come from
//! [`tick`], a pure function of the appointment and the current time that an
//! external driver calls periodically.

use crate::catalog::TimeSlot;
use crate::error::AppError;
use crate::state::Appointment;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::macros::time;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Scheduled,
    Arrived,
    InProgress,
    Completed,
    Cancelled,
    Missed,
    Expired,
}

impl AppointmentStatus {
    /// Completed, Cancelled and Expired never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Expired
        )
    }

    /// Every status reachable in a single step, whether by user action or tick.
    pub fn successors(self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Scheduled => &[Arrived, Missed, Cancelled],
            Missed => &[Arrived, Cancelled, Expired],
            Arrived => &[InProgress, Cancelled, Expired],
            InProgress => &[Completed],
            Completed | Cancelled | Expired => &[],
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Arrived => "Arrived",
            AppointmentStatus::InProgress => "In Progress",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::Missed => "Missed",
            AppointmentStatus::Expired => "Expired",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    MarkArrival,
    Cancel,
    Reschedule,
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UserAction::MarkArrival => "mark arrival",
            UserAction::Cancel => "cancel",
            UserAction::Reschedule => "reschedule",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Time spent in Arrived and in InProgress before the next automatic step.
    pub dwell: Duration,
    pub business_close: Time,
    /// Offset of the branch's wall clock.
    pub utc_offset: UtcOffset,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            dwell: Duration::seconds(10),
            business_close: time!(17:00),
            utc_offset: UtcOffset::UTC,
        }
    }
}

impl LifecycleSettings {
    pub fn slot_start(&self, date: Date, slot: TimeSlot) -> OffsetDateTime {
        PrimitiveDateTime::new(date, slot.start_time()).assume_offset(self.utc_offset)
    }

    pub fn business_close_on(&self, date: Date) -> OffsetDateTime {
        PrimitiveDateTime::new(date, self.business_close).assume_offset(self.utc_offset)
    }

    pub fn local_date(&self, now: OffsetDateTime) -> Date {
        now.to_offset(self.utc_offset).date()
    }
}

/// Applies a user action, returning the new status or a rejection.
///
/// InProgress refuses cancel and reschedule: once service has started it must
/// run to Completed. A rescheduled appointment ends Cancelled; the caller books
/// its replacement.
pub fn apply_action(
    status: AppointmentStatus,
    action: UserAction,
) -> Result<AppointmentStatus, AppError> {
    use AppointmentStatus::*;
    match (status, action) {
        (Scheduled | Missed, UserAction::MarkArrival) => Ok(Arrived),
        (Scheduled | Arrived | Missed, UserAction::Cancel | UserAction::Reschedule) => {
            Ok(Cancelled)
        }
        _ => Err(AppError::TransitionRejected { status, action }),
    }
}

/// Returns the automatic transition due at `now`, if any.
///
/// A Scheduled appointment whose slot has started becomes Missed; Missed and
/// Arrived appointments become Expired once the business day closes. A
/// Scheduled appointment found after closing therefore reaches Expired over two
/// ticks, via Missed. InProgress only ever moves to Completed.
pub fn tick(
    appointment: &Appointment,
    now: OffsetDateTime,
    settings: &LifecycleSettings,
) -> Option<AppointmentStatus> {
    use AppointmentStatus::*;
    let dwell_elapsed = now - appointment.status_changed_at >= settings.dwell;
    let day_closed = now > settings.business_close_on(appointment.visit_date);

    match appointment.status {
        Completed | Cancelled | Expired => None,
        InProgress => dwell_elapsed.then_some(Completed),
        Missed | Arrived if day_closed => Some(Expired),
        Arrived => dwell_elapsed.then_some(InProgress),
        Scheduled => {
            let slot_start = settings.slot_start(appointment.visit_date, appointment.time_slot);
            (now > slot_start).then_some(Missed)
        }
        Missed => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ServiceId;
    use time::macros::{date, datetime};

    const ALL: [AppointmentStatus; 7] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Arrived,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Missed,
        AppointmentStatus::Expired,
    ];

    fn appointment_at(status: AppointmentStatus, changed_at: OffsetDateTime) -> Appointment {
        Appointment {
            id: "APP-1000".to_string(),
            service_id: ServiceId::Locker,
            branch_id: "br-central".to_string(),
            branch_name: "Central Plaza Branch".to_string(),
            visit_date: date!(2026-03-04),
            time_slot: TimeSlot::parse("11:00 AM").unwrap_or_else(|e| panic!("{e}")),
            user_name: "Meera".to_string(),
            status,
            created_at: datetime!(2026-03-03 09:00 UTC),
            sequence: 0,
            status_changed_at: changed_at,
        }
    }

    #[test]
    fn scheduled_reaches_only_arrived_missed_or_cancelled() {
        let successors = AppointmentStatus::Scheduled.successors();
        assert!(!successors.contains(&AppointmentStatus::Completed));
        assert!(!successors.contains(&AppointmentStatus::InProgress));

        for action in [UserAction::MarkArrival, UserAction::Cancel, UserAction::Reschedule] {
            if let Ok(next) = apply_action(AppointmentStatus::Scheduled, action) {
                assert!(successors.contains(&next));
            }
        }

        let settings = LifecycleSettings::default();
        let changed = datetime!(2026-03-03 09:00 UTC);
        for now in [
            datetime!(2026-03-04 10:59 UTC),
            datetime!(2026-03-04 11:01 UTC),
            datetime!(2026-03-04 17:30 UTC),
            datetime!(2026-03-09 12:00 UTC),
        ] {
            let appointment = appointment_at(AppointmentStatus::Scheduled, changed);
            if let Some(next) = tick(&appointment, now, &settings) {
                assert!(successors.contains(&next), "unexpected {next} at {now}");
            }
        }
    }

    #[test]
    fn every_transition_stays_within_successors() {
        let settings = LifecycleSettings::default();
        let changed = datetime!(2026-03-04 10:00 UTC);
        let probes = [
            datetime!(2026-03-04 10:00:05 UTC),
            datetime!(2026-03-04 11:30 UTC),
            datetime!(2026-03-04 18:00 UTC),
        ];
        for status in ALL {
            for action in [UserAction::MarkArrival, UserAction::Cancel, UserAction::Reschedule] {
                if let Ok(next) = apply_action(status, action) {
                    assert!(status.successors().contains(&next), "{status} -> {next}");
                }
            }
            for now in probes {
                if let Some(next) = tick(&appointment_at(status, changed), now, &settings) {
                    assert!(status.successors().contains(&next), "{status} -> {next}");
                }
            }
        }
    }

    #[test]
    fn in_progress_rejects_cancel_and_reschedule() {
        for action in [UserAction::Cancel, UserAction::Reschedule] {
            let result = apply_action(AppointmentStatus::InProgress, action);
            assert!(matches!(
                result,
                Err(AppError::TransitionRejected {
                    status: AppointmentStatus::InProgress,
                    ..
                })
            ));
        }
    }

    #[test]
    fn terminal_statuses_reject_every_action() {
        for status in ALL.into_iter().filter(|s| s.is_terminal()) {
            for action in [UserAction::MarkArrival, UserAction::Cancel, UserAction::Reschedule] {
                assert!(apply_action(status, action).is_err());
            }
        }
    }

    #[test]
    fn missed_allows_late_arrival() {
        assert_eq!(
            apply_action(AppointmentStatus::Missed, UserAction::MarkArrival).ok(),
            Some(AppointmentStatus::Arrived)
        );
    }

    #[test]
    fn scheduled_becomes_missed_after_slot_start() {
        let settings = LifecycleSettings::default();
        let appointment = appointment_at(
            AppointmentStatus::Scheduled,
            datetime!(2026-03-03 09:00 UTC),
        );

        assert_eq!(tick(&appointment, datetime!(2026-03-04 11:00 UTC), &settings), None);
        assert_eq!(
            tick(&appointment, datetime!(2026-03-04 11:00:01 UTC), &settings),
            Some(AppointmentStatus::Missed)
        );
    }

    #[test]
    fn missed_expires_at_close() {
        let settings = LifecycleSettings::default();
        let appointment =
            appointment_at(AppointmentStatus::Missed, datetime!(2026-03-04 11:01 UTC));

        assert_eq!(tick(&appointment, datetime!(2026-03-04 16:59 UTC), &settings), None);
        assert_eq!(
            tick(&appointment, datetime!(2026-03-04 17:00:01 UTC), &settings),
            Some(AppointmentStatus::Expired)
        );
    }

    #[test]
    fn arrived_and_in_progress_advance_after_dwell() {
        let settings = LifecycleSettings::default();
        let changed = datetime!(2026-03-04 11:00 UTC);

        let arrived = appointment_at(AppointmentStatus::Arrived, changed);
        assert_eq!(tick(&arrived, changed + Duration::seconds(9), &settings), None);
        assert_eq!(
            tick(&arrived, changed + Duration::seconds(10), &settings),
            Some(AppointmentStatus::InProgress)
        );

        let in_progress = appointment_at(AppointmentStatus::InProgress, changed);
        assert_eq!(
            tick(&in_progress, changed + Duration::seconds(10), &settings),
            Some(AppointmentStatus::Completed)
        );
    }

    #[test]
    fn in_progress_is_never_expired() {
        let settings = LifecycleSettings::default();
        let changed = datetime!(2026-03-04 16:59:58 UTC);
        let in_progress = appointment_at(AppointmentStatus::InProgress, changed);

        assert_eq!(tick(&in_progress, datetime!(2026-03-04 17:00:05 UTC), &settings), None);
        assert_eq!(
            tick(&in_progress, datetime!(2026-03-04 17:00:08 UTC), &settings),
            Some(AppointmentStatus::Completed)
        );
    }

    #[test]
    fn tick_is_idempotent_without_state_change() {
        let settings = LifecycleSettings::default();
        let appointment = appointment_at(
            AppointmentStatus::Scheduled,
            datetime!(2026-03-03 09:00 UTC),
        );
        let now = datetime!(2026-03-04 10:30 UTC);
        assert_eq!(tick(&appointment, now, &settings), None);
        assert_eq!(tick(&appointment, now, &settings), None);
    }

    #[test]
    fn slot_start_honours_offset() -> Result<(), time::error::ComponentRange> {
        let settings = LifecycleSettings {
            utc_offset: UtcOffset::from_hms(5, 30, 0)?,
            ..LifecycleSettings::default()
        };
        let slot = TimeSlot::parse("10:00 AM").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            settings.slot_start(date!(2026-03-04), slot),
            datetime!(2026-03-04 04:30 UTC)
        );
        Ok(())
    }
}
