//! Background driver for time-based appointment transitions.

use crate::engine::Transition;
use crate::error::AppError;
use crate::state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

/// Runs one tick over every live appointment and publishes the result.
///
/// Does nothing, and publishes nothing, when no appointment is live.
pub fn run_tick_cycle(
    state: &Arc<RwLock<AppState>>,
    now: OffsetDateTime,
) -> Result<Vec<Transition>, AppError> {
    let mut guard = state.write().map_err(|_| AppError::StateLock)?;
    if !guard.engine().has_live_appointments() {
        return Ok(Vec::new());
    }

    let transitions = guard.engine_mut().tick_all(now)?;
    if !transitions.is_empty() {
        guard.publish_appointments();
        debug!(count = transitions.len(), "Published appointment snapshot");
    }
    Ok(transitions)
}

pub fn spawn_tick_thread(
    state: Arc<RwLock<AppState>>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    info!(
        interval_ms = interval.as_millis(),
        "Starting lifecycle tick thread"
    );
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            match run_tick_cycle(&state, OffsetDateTime::now_utc()) {
                Ok(_) => {}
                Err(AppError::StateLock) => {
                    error!("State lock poisoned, stopping tick thread");
                    break;
                }
                Err(e) => warn!(error = %e, "Error running tick cycle"),
            }

            sleep_with_stop(interval, &stop, cycle_start);
        }
    })
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let elapsed = start.elapsed();
    if elapsed >= duration {
        return;
    }
    let remaining = duration - elapsed;
    let step = Duration::from_millis(100).min(remaining);
    let mut slept = Duration::ZERO;

    while slept < remaining {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(step);
        slept += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ServiceId, TimeSlot, default_branches};
    use crate::engine::{BookingRequest, EngineSettings, VisitEngine};
    use crate::lifecycle::AppointmentStatus;
    use crate::store::memory::MemoryStore;
    use time::macros::{date, datetime};

    fn shared_state() -> Result<Arc<RwLock<AppState>>, AppError> {
        let engine = VisitEngine::new(
            EngineSettings::default(),
            default_branches(),
            Arc::new(MemoryStore::new()),
        )?;
        Ok(Arc::new(RwLock::new(AppState::new(engine))))
    }

    fn book(state: &Arc<RwLock<AppState>>, slot: &str) -> Result<String, AppError> {
        let mut guard = state.write().map_err(|_| AppError::StateLock)?;
        let appointment = guard.engine_mut().book_slot(
            BookingRequest {
                service_id: ServiceId::KycUpdate,
                branch_id: "br-central".to_string(),
                visit_date: date!(2026-03-04),
                time_slot: TimeSlot::parse(slot)?,
                user_name: "Nila".to_string(),
            },
            datetime!(2026-03-04 08:00 UTC),
        )?;
        Ok(appointment.id)
    }

    #[test]
    fn cycle_without_live_appointments_is_a_no_op() -> Result<(), AppError> {
        let state = shared_state()?;
        let transitions = run_tick_cycle(&state, datetime!(2026-03-04 12:00 UTC))?;
        assert!(transitions.is_empty());
        Ok(())
    }

    #[test]
    fn cycle_publishes_transitions_to_subscribers() -> Result<(), AppError> {
        let state = shared_state()?;
        let id = book(&state, "10:00 AM")?;
        let mut receiver = state
            .read()
            .map_err(|_| AppError::StateLock)?
            .subscribe_appointments();

        let transitions = run_tick_cycle(&state, datetime!(2026-03-04 10:15 UTC))?;

        assert_eq!(transitions.len(), 1);
        assert!(receiver.has_changed().unwrap_or(false));
        let published = receiver.borrow_and_update().clone();
        let status = published.iter().find(|a| a.id == id).map(|a| a.status);
        assert_eq!(status, Some(AppointmentStatus::Missed));
        Ok(())
    }

    #[test]
    fn cycle_reports_poisoned_lock() {
        let state = shared_state().unwrap_or_else(|e| panic!("{e}"));
        let state_for_thread = Arc::clone(&state);
        let _ = std::thread::spawn(move || {
            let _guard = state_for_thread.write().expect("lock for poison");
            panic!("poison lock");
        })
        .join();

        let result = run_tick_cycle(&state, datetime!(2026-03-04 10:15 UTC));
        assert!(matches!(result, Err(AppError::StateLock)));
    }

    #[test]
    fn tick_thread_stops_on_flag() -> Result<(), AppError> {
        let state = shared_state()?;
        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_tick_thread(Arc::clone(&state), Duration::from_millis(50), Arc::clone(&stop));

        stop.store(true, Ordering::Relaxed);
        assert!(handle.join().is_ok());
        Ok(())
    }
}
