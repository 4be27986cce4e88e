//! Queue wait estimation for a single appointment.
//!
//! Formula: `wait = clamp(round(workload / counters * smoothing * multiplier), min, max)`
//! where `workload` is the summed average service time of everyone ahead and
//! `multiplier` comes from the crowd label of the appointment's own slot.

use crate::estimation::model::CrowdLabel;
use crate::state::Appointment;
use serde::{Deserialize, Serialize};

/// Which queued appointments count as ahead of a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueScope {
    /// Everyone created earlier for the same branch and day, whatever their slot.
    #[default]
    Day,
    /// Only those created earlier for the same slot.
    Slot,
}

/// Never `Low`: the estimate is reported as High or Medium confidence only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WaitTimeParams {
    pub counters: u32,
    pub smoothing_factor: f64,
    pub min_wait_minutes: u32,
    pub max_wait_minutes: u32,
    /// Queue length at which confidence drops to Medium.
    pub confidence_threshold: usize,
}

impl Default for WaitTimeParams {
    fn default() -> Self {
        Self {
            counters: 4,
            smoothing_factor: 0.65,
            min_wait_minutes: 5,
            max_wait_minutes: 60,
            confidence_threshold: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitEstimate {
    pub estimate_minutes: u32,
    pub confidence: Confidence,
    pub ahead_count: usize,
    pub crowd_label: CrowdLabel,
}

#[derive(Debug, Clone, Default)]
pub struct WaitTimeEstimator {
    pub params: WaitTimeParams,
}

impl WaitTimeEstimator {
    pub fn new(params: WaitTimeParams) -> Self {
        Self { params }
    }

    pub fn estimate(&self, ahead: &[&Appointment], slot_label: CrowdLabel) -> WaitEstimate {
        let workload_minutes: u32 = ahead.iter().map(|a| a.service_id.average_minutes()).sum();
        let raw_minutes = self.raw_wait_minutes(workload_minutes);
        let scaled = (raw_minutes * slot_label.wait_multiplier()).round();

        let min = f64::from(self.params.min_wait_minutes);
        let max = f64::from(self.params.max_wait_minutes.max(self.params.min_wait_minutes));
        let estimate_minutes = scaled.clamp(min, max) as u32;

        let confidence = if ahead.len() < self.params.confidence_threshold {
            Confidence::High
        } else {
            Confidence::Medium
        };

        WaitEstimate {
            estimate_minutes,
            confidence,
            ahead_count: ahead.len(),
            crowd_label: slot_label,
        }
    }

    fn raw_wait_minutes(&self, workload_minutes: u32) -> f64 {
        let counters = f64::from(self.params.counters.max(1));
        f64::from(workload_minutes) / counters * self.params.smoothing_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ServiceId, TimeSlot};
    use crate::lifecycle::AppointmentStatus;
    use time::macros::{date, datetime};

    fn queued(id: &str, service_id: ServiceId) -> Appointment {
        let created_at = datetime!(2026-03-04 08:00 UTC);
        Appointment {
            id: id.to_string(),
            service_id,
            branch_id: "br-central".to_string(),
            branch_name: "Central Plaza Branch".to_string(),
            visit_date: date!(2026-03-04),
            time_slot: TimeSlot::parse("10:00 AM").unwrap_or_else(|e| panic!("{e}")),
            user_name: "Queue".to_string(),
            status: AppointmentStatus::Scheduled,
            created_at,
            sequence: 0,
            status_changed_at: created_at,
        }
    }

    #[test]
    fn two_ahead_on_a_low_slot() {
        let estimator = WaitTimeEstimator::default();
        let first = queued("APP-1000", ServiceId::OpenAccount);
        let second = queued("APP-1001", ServiceId::KycUpdate);

        let estimate = estimator.estimate(&[&first, &second], CrowdLabel::Low);

        // (65 / 4) * 0.65 = 10.5625, * 0.7 = 7.39
        assert_eq!(estimate.estimate_minutes, 7);
        assert_eq!(estimate.confidence, Confidence::High);
        assert_eq!(estimate.ahead_count, 2);
    }

    #[test]
    fn empty_queue_is_clamped_to_minimum() {
        let estimator = WaitTimeEstimator::default();
        let estimate = estimator.estimate(&[], CrowdLabel::VeryHigh);
        assert_eq!(estimate.estimate_minutes, 5);
        assert_eq!(estimate.confidence, Confidence::High);
    }

    #[test]
    fn long_queue_is_clamped_to_maximum_with_medium_confidence() {
        let estimator = WaitTimeEstimator::default();
        let queue: Vec<Appointment> = (0..10)
            .map(|i| queued(&format!("APP-{}", 1000 + i), ServiceId::Loans))
            .collect();
        let ahead: Vec<&Appointment> = queue.iter().collect();

        let estimate = estimator.estimate(&ahead, CrowdLabel::High);

        // (600 / 4) * 0.65 * 1.3 = 126.75
        assert_eq!(estimate.estimate_minutes, 60);
        assert_eq!(estimate.confidence, Confidence::Medium);
    }

    #[test]
    fn confidence_drops_exactly_at_threshold() {
        let estimator = WaitTimeEstimator::default();
        let queue: Vec<Appointment> = (0..6)
            .map(|i| queued(&format!("APP-{}", 1000 + i), ServiceId::KycUpdate))
            .collect();
        let five: Vec<&Appointment> = queue.iter().take(5).collect();
        let six: Vec<&Appointment> = queue.iter().collect();

        assert_eq!(estimator.estimate(&five, CrowdLabel::Low).confidence, Confidence::High);
        assert_eq!(estimator.estimate(&six, CrowdLabel::Low).confidence, Confidence::Medium);
    }

    #[test]
    fn multiplier_orders_estimates_by_crowd() {
        let estimator = WaitTimeEstimator::default();
        let queue: Vec<Appointment> = (0..4)
            .map(|i| queued(&format!("APP-{}", 1000 + i), ServiceId::Business))
            .collect();
        let ahead: Vec<&Appointment> = queue.iter().collect();

        // raw = (200 / 4) * 0.65 = 32.5
        let minutes: Vec<u32> = [
            CrowdLabel::Low,
            CrowdLabel::Moderate,
            CrowdLabel::High,
            CrowdLabel::VeryHigh,
        ]
        .into_iter()
        .map(|label| estimator.estimate(&ahead, label).estimate_minutes)
        .collect();
        assert_eq!(minutes, [23, 33, 42, 52]);
    }
}
