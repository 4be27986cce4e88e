//! Deterministic slot recommendation.
//!
//! The best slot is the earliest one in the best crowd tier present, trying
//! Low, Moderate, High, then Very High. This pick is authoritative: advisory
//! text may describe it but never replaces it.

use crate::catalog::TimeSlot;
use crate::estimation::density::{DensitySnapshot, SlotDensity};
use crate::estimation::model::CrowdLabel;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub recommended_slot: TimeSlot,
    pub crowd_label: CrowdLabel,
    pub average_load_percent: u32,
    pub slots: Vec<SlotDensity>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RecommendationEngine;

impl RecommendationEngine {
    /// Recommends among all slots of the snapshot.
    pub fn recommend(&self, snapshot: &DensitySnapshot) -> Option<Recommendation> {
        self.recommend_where(snapshot, |_| true)
    }

    /// Recommends among the slots accepted by `eligible`. `None` only when no
    /// slot is eligible.
    pub fn recommend_where<F>(&self, snapshot: &DensitySnapshot, eligible: F) -> Option<Recommendation>
    where
        F: Fn(TimeSlot) -> bool,
    {
        let best = snapshot
            .slots
            .iter()
            .filter(|density| eligible(density.slot))
            .min_by_key(|density| (density.crowd_label, density.slot))?;

        Some(Recommendation {
            recommended_slot: best.slot,
            crowd_label: best.crowd_label,
            average_load_percent: snapshot.average_load_percent,
            slots: snapshot.slots.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::model::load_percent;

    fn snapshot(labels: &[(&str, u32, CrowdLabel)]) -> DensitySnapshot {
        let slots = labels
            .iter()
            .map(|(label, count, crowd_label)| SlotDensity {
                slot: TimeSlot::parse(label).unwrap_or_else(|e| panic!("{e}")),
                count: *count,
                load_percent: load_percent(*count, 8),
                crowd_label: *crowd_label,
            })
            .collect();
        DensitySnapshot {
            slots,
            average_load_percent: 40,
        }
    }

    #[test]
    fn picks_earliest_slot_in_best_tier() {
        let snapshot = snapshot(&[
            ("10:00 AM", 5, CrowdLabel::Moderate),
            ("10:30 AM", 1, CrowdLabel::Low),
            ("11:00 AM", 0, CrowdLabel::Low),
        ]);

        let recommendation = RecommendationEngine.recommend(&snapshot);

        let picked = recommendation.map(|r| (r.recommended_slot.label(), r.crowd_label));
        assert_eq!(picked, Some(("10:30 AM", CrowdLabel::Low)));
    }

    #[test]
    fn falls_through_to_worst_tier() {
        let snapshot = snapshot(&[
            ("10:00 AM", 8, CrowdLabel::VeryHigh),
            ("10:30 AM", 8, CrowdLabel::VeryHigh),
        ]);

        let recommendation = RecommendationEngine.recommend(&snapshot);

        assert_eq!(
            recommendation.map(|r| r.recommended_slot.label()),
            Some("10:00 AM")
        );
    }

    #[test]
    fn never_picks_worse_than_best_available() {
        let tiers = [
            CrowdLabel::High,
            CrowdLabel::VeryHigh,
            CrowdLabel::Moderate,
            CrowdLabel::High,
            CrowdLabel::Moderate,
        ];
        let labels: Vec<(&str, u32, CrowdLabel)> = ["10:00 AM", "10:30 AM", "11:00 AM", "11:30 AM", "12:00 PM"]
            .into_iter()
            .zip(tiers)
            .map(|(slot, tier)| (slot, 4, tier))
            .collect();
        let snapshot = snapshot(&labels);

        let recommendation = RecommendationEngine.recommend(&snapshot);

        let best_available = tiers.iter().min().copied();
        assert_eq!(recommendation.as_ref().map(|r| r.crowd_label), best_available);
        assert_eq!(
            recommendation.map(|r| r.recommended_slot.label()),
            Some("11:00 AM")
        );
    }

    #[test]
    fn eligibility_filter_excludes_slots() {
        let snapshot = snapshot(&[
            ("10:00 AM", 0, CrowdLabel::Low),
            ("10:30 AM", 6, CrowdLabel::High),
        ]);
        let cutoff = TimeSlot::parse("10:30 AM").unwrap_or_else(|e| panic!("{e}"));

        let recommendation = RecommendationEngine.recommend_where(&snapshot, |slot| slot >= cutoff);
        assert_eq!(
            recommendation.map(|r| r.recommended_slot.label()),
            Some("10:30 AM")
        );

        assert!(RecommendationEngine.recommend_where(&snapshot, |_| false).is_none());
    }
}
