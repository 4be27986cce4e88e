//! Crowd scale trait for pluggable slot classification.
//!
//! A scale turns a slot's booking count into a qualitative [`CrowdLabel`].
//! Scales are selected via `crowd_scale` in the `[engine]` config section.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualitative crowd tier. Variant order is the preference order used when
/// recommending a slot: `Low` is best, `VeryHigh` is worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CrowdLabel {
    Low,
    Moderate,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl CrowdLabel {
    /// Multiplier applied to the raw queue wait for a slot with this label.
    pub fn wait_multiplier(self) -> f64 {
        match self {
            CrowdLabel::Low => 0.7,
            CrowdLabel::Moderate => 1.0,
            CrowdLabel::High => 1.3,
            CrowdLabel::VeryHigh => 1.6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CrowdLabel::Low => "Low",
            CrowdLabel::Moderate => "Moderate",
            CrowdLabel::High => "High",
            CrowdLabel::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for CrowdLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for crowd scales.
///
/// Implementations must be pure: the same `(count, capacity)` always yields
/// the same label, and the label never improves as `count` grows.
pub trait CrowdScale: Send + Sync + fmt::Debug {
    fn classify(&self, count: u32, capacity: u32) -> CrowdLabel;

    /// Name used in config and logs.
    fn name(&self) -> &'static str;
}

/// Booking count as a percentage of slot capacity, rounded and capped at 100.
pub fn load_percent(count: u32, capacity: u32) -> u32 {
    total_load_percent(u64::from(count), u64::from(capacity))
}

/// [`load_percent`] over totals that may exceed `u32`, such as a whole day.
pub fn total_load_percent(total: u64, capacity: u64) -> u32 {
    if capacity == 0 {
        return 100;
    }
    let percent = (total as f64 / capacity as f64 * 100.0).round();
    (percent as u32).min(100)
}
