//! Four-tier crowd scale on the load percentage.
//!
//! Low up to 25%, Moderate up to 60%, High up to 85%, Very High beyond.

use crate::estimation::model::{CrowdLabel, CrowdScale, load_percent};

pub const LOW_MAX_PERCENT: u32 = 25;
pub const MODERATE_MAX_PERCENT: u32 = 60;
pub const HIGH_MAX_PERCENT: u32 = 85;

#[derive(Debug, Default, Clone, Copy)]
pub struct FourTierScale;

impl CrowdScale for FourTierScale {
    fn classify(&self, count: u32, capacity: u32) -> CrowdLabel {
        classify(count, capacity)
    }

    fn name(&self) -> &'static str {
        "four_tier"
    }
}

pub fn classify(count: u32, capacity: u32) -> CrowdLabel {
    let percent = load_percent(count, capacity);
    if percent <= LOW_MAX_PERCENT {
        CrowdLabel::Low
    } else if percent <= MODERATE_MAX_PERCENT {
        CrowdLabel::Moderate
    } else if percent <= HIGH_MAX_PERCENT {
        CrowdLabel::High
    } else {
        CrowdLabel::VeryHigh
    }
}
