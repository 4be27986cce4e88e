//! Three-tier crowd scale on raw booking counts.
//!
//! Low while `count <= ceil(capacity / 3)`, Moderate while
//! `count <= ceil(2 * capacity / 3)`, High beyond. With the usual capacity of
//! 8 that is 0-3 Low, 4-6 Moderate, 7+ High. Never yields `VeryHigh`.

use crate::estimation::model::{CrowdLabel, CrowdScale};

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreeTierScale;

impl ThreeTierScale {
    pub fn bounds(capacity: u32) -> (u32, u32) {
        let moderate_max = (2 * u64::from(capacity)).div_ceil(3);
        (capacity.div_ceil(3), moderate_max as u32)
    }
}

impl CrowdScale for ThreeTierScale {
    fn classify(&self, count: u32, capacity: u32) -> CrowdLabel {
        let (low_max, moderate_max) = Self::bounds(capacity);
        if count <= low_max {
            CrowdLabel::Low
        } else if count <= moderate_max {
            CrowdLabel::Moderate
        } else {
            CrowdLabel::High
        }
    }

    fn name(&self) -> &'static str {
        "three_tier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_for_capacity_eight() {
        assert_eq!(ThreeTierScale::bounds(8), (3, 6));
    }

    #[test]
    fn bounds_hold_for_the_largest_capacity() {
        let (low_max, moderate_max) = ThreeTierScale::bounds(u32::MAX);
        assert_eq!(low_max, 1_431_655_765);
        assert_eq!(moderate_max, 2_863_311_530);
        assert_eq!(ThreeTierScale.classify(u32::MAX, u32::MAX), CrowdLabel::High);
    }

    #[test]
    fn labels_for_capacity_eight() {
        let scale = ThreeTierScale;
        assert_eq!(scale.classify(1, 8), CrowdLabel::Low);
        assert_eq!(scale.classify(3, 8), CrowdLabel::Low);
        assert_eq!(scale.classify(4, 8), CrowdLabel::Moderate);
        assert_eq!(scale.classify(6, 8), CrowdLabel::Moderate);
        assert_eq!(scale.classify(7, 8), CrowdLabel::High);
        assert_eq!(scale.classify(50, 8), CrowdLabel::High);
    }

    #[test]
    fn classification_is_monotonic_in_count() {
        let scale = ThreeTierScale;
        for capacity in [1, 3, 8, 10] {
            let labels: Vec<CrowdLabel> =
                (0..=3 * capacity).map(|c| scale.classify(c, capacity)).collect();
            assert!(labels.windows(2).all(|pair| pair[0] <= pair[1]));
        }
    }
}
