use serde::Deserialize;

pub mod density;
pub mod four_tier;
pub mod model;
pub mod recommend;
pub mod three_tier;
pub mod wait_time;

use four_tier::FourTierScale;
use model::CrowdScale;
use three_tier::ThreeTierScale;

pub use four_tier::classify;

/// Crowd scale selected by `crowd_scale` in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrowdScaleKind {
    #[default]
    FourTier,
    ThreeTier,
}

// Scale Factory
pub fn create_scale(kind: CrowdScaleKind) -> Box<dyn CrowdScale> {
    match kind {
        CrowdScaleKind::FourTier => Box::new(FourTierScale),
        CrowdScaleKind::ThreeTier => Box::new(ThreeTierScale),
    }
}
