//! Human-readable narration of a slot recommendation.
//!
//! An external text service may phrase the advice, but the slot itself always
//! comes from the deterministic recommendation. When the service is absent,
//! fails, or names different slots, the local narrator is used instead.

use crate::catalog::{ServiceId, TimeSlot};
use crate::estimation::model::CrowdLabel;
use crate::estimation::recommend::Recommendation;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::warn;

pub mod remote;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisoryRequest {
    pub service: String,
    pub recommended_slot: TimeSlot,
    pub crowd_label: CrowdLabel,
    pub average_load_percent: u32,
}

impl AdvisoryRequest {
    pub fn new(service_id: ServiceId, recommendation: &Recommendation) -> Self {
        Self {
            service: service_id.service().label.to_string(),
            recommended_slot: recommendation.recommended_slot,
            crowd_label: recommendation.crowd_label,
            average_load_percent: recommendation.average_load_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Advice {
    pub text: String,
    /// Slots the advisor mentions, as free-form labels.
    pub suggested_slots: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("dns error: {0}")]
    Dns(String),
    #[error("connect error: {0}")]
    Connect(std::io::Error),
    #[error("io error: {0}")]
    Io(std::io::Error),
    #[error("http status {0} ({1})")]
    Http(u16, String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("advisor returned no text")]
    Empty,
}

pub trait Advisor: Send + Sync + fmt::Debug {
    fn advise(&self, request: &AdvisoryRequest) -> Result<Advice, AdvisoryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceSource {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Narration {
    pub text: String,
    pub source: AdviceSource,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalAdvisor;

impl LocalAdvisor {
    pub fn describe(request: &AdvisoryRequest) -> String {
        let outlook = match request.crowd_label {
            CrowdLabel::Low => "expect a short queue",
            CrowdLabel::Moderate => "expect a steady but manageable queue",
            CrowdLabel::High => "every slot is busy, this one least so",
            CrowdLabel::VeryHigh => "the branch is heavily booked all day",
        };
        format!(
            "Visit at {} for {}: crowd {}, {} (overall branch load {}%).",
            request.recommended_slot,
            request.service,
            request.crowd_label,
            outlook,
            request.average_load_percent
        )
    }
}

impl Advisor for LocalAdvisor {
    fn advise(&self, request: &AdvisoryRequest) -> Result<Advice, AdvisoryError> {
        Ok(Advice {
            text: Self::describe(request),
            suggested_slots: vec![request.recommended_slot.label().to_string()],
        })
    }
}

/// Narrates `request` through `advisor`, falling back to [`LocalAdvisor`].
pub fn narrate(advisor: Option<&dyn Advisor>, request: &AdvisoryRequest) -> Narration {
    let local = || Narration {
        text: LocalAdvisor::describe(request),
        source: AdviceSource::Local,
    };

    let Some(advisor) = advisor else {
        return local();
    };

    match advisor.advise(request) {
        Ok(advice) if advice.text.trim().is_empty() => {
            warn!(error = %AdvisoryError::Empty, "Advisory text unusable, using local narration");
            local()
        }
        Ok(advice) if !agrees_with(&advice, request.recommended_slot) => {
            warn!(
                recommended = %request.recommended_slot,
                suggested = ?advice.suggested_slots,
                "Advisory suggests other slots, keeping deterministic pick"
            );
            local()
        }
        Ok(advice) => Narration {
            text: advice.text,
            source: AdviceSource::Remote,
        },
        Err(err) => {
            warn!(error = %err, "Advisory call failed, using local narration");
            local()
        }
    }
}

fn agrees_with(advice: &Advice, slot: TimeSlot) -> bool {
    advice.suggested_slots.is_empty()
        || advice
            .suggested_slots
            .iter()
            .any(|label| TimeSlot::parse(label).is_ok_and(|parsed| parsed == slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Scripted(Result<Advice, fn() -> AdvisoryError>);

    impl Advisor for Scripted {
        fn advise(&self, _request: &AdvisoryRequest) -> Result<Advice, AdvisoryError> {
            match &self.0 {
                Ok(advice) => Ok(advice.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn request() -> AdvisoryRequest {
        AdvisoryRequest {
            service: "Locker Services".to_string(),
            recommended_slot: TimeSlot::parse("11:00 AM").unwrap_or_else(|e| panic!("{e}")),
            crowd_label: CrowdLabel::Low,
            average_load_percent: 42,
        }
    }

    #[test]
    fn no_advisor_uses_local_text() {
        let narration = narrate(None, &request());
        assert_eq!(narration.source, AdviceSource::Local);
        assert!(narration.text.contains("11:00 AM"));
        assert!(narration.text.contains("42%"));
    }

    #[test]
    fn agreeing_remote_text_is_used() {
        let advisor = Scripted(Ok(Advice {
            text: "Come at 11 for a quiet branch.".to_string(),
            suggested_slots: vec!["11:00".to_string(), "03:30 PM".to_string()],
        }));
        let narration = narrate(Some(&advisor), &request());
        assert_eq!(narration.source, AdviceSource::Remote);
        assert_eq!(narration.text, "Come at 11 for a quiet branch.");
    }

    #[test]
    fn disagreeing_remote_text_is_discarded() {
        let advisor = Scripted(Ok(Advice {
            text: "Try 03:45 PM instead.".to_string(),
            suggested_slots: vec!["03:45 PM".to_string()],
        }));
        let narration = narrate(Some(&advisor), &request());
        assert_eq!(narration.source, AdviceSource::Local);
    }

    #[test]
    fn failing_or_empty_remote_falls_back() {
        let failing = Scripted(Err(|| AdvisoryError::Http(503, "busy".to_string())));
        assert_eq!(narrate(Some(&failing), &request()).source, AdviceSource::Local);

        let empty = Scripted(Ok(Advice::default()));
        assert_eq!(narrate(Some(&empty), &request()).source, AdviceSource::Local);
    }
}
