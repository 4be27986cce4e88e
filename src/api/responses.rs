use crate::advisory::Narration;
use crate::catalog::{Service, ServiceId, TimeSlot};
use crate::estimation::density::SlotDensity;
use crate::estimation::model::CrowdLabel;
use crate::estimation::wait_time::Confidence;
use crate::state::Appointment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InvalidRequest,
    SlotUnavailable,
    TransitionRejected,
    AppointmentFinalized,
    InternalError,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
}

#[derive(Debug, Serialize)]
pub struct HealthSuccessResponse {
    pub status: HealthStatus,
    pub live_appointments: bool,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ServicesResponse {
    pub services: &'static [Service],
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub service_id: String,
    pub branch_id: String,
    /// `YYYY-MM-DD`; today at the branch when absent.
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub service_id: ServiceId,
    pub branch_id: String,
    pub date: String,
    pub recommended_slot: TimeSlot,
    pub crowd_label: CrowdLabel,
    pub average_load_percent: u32,
    pub slots: Vec<SlotDensity>,
    pub narration: Narration,
}

#[derive(Debug, Deserialize)]
pub struct BookingBody {
    pub service_id: String,
    pub branch_id: String,
    pub visit_date: String,
    pub time_slot: String,
    #[serde(default)]
    pub user_name: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Serialize)]
pub struct WaitResponse {
    pub appointment_id: String,
    pub estimate_minutes: u32,
    pub confidence: Confidence,
    pub ahead_count: usize,
    pub crowd_label: CrowdLabel,
}
