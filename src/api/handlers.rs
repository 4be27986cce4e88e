use crate::advisory::{AdvisoryRequest, narrate};
use crate::api::responses::{
    AppointmentsResponse, BookingBody, ErrorCode, ErrorResponse, HealthStatus,
    HealthSuccessResponse, ListQuery, RecommendationQuery, RecommendationResponse,
    ServicesResponse, WaitResponse,
};
use crate::catalog::{SERVICES, ServiceId, TimeSlot};
use crate::engine::{BookingContext, BookingRequest};
use crate::error::AppError;
use crate::state::{AppState, Appointment, DATE_FORMAT, StatusCategory, parse_visit_date};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, warn};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

type SharedState = Arc<RwLock<AppState>>;

pub enum ApiResponse<T> {
    Success { status: StatusCode, body: T },
    Error { status: StatusCode, body: ErrorResponse },
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success { status, body } => (status, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

fn ok<T>(body: T) -> ApiResponse<T> {
    ApiResponse::Success {
        status: StatusCode::OK,
        body,
    }
}

pub async fn get_health(State(state): State<SharedState>) -> impl IntoResponse {
    build_health_response(state, OffsetDateTime::now_utc())
}

pub async fn get_services() -> impl IntoResponse {
    build_services_response()
}

pub async fn get_recommendation(
    State(state): State<SharedState>,
    Query(query): Query<RecommendationQuery>,
) -> Response {
    let now = OffsetDateTime::now_utc();
    // Narration may block on the advisory endpoint.
    match tokio::task::spawn_blocking(move || build_recommendation_response(state, query, now))
        .await
    {
        Ok(response) => response.into_response(),
        Err(err) => {
            error!(error = %err, "Recommendation task failed");
            internal_error::<RecommendationResponse>("recommendation task failed", now)
                .into_response()
        }
    }
}

pub async fn list_appointments(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    build_list_response(state, query, OffsetDateTime::now_utc())
}

pub async fn create_appointment(
    State(state): State<SharedState>,
    Json(body): Json<BookingBody>,
) -> impl IntoResponse {
    build_booking_response(state, body, OffsetDateTime::now_utc())
}

pub async fn get_wait(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    build_wait_response(state, &id, OffsetDateTime::now_utc())
}

pub async fn post_arrival(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    build_arrival_response(state, &id, OffsetDateTime::now_utc())
}

pub async fn post_cancel(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    build_cancel_response(state, &id, OffsetDateTime::now_utc())
}

pub async fn post_reschedule(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    build_reschedule_response(state, &id, OffsetDateTime::now_utc())
}

fn build_health_response(
    state: SharedState,
    now: OffsetDateTime,
) -> ApiResponse<HealthSuccessResponse> {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => return internal_error("state lock poisoned while reading appointments", now),
    };
    let live_appointments = guard.engine().has_live_appointments();
    drop(guard);

    match format_timestamp(now) {
        Ok(timestamp) => ok(HealthSuccessResponse {
            status: HealthStatus::Ok,
            live_appointments,
            timestamp,
        }),
        Err(_) => internal_error("timestamp formatting failure", now),
    }
}

fn build_services_response() -> ApiResponse<ServicesResponse> {
    ok(ServicesResponse {
        services: &SERVICES,
    })
}

fn build_recommendation_response(
    state: SharedState,
    query: RecommendationQuery,
    now: OffsetDateTime,
) -> ApiResponse<RecommendationResponse> {
    let service_id = match query.service_id.parse::<ServiceId>() {
        Ok(service_id) => service_id,
        Err(err) => return error_response(&err, now),
    };

    let mut guard = match state.write() {
        Ok(guard) => guard,
        Err(_) => return internal_error("state lock poisoned while recommending", now),
    };
    let date = match query.date.as_deref() {
        Some(raw) => match parse_visit_date(raw) {
            Ok(date) => date,
            Err(err) => return error_response(&err, now),
        },
        None => guard.engine().lifecycle_settings().local_date(now),
    };
    let recommendation = match guard.engine_mut().recommendation(&query.branch_id, date, now) {
        Ok(recommendation) => recommendation,
        Err(err) => return error_response(&err, now),
    };
    let advisor = guard.advisor();
    drop(guard);

    let request = AdvisoryRequest::new(service_id, &recommendation);
    let narration = narrate(advisor.as_deref(), &request);

    ok(RecommendationResponse {
        service_id,
        branch_id: query.branch_id.trim().to_string(),
        date: date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string()),
        recommended_slot: recommendation.recommended_slot,
        crowd_label: recommendation.crowd_label,
        average_load_percent: recommendation.average_load_percent,
        slots: recommendation.slots,
        narration,
    })
}

fn build_list_response(
    state: SharedState,
    query: ListQuery,
    now: OffsetDateTime,
) -> ApiResponse<AppointmentsResponse> {
    let category = match query
        .category
        .as_deref()
        .unwrap_or_default()
        .parse::<StatusCategory>()
    {
        Ok(category) => category,
        Err(message) => return bad_request(message, now),
    };

    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => return internal_error("state lock poisoned while listing appointments", now),
    };
    let appointments = guard
        .engine()
        .list_appointments(category)
        .into_iter()
        .cloned()
        .collect();
    drop(guard);

    ok(AppointmentsResponse { appointments })
}

fn build_booking_response(
    state: SharedState,
    body: BookingBody,
    now: OffsetDateTime,
) -> ApiResponse<Appointment> {
    let request = match booking_request(body) {
        Ok(request) => request,
        Err(err) => return error_response(&err, now),
    };

    let mut guard = match state.write() {
        Ok(guard) => guard,
        Err(_) => return internal_error("state lock poisoned while booking", now),
    };
    let result = guard.engine_mut().book_slot(request, now);
    if result.is_ok() {
        guard.publish_appointments();
    }
    drop(guard);

    match result {
        Ok(appointment) => ApiResponse::Success {
            status: StatusCode::CREATED,
            body: appointment,
        },
        Err(err) => error_response(&err, now),
    }
}

fn booking_request(body: BookingBody) -> Result<BookingRequest, AppError> {
    Ok(BookingRequest {
        service_id: body.service_id.parse()?,
        branch_id: body.branch_id,
        visit_date: parse_visit_date(&body.visit_date)?,
        time_slot: TimeSlot::parse(&body.time_slot)?,
        user_name: body.user_name,
    })
}

fn build_wait_response(
    state: SharedState,
    id: &str,
    now: OffsetDateTime,
) -> ApiResponse<WaitResponse> {
    let mut guard = match state.write() {
        Ok(guard) => guard,
        Err(_) => return internal_error("state lock poisoned while estimating wait", now),
    };
    let before = guard.engine().appointments().to_vec();
    let result = guard.engine_mut().wait_estimate(id, now);
    if guard.engine().appointments() != before.as_slice() {
        guard.publish_appointments();
    }
    drop(guard);

    match result {
        Ok(estimate) => ok(WaitResponse {
            appointment_id: id.trim().to_string(),
            estimate_minutes: estimate.estimate_minutes,
            confidence: estimate.confidence,
            ahead_count: estimate.ahead_count,
            crowd_label: estimate.crowd_label,
        }),
        Err(err) => error_response(&err, now),
    }
}

fn build_arrival_response(
    state: SharedState,
    id: &str,
    now: OffsetDateTime,
) -> ApiResponse<Appointment> {
    mutate(state, now, "marking arrival", |state| {
        state.engine_mut().mark_arrival(id, now)
    })
}

fn build_cancel_response(
    state: SharedState,
    id: &str,
    now: OffsetDateTime,
) -> ApiResponse<Appointment> {
    mutate(state, now, "cancelling", |state| state.engine_mut().cancel(id, now))
}

fn build_reschedule_response(
    state: SharedState,
    id: &str,
    now: OffsetDateTime,
) -> ApiResponse<BookingContext> {
    mutate(state, now, "rescheduling", |state| {
        state.engine_mut().request_reschedule(id, now)
    })
}

// Runs an appointment action under the write lock and publishes on every
// outcome, since settling may have moved the appointment even when the action
// itself is rejected.
fn mutate<T, F>(state: SharedState, now: OffsetDateTime, what: &str, action: F) -> ApiResponse<T>
where
    F: FnOnce(&mut AppState) -> Result<T, AppError>,
{
    let mut guard = match state.write() {
        Ok(guard) => guard,
        Err(_) => return internal_error(&format!("state lock poisoned while {what}"), now),
    };
    let result = action(&mut *guard);
    guard.publish_appointments();
    drop(guard);

    match result {
        Ok(body) => ok(body),
        Err(err) => error_response(&err, now),
    }
}

fn error_response<T>(err: &AppError, now: OffsetDateTime) -> ApiResponse<T> {
    let (status, error_code) = match err {
        err if err.is_not_found() => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
        AppError::InvalidDate(_) => (StatusCode::BAD_REQUEST, ErrorCode::InvalidRequest),
        AppError::SlotUnavailable { .. } => (StatusCode::CONFLICT, ErrorCode::SlotUnavailable),
        AppError::TransitionRejected { .. } => {
            (StatusCode::CONFLICT, ErrorCode::TransitionRejected)
        }
        AppError::AppointmentFinalized(_) => {
            (StatusCode::CONFLICT, ErrorCode::AppointmentFinalized)
        }
        _ => return internal_error(&err.to_string(), now),
    };
    warn!(error = %err, "Request rejected");

    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Error {
            status,
            body: ErrorResponse {
                error_code,
                error_message: err.to_string(),
                timestamp,
            },
        },
        Err(_) => internal_error("timestamp formatting failure", now),
    }
}

fn bad_request<T>(message: String, now: OffsetDateTime) -> ApiResponse<T> {
    match format_timestamp(now) {
        Ok(timestamp) => ApiResponse::Error {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error_code: ErrorCode::InvalidRequest,
                error_message: message,
                timestamp,
            },
        },
        Err(_) => internal_error("timestamp formatting failure", now),
    }
}

fn internal_error<T>(message: &str, now: OffsetDateTime) -> ApiResponse<T> {
    error!(message = message, "Internal error while handling request");
    let formatted = format_timestamp(now).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        "1970-01-01T00:00:00Z".to_string()
    });
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error_code: ErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: formatted,
        },
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, time::error::Format> {
    timestamp.format(&Rfc3339)
}
