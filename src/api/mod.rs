use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::{Arc, RwLock};

pub mod handlers;
pub mod responses;

pub fn router(state: Arc<RwLock<AppState>>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::get_health))
        .route("/api/services", get(handlers::get_services))
        .route("/api/recommendation", get(handlers::get_recommendation))
        .route(
            "/api/appointments",
            get(handlers::list_appointments).post(handlers::create_appointment),
        )
        .route("/api/appointments/{id}/wait", get(handlers::get_wait))
        .route("/api/appointments/{id}/arrival", post(handlers::post_arrival))
        .route("/api/appointments/{id}/cancel", post(handlers::post_cancel))
        .route(
            "/api/appointments/{id}/reschedule",
            post(handlers::post_reschedule),
        )
        .with_state(state)
}
