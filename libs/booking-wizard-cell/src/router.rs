// libs/booking-wizard-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::identity_middleware;

use crate::handlers;
use crate::services::{BookingSessions, WizardServices};

pub struct BookingState {
    pub config: Arc<AppConfig>,
    pub sessions: BookingSessions,
}

impl BookingState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let services = WizardServices::from_config(&config);
        Self::with_services(config, services)
    }

    pub fn with_services(config: Arc<AppConfig>, services: WizardServices) -> Self {
        Self {
            sessions: BookingSessions::new(config.clone(), services),
            config,
        }
    }
}

/// Booking wizard sessions. Steps 1-4 work anonymously; only submit and
/// resume look at the caller's identity.
pub fn booking_routes(state: Arc<BookingState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_session))
        .route("/{session_id}", get(handlers::get_session).delete(handlers::close_session))
        .route("/{session_id}/info", put(handlers::update_info))
        .route("/{session_id}/advance", post(handlers::advance))
        .route("/{session_id}/back", post(handlers::go_back))
        .route("/{session_id}/date", post(handlers::select_date))
        .route("/{session_id}/slot", post(handlers::select_slot))
        .route("/{session_id}/preference", post(handlers::choose_gender_preference))
        .route("/{session_id}/staff", post(handlers::select_staff))
        .route("/{session_id}/submit", post(handlers::submit))
        .route("/{session_id}/resume", post(handlers::resume))
        .route("/{session_id}/reset", post(handlers::start_over))
        .layer(middleware::from_fn_with_state(state.config.clone(), identity_middleware))
        .with_state(state)
}
