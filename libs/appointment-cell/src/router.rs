// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, patch},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::AppointmentStore;

pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub store: Arc<AppointmentStore>,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let store = Arc::new(AppointmentStore::from_config(&config));
        Self { config, store }
    }

    pub fn with_store(config: Arc<AppConfig>, store: Arc<AppointmentStore>) -> Self {
        Self { config, store }
    }
}

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    // All appointment operations require authentication
    Router::new()
        .route("/", post(handlers::create_appointment).get(handlers::list_appointments))
        .route("/upcoming/count", get(handlers::upcoming_confirmed_count))
        .route("/{appointment_id}", get(handlers::get_appointment).patch(handlers::update_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
