// libs/staff-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    middleware,
    routing::{delete, get, patch, post, put},
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{StaffAdministration, StaffDirectory, StaffMatcher, SupabaseStaffDirectory};

pub struct StaffState {
    pub config: Arc<AppConfig>,
    pub matcher: StaffMatcher,
    pub admin: Arc<dyn StaffAdministration>,
}

impl StaffState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let directory = Arc::new(SupabaseStaffDirectory::new(&config));
        Self::with_directory(config, directory)
    }

    pub fn with_directory<D>(config: Arc<AppConfig>, directory: Arc<D>) -> Self
    where
        D: StaffDirectory + StaffAdministration + 'static,
    {
        Self {
            config,
            matcher: StaffMatcher::new(directory.clone()),
            admin: directory,
        }
    }

    pub fn directory(&self) -> &Arc<dyn StaffDirectory> {
        self.matcher.directory()
    }
}

/// Provider lookups are public: the booking flow shows providers before
/// sign-in. Roster maintenance under `/admin` needs a bearer token.
pub fn staff_routes(state: Arc<StaffState>) -> Router {
    let admin = Router::new()
        .route("/", post(handlers::create_staff))
        .route("/{staff_id}", patch(handlers::update_staff))
        .route("/{staff_id}/services", post(handlers::assign_service))
        .route("/{staff_id}/services/{service_id}", delete(handlers::remove_service))
        .route("/{staff_id}/availability", put(handlers::set_availability))
        .route("/{staff_id}/time-off", post(handlers::request_time_off))
        .route("/{staff_id}/schedule", get(handlers::staff_schedule))
        .route("/time-off/{time_off_id}/approve", post(handlers::approve_time_off))
        .route("/gender-policies/{service_id}", put(handlers::upsert_gender_policy))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .route("/", get(handlers::list_staff))
        .route("/available", get(handlers::find_available_staff))
        .route("/gender-policies", get(handlers::list_gender_policies))
        .route("/{staff_id}", get(handlers::get_staff))
        .nest("/admin", admin)
        .with_state(state)
}
