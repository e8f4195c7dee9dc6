// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use shared_config::AppConfig;

use crate::handlers;
use crate::services::{AvailabilityGateway, BookingCalendar, ServiceCatalog, SlotProvider};

pub struct SchedulingState {
    pub catalog: ServiceCatalog,
    pub calendar: BookingCalendar,
    pub slots: Arc<dyn SlotProvider>,
}

impl SchedulingState {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_provider(config, Arc::new(AvailabilityGateway::new(config)))
    }

    pub fn with_provider(config: &AppConfig, slots: Arc<dyn SlotProvider>) -> Self {
        Self {
            catalog: ServiceCatalog::new(),
            calendar: BookingCalendar::new(config.booking_horizon_months),
            slots,
        }
    }
}

/// Public catalogue and calendar lookups; none of these need a signed-in user.
pub fn scheduling_routes(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/services", get(handlers::list_services))
        .route("/availability", get(handlers::get_availability))
        .route("/calendar/{year}/{month}", get(handlers::get_month))
        .with_state(state)
}
