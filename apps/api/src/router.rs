use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::{appointment_routes, AppointmentState};
use booking_wizard_cell::router::{booking_routes, BookingState};
use scheduling_cell::router::{scheduling_routes, SchedulingState};
use shared_config::AppConfig;
use staff_cell::router::{staff_routes, StaffState};

pub fn create_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "SoCal Wellness booking API is running!" }))
        .merge(scheduling_routes(Arc::new(SchedulingState::new(&config))))
        .nest("/staff", staff_routes(Arc::new(StaffState::new(config.clone()))))
        .nest("/appointments", appointment_routes(Arc::new(AppointmentState::new(config.clone()))))
        .nest("/bookings", booking_routes(Arc::new(BookingState::new(config))))
}
