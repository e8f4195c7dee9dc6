// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use shared_models::error::AppError;

use crate::models::{MonthGrid, SlotLookup};
use crate::router::SchedulingState;
use crate::services::clinic_today;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub service: String,
}

pub async fn list_services(
    State(state): State<Arc<SchedulingState>>,
) -> Json<Value> {
    Json(json!({
        "services": state.catalog.all()
    }))
}

/// Calendar rules are checked here, before the scheduler is asked anything.
#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<SchedulingState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<SlotLookup>, AppError> {
    let service = state.catalog.lookup(&query.service)
        .ok_or_else(|| AppError::NotFound(format!("Unknown service: {}", query.service)))?;

    state.calendar.check_date(query.date, clinic_today())
        .map_err(|rejection| AppError::ValidationError(rejection.to_string()))?;

    debug!("Availability lookup for {} on {}", service.name, query.date);
    let lookup = state.slots.list_available_slots(query.date, service.name).await;

    Ok(Json(lookup))
}

pub async fn get_month(
    State(state): State<Arc<SchedulingState>>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<MonthGrid>, AppError> {
    let grid = state.calendar.month_grid(year, month, clinic_today())?;
    Ok(Json(grid))
}
