// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use scheduling_cell::services::clinic_now;
use shared_models::auth::{RequestIdentity, User};
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentStatus, CancelAppointmentRequest, CreateAppointmentRequest,
    RescheduleAppointmentRequest, UpdateAppointmentRequest,
};
use crate::router::AppointmentState;

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
}

fn identity(user: User, auth: &Authorization<Bearer>) -> RequestIdentity {
    RequestIdentity::authenticated(user, auth.token())
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = state.store
        .create_appointment(request, &identity(user, &auth))
        .await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn list_appointments(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.store
        .list_for_user(&identity(user, &auth), query.status)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state.store
        .get_appointment(appointment_id, &identity(user, &auth))
        .await?;

    Ok(Json(appointment))
}

pub async fn update_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state.store
        .update_appointment(appointment_id, request, &identity(user, &auth))
        .await?;

    Ok(Json(appointment))
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let result = state.store
        .cancel_appointment(appointment_id, request.reason, &identity(user, &auth))
        .await?;

    let message = if result.already_cancelled {
        "Appointment was already cancelled"
    } else {
        "Appointment cancelled successfully"
    };

    Ok(Json(json!({
        "success": true,
        "already_cancelled": result.already_cancelled,
        "appointment": result.appointment,
        "message": message
    })))
}

pub async fn reschedule_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state.store
        .reschedule_appointment(
            appointment_id,
            request.appointment_date,
            request.appointment_time,
            &identity(user, &auth),
        )
        .await?;

    Ok(Json(appointment))
}

pub async fn upcoming_confirmed_count(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let count = state.store
        .upcoming_confirmed_count(&identity(user, &auth), clinic_now())
        .await?;

    Ok(Json(json!({ "count": count })))
}
