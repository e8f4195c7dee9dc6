// libs/booking-wizard-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use shared_models::auth::RequestIdentity;
use shared_models::error::AppError;
use shared_models::time_format::parse_slot_time;
use staff_cell::models::PatientGenderPreference;

use crate::models::{ContactInfo, WizardStep, WizardView};
use crate::router::BookingState;

#[derive(Debug, Deserialize)]
pub struct GoBackRequest {
    pub step: WizardStep,
}

#[derive(Debug, Deserialize)]
pub struct SelectDateRequest {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct SelectSlotRequest {
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct GenderPreferenceRequest {
    pub preference: PatientGenderPreference,
}

#[derive(Debug, Deserialize)]
pub struct SelectStaffRequest {
    #[serde(default)]
    pub staff_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub token: Uuid,
}

pub async fn create_session(
    State(state): State<Arc<BookingState>>,
) -> (StatusCode, Json<WizardView>) {
    (StatusCode::CREATED, Json(state.sessions.create().await))
}

pub async fn get_session(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<WizardView>, AppError> {
    Ok(Json(state.sessions.view(session_id).await?))
}

pub async fn close_session(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_info(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Json(info): Json<ContactInfo>,
) -> Result<Json<WizardView>, AppError> {
    Ok(Json(state.sessions.update_info(session_id, info).await?))
}

pub async fn advance(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<WizardView>, AppError> {
    Ok(Json(state.sessions.advance(session_id).await?))
}

pub async fn go_back(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<GoBackRequest>,
) -> Result<Json<WizardView>, AppError> {
    Ok(Json(state.sessions.go_back_to(session_id, request.step).await?))
}

#[axum::debug_handler]
pub async fn select_date(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SelectDateRequest>,
) -> Result<Json<WizardView>, AppError> {
    Ok(Json(state.sessions.select_date(session_id, request.date).await?))
}

pub async fn select_slot(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SelectSlotRequest>,
) -> Result<Json<WizardView>, AppError> {
    let time = parse_slot_time(&request.time)
        .ok_or_else(|| AppError::ValidationError(format!("Invalid time: {}", request.time)))?;

    Ok(Json(state.sessions.select_slot(session_id, time).await?))
}

pub async fn choose_gender_preference(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<GenderPreferenceRequest>,
) -> Result<Json<WizardView>, AppError> {
    Ok(Json(state.sessions.choose_gender_preference(session_id, request.preference).await?))
}

pub async fn select_staff(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SelectStaffRequest>,
) -> Result<Json<WizardView>, AppError> {
    Ok(Json(state.sessions.select_staff(session_id, request.staff_id).await?))
}

/// `201` with the confirmation once booked; `202` with a pending-submission
/// token when the caller has not signed in yet.
#[axum::debug_handler]
pub async fn submit(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Extension(identity): Extension<RequestIdentity>,
) -> Result<(StatusCode, Json<WizardView>), AppError> {
    let view = state.sessions.submit(session_id, &identity).await?;

    let status = if view.appointment.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(view)))
}

pub async fn resume(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Extension(identity): Extension<RequestIdentity>,
    Json(request): Json<ResumeRequest>,
) -> Result<(StatusCode, Json<WizardView>), AppError> {
    let view = state.sessions.resume(session_id, request.token, &identity).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn start_over(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<WizardView>, AppError> {
    Ok(Json(state.sessions.start_over(session_id).await?))
}
