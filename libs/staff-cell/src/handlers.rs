// libs/staff-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use shared_database::supabase::SupabaseError;
use shared_models::auth::{IdentityProvider, RequestIdentity};
use shared_models::error::AppError;
use shared_models::time_format::parse_slot_time;

use crate::models::{
    validate_availability, AvailabilityWindow, GenderPreferencePolicy, NewStaffMember, PatientGenderPreference,
    ServiceAssignment, StaffMatch, StaffMember, StaffMemberUpdate, StaffSchedule, StaffServiceLink, TimeOff,
    TimeOffRequest,
};
use crate::router::StaffState;

#[derive(Debug, Deserialize)]
pub struct AvailableStaffQuery {
    pub service: String,
    pub date: NaiveDate,
    pub time: String,
    pub gender_preference: Option<PatientGenderPreference>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

fn directory_error(e: anyhow::Error) -> AppError {
    if let Some(app_error) = e.downcast_ref::<AppError>() {
        return app_error.clone();
    }

    error!("Staff directory error: {}", e);
    match e.downcast_ref::<SupabaseError>() {
        Some(SupabaseError::Conflict(_)) => AppError::Conflict("Conflicts with an existing staff record".to_string()),
        Some(SupabaseError::Auth(_)) => AppError::AuthRequired("Not allowed to change staff records".to_string()),
        _ => AppError::Upstream("Failed to load staff".to_string()),
    }
}

fn invalid(message: String) -> AppError {
    AppError::ValidationError(message)
}

pub async fn list_staff(
    State(state): State<Arc<StaffState>>,
) -> Result<Json<Value>, AppError> {
    let staff = state.directory().all_active_staff().await.map_err(directory_error)?;

    Ok(Json(json!({
        "staff": staff,
        "total": staff.len()
    })))
}

pub async fn get_staff(
    State(state): State<Arc<StaffState>>,
    Path(staff_id): Path<Uuid>,
) -> Result<Json<StaffMember>, AppError> {
    let member = state.directory().staff_by_id(staff_id).await
        .map_err(directory_error)?
        .ok_or_else(|| AppError::NotFound(format!("Staff member {} not found", staff_id)))?;

    Ok(Json(member))
}

#[axum::debug_handler]
pub async fn find_available_staff(
    State(state): State<Arc<StaffState>>,
    Query(query): Query<AvailableStaffQuery>,
) -> Result<Json<StaffMatch>, AppError> {
    let time = parse_slot_time(&query.time)
        .ok_or_else(|| AppError::ValidationError(format!("Invalid time: {}", query.time)))?;

    let result = state.matcher
        .find_available_staff(&query.service, query.date, time, query.gender_preference)
        .await?;

    Ok(Json(result))
}

pub async fn list_gender_policies(
    State(state): State<Arc<StaffState>>,
) -> Result<Json<Value>, AppError> {
    let policies = state.directory().service_gender_policies().await.map_err(directory_error)?;

    Ok(Json(json!({
        "policies": policies
    })))
}

// ==============================================================================
// ADMINISTRATION
// ==============================================================================

pub async fn create_staff(
    State(state): State<Arc<StaffState>>,
    Extension(identity): Extension<RequestIdentity>,
    Json(member): Json<NewStaffMember>,
) -> Result<(StatusCode, Json<StaffMember>), AppError> {
    member.validate().map_err(invalid)?;

    let created = state.admin
        .create_staff(member, identity.access_token().as_deref())
        .await
        .map_err(directory_error)?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_staff(
    State(state): State<Arc<StaffState>>,
    Path(staff_id): Path<Uuid>,
    Extension(identity): Extension<RequestIdentity>,
    Json(update): Json<StaffMemberUpdate>,
) -> Result<Json<StaffMember>, AppError> {
    update.validate().map_err(invalid)?;

    let member = state.admin
        .update_staff(staff_id, &update, identity.access_token().as_deref())
        .await
        .map_err(directory_error)?
        .ok_or_else(|| AppError::NotFound(format!("Staff member {} not found", staff_id)))?;

    Ok(Json(member))
}

pub async fn assign_service(
    State(state): State<Arc<StaffState>>,
    Path(staff_id): Path<Uuid>,
    Extension(identity): Extension<RequestIdentity>,
    Json(assignment): Json<ServiceAssignment>,
) -> Result<(StatusCode, Json<StaffServiceLink>), AppError> {
    assignment.validate().map_err(invalid)?;

    let link = state.admin
        .assign_service(staff_id, &assignment, identity.access_token().as_deref())
        .await
        .map_err(directory_error)?;

    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn remove_service(
    State(state): State<Arc<StaffState>>,
    Path((staff_id, service_id)): Path<(Uuid, Uuid)>,
    Extension(identity): Extension<RequestIdentity>,
) -> Result<StatusCode, AppError> {
    let removed = state.admin
        .remove_service(staff_id, service_id, identity.access_token().as_deref())
        .await
        .map_err(directory_error)?;

    if !removed {
        return Err(AppError::NotFound(format!(
            "Staff member {} is not assigned to service {}", staff_id, service_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_availability(
    State(state): State<Arc<StaffState>>,
    Path(staff_id): Path<Uuid>,
    Extension(identity): Extension<RequestIdentity>,
    Json(windows): Json<Vec<AvailabilityWindow>>,
) -> Result<Json<Value>, AppError> {
    validate_availability(&windows).map_err(invalid)?;

    let availability = state.admin
        .set_availability(staff_id, &windows, identity.access_token().as_deref())
        .await
        .map_err(directory_error)?;

    Ok(Json(json!({
        "staff_id": staff_id,
        "availability": availability
    })))
}

pub async fn request_time_off(
    State(state): State<Arc<StaffState>>,
    Path(staff_id): Path<Uuid>,
    Extension(identity): Extension<RequestIdentity>,
    Json(request): Json<TimeOffRequest>,
) -> Result<(StatusCode, Json<TimeOff>), AppError> {
    request.validate().map_err(invalid)?;

    let time_off = state.admin
        .request_time_off(staff_id, request, identity.access_token().as_deref())
        .await
        .map_err(directory_error)?;

    Ok((StatusCode::CREATED, Json(time_off)))
}

pub async fn approve_time_off(
    State(state): State<Arc<StaffState>>,
    Path(time_off_id): Path<Uuid>,
    Extension(identity): Extension<RequestIdentity>,
) -> Result<Json<TimeOff>, AppError> {
    let approver = identity
        .current_user_id()
        .ok_or_else(|| AppError::AuthRequired("Sign in to approve time off".to_string()))?;

    let approved = state.admin
        .approve_time_off(time_off_id, &approver, identity.access_token().as_deref())
        .await
        .map_err(directory_error)?
        .ok_or_else(|| AppError::NotFound(format!("Time off request {} not found", time_off_id)))?;

    info!("Time off {} approved by {}", time_off_id, approver);
    Ok(Json(approved))
}

pub async fn staff_schedule(
    State(state): State<Arc<StaffState>>,
    Path(staff_id): Path<Uuid>,
    Extension(identity): Extension<RequestIdentity>,
    Query(range): Query<ScheduleQuery>,
) -> Result<Json<StaffSchedule>, AppError> {
    if range.end < range.start {
        return Err(AppError::ValidationError("end is before start".to_string()));
    }

    let schedule = state.admin
        .staff_schedule(staff_id, range.start, range.end, identity.access_token().as_deref())
        .await
        .map_err(directory_error)?;

    Ok(Json(schedule))
}

pub async fn upsert_gender_policy(
    State(state): State<Arc<StaffState>>,
    Path(service_id): Path<Uuid>,
    Extension(identity): Extension<RequestIdentity>,
    Json(policy): Json<GenderPreferencePolicy>,
) -> Result<Json<GenderPreferencePolicy>, AppError> {
    let stored = state.admin
        .upsert_gender_policy(service_id, &policy, identity.access_token().as_deref())
        .await
        .map_err(directory_error)?;

    Ok(Json(stored))
}
