// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use scheduling_cell::services::ServiceCatalog;
use shared_models::error::AppError;
use shared_models::time_format::hhmm;
use staff_cell::models::PatientGenderPreference;

// ==============================================================================
// APPOINTMENT
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

impl AppointmentStatus {
    /// Pending and confirmed bookings hold a provider's time.
    pub fn holds_slot(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: String,
    pub service_type: String,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub appointment_time: NaiveTime,
    pub datetime: NaiveDateTime,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub message: Option<String>,
    pub status: AppointmentStatus,
    pub confirmation_code: String,
    pub assigned_staff_id: Option<Uuid>,
    pub staff_gender_preference: Option<PatientGenderPreference>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

/// Combined local date and time stored alongside the separate columns.
pub fn appointment_datetime(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    date.and_time(time)
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub service_type: String,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub appointment_time: NaiveTime,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub assigned_staff_id: Option<Uuid>,
    #[serde(default)]
    pub staff_gender_preference: Option<PatientGenderPreference>,
}

impl CreateAppointmentRequest {
    pub fn validate(&self, catalog: &ServiceCatalog) -> Result<(), AppError> {
        let required = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("service_type", &self.service_type),
        ];

        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AppError::ValidationError(format!("{} is required", field)));
        }

        if catalog.lookup(&self.service_type).is_none() {
            return Err(AppError::ValidationError(format!("Unknown service: {}", self.service_type)));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub appointment_time: NaiveTime,
}

/// Patient-editable fields. Absent fields are left as they are; dates move
/// through reschedule and cancellation through cancel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub assigned_staff_id: Option<Uuid>,
    #[serde(default)]
    pub staff_gender_preference: Option<PatientGenderPreference>,
}

impl UpdateAppointmentRequest {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.message.is_none()
            && self.status.is_none()
            && self.assigned_staff_id.is_none()
            && self.staff_gender_preference.is_none()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.is_empty() {
            return Err(AppError::ValidationError("Nothing to update".to_string()));
        }

        let contact = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
        ];
        if let Some((field, _)) = contact
            .iter()
            .find(|(_, value)| value.as_deref().is_some_and(|v| v.trim().is_empty()))
        {
            return Err(AppError::ValidationError(format!("{} cannot be blank", field)));
        }

        if self.status == Some(AppointmentStatus::Cancelled) {
            return Err(AppError::ValidationError("Use cancel to cancel an appointment".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CancellationResult {
    pub appointment: Appointment,
    /// The appointment was already cancelled; nothing was written.
    pub already_cancelled: bool,
}

/// Partial update sent to the store; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AppointmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none", with = "hhmm::option")]
    pub appointment_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_staff_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_gender_preference: Option<PatientGenderPreference>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentUpdate {
    /// Trimmed copy of a patient's edit, stamped with `now`.
    pub fn from_request(request: UpdateAppointmentRequest, now: DateTime<Utc>) -> Self {
        let trimmed = |value: Option<String>| value.map(|v| v.trim().to_string());
        Self {
            status: request.status,
            first_name: trimmed(request.first_name),
            last_name: trimmed(request.last_name),
            email: trimmed(request.email),
            phone: trimmed(request.phone),
            message: request.message,
            assigned_staff_id: request.assigned_staff_id,
            staff_gender_preference: request.staff_gender_preference,
            updated_at: now,
            ..Default::default()
        }
    }

    pub fn apply_to(&self, appointment: &mut Appointment) {
        if let Some(status) = self.status {
            appointment.status = status;
        }
        if let Some(date) = self.appointment_date {
            appointment.appointment_date = date;
        }
        if let Some(time) = self.appointment_time {
            appointment.appointment_time = time;
        }
        if let Some(datetime) = self.datetime {
            appointment.datetime = datetime;
        }
        if let Some(cancelled_at) = self.cancelled_at {
            appointment.cancelled_at = Some(cancelled_at);
        }
        if let Some(reason) = &self.cancellation_reason {
            appointment.cancellation_reason = Some(reason.clone());
        }
        if let Some(first_name) = &self.first_name {
            appointment.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            appointment.last_name = last_name.clone();
        }
        if let Some(email) = &self.email {
            appointment.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            appointment.phone = phone.clone();
        }
        if let Some(message) = &self.message {
            appointment.message = Some(message.clone());
        }
        if let Some(staff_id) = self.assigned_staff_id {
            appointment.assigned_staff_id = Some(staff_id);
        }
        if let Some(preference) = self.staff_gender_preference {
            appointment.staff_gender_preference = Some(preference);
        }
        appointment.updated_at = self.updated_at;
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Confirmation code already in use")]
    DuplicateConfirmationCode,

    #[error("Appointment not found")]
    NotFound,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateConfirmationCode => {
                AppError::Conflict("Confirmation code already in use".to_string())
            }
            RepositoryError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            RepositoryError::Storage(msg) => AppError::Upstream(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            service_type: "IV Therapy".to_string(),
            appointment_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            appointment_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            first_name: "Ana".to_string(),
            last_name: "Lopez".to_string(),
            email: "ana@example.com".to_string(),
            phone: "555-0100".to_string(),
            message: None,
            assigned_staff_id: None,
            staff_gender_preference: None,
        }
    }

    #[test]
    fn test_validate_accepts_complete_request() {
        assert!(request().validate(&ServiceCatalog::new()).is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let blank_phone = CreateAppointmentRequest { phone: "   ".to_string(), ..request() };
        let err = blank_phone.validate(&ServiceCatalog::new()).unwrap_err();

        assert_eq!(err, AppError::ValidationError("phone is required".to_string()));
    }

    #[test]
    fn test_validate_rejects_unknown_service() {
        let unknown = CreateAppointmentRequest { service_type: "Botox".to_string(), ..request() };
        assert!(unknown.validate(&ServiceCatalog::new()).is_err());
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = AppointmentUpdate {
            appointment_time: Some(NaiveTime::from_hms_opt(14, 30, 0).unwrap()),
            updated_at: "2024-06-01T12:00:00Z".parse().unwrap(),
            ..Default::default()
        };

        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["appointment_time"], "14:30");
        assert!(value.get("status").is_none());
        assert!(value.get("cancelled_at").is_none());
    }

    #[test]
    fn test_status_round_trips_as_snake_case() {
        assert_eq!(serde_json::to_value(AppointmentStatus::Cancelled).unwrap(), "cancelled");
        assert!(AppointmentStatus::Pending.holds_slot());
        assert!(!AppointmentStatus::Completed.holds_slot());
    }
}
