// libs/booking-wizard-cell/src/models.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::models::{Appointment, CreateAppointmentRequest};
use scheduling_cell::models::SlotLookup;
use shared_models::error::AppError;
use shared_models::time_format::hhmm;
use staff_cell::models::{PatientGenderPreference, StaffMatch};

// ==============================================================================
// STEPS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Info,
    DateTime,
    Provider,
    Review,
    Submitted,
}

impl WizardStep {
    /// 1-based position shown to the patient; `Submitted` has none.
    pub fn number(&self) -> Option<u8> {
        match self {
            WizardStep::Info => Some(1),
            WizardStep::DateTime => Some(2),
            WizardStep::Provider => Some(3),
            WizardStep::Review => Some(4),
            WizardStep::Submitted => None,
        }
    }
}

/// Progress inside the provider step.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPhase {
    #[default]
    AwaitingPreference,
    PreferenceCollected,
    StaffQueried,
    StaffChosen,
}

// ==============================================================================
// DRAFT
// ==============================================================================

/// Everything collected so far. Lives only inside one wizard until submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub service_name: String,
    pub message: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(default, with = "hhmm::option")]
    pub time: Option<NaiveTime>,
    pub datetime: Option<NaiveDateTime>,
    pub selected_staff_id: Option<Uuid>,
    pub staff_gender_preference: Option<PatientGenderPreference>,
}

impl BookingDraft {
    /// First step-1 field that is blank after trimming.
    pub fn missing_info_field(&self) -> Option<&'static str> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("service_name", &self.service_name),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }

    pub fn clear_schedule(&mut self) {
        self.date = None;
        self.clear_time();
    }

    pub fn clear_time(&mut self) {
        self.time = None;
        self.datetime = None;
        self.clear_provider();
    }

    pub fn clear_provider(&mut self) {
        self.selected_staff_id = None;
        self.staff_gender_preference = None;
    }

    pub fn to_request(&self) -> Result<CreateAppointmentRequest, AppError> {
        if let Some(field) = self.missing_info_field() {
            return Err(AppError::ValidationError(format!("{} is required", field)));
        }

        let (Some(date), Some(time)) = (self.date, self.time) else {
            return Err(AppError::ValidationError("Choose a date and time".to_string()));
        };

        Ok(CreateAppointmentRequest {
            service_type: self.service_name.trim().to_string(),
            appointment_date: date,
            appointment_time: time,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            message: self.message.clone(),
            assigned_staff_id: self.selected_staff_id,
            staff_gender_preference: self.staff_gender_preference,
        })
    }
}

/// Step-1 form contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub service_name: String,
    #[serde(default)]
    pub message: Option<String>,
}

// ==============================================================================
// QUERY TICKETS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Slots,
    Staff,
}

/// A slot lookup in flight, with the inputs it was issued for.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotQueryTicket {
    pub sequence: u64,
    pub date: NaiveDate,
    pub service_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaffQueryTicket {
    pub sequence: u64,
    pub service_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub preference: Option<PatientGenderPreference>,
}

// ==============================================================================
// SUBMISSION
// ==============================================================================

/// A submission parked until the patient signs in. Redeemable once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingSubmission {
    pub token: Uuid,
}

impl PendingSubmission {
    pub fn new() -> Self {
        Self { token: Uuid::new_v4() }
    }
}

impl Default for PendingSubmission {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum SubmissionStart {
    /// Identity present; send this request to the store.
    Ready(CreateAppointmentRequest),
    /// No identity; the draft now carries this token.
    AwaitingAuth(PendingSubmission),
}

// ==============================================================================
// VIEW
// ==============================================================================

/// Serializable snapshot of a wizard for the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub session_id: Uuid,
    pub step: WizardStep,
    pub step_number: Option<u8>,
    pub provider_phase: ProviderPhase,
    pub draft: BookingDraft,
    pub slots: Option<SlotLookup>,
    pub staff: Option<StaffMatch>,
    pub submitting: bool,
    pub pending_submission: Option<PendingSubmission>,
    pub error: Option<String>,
    pub appointment: Option<Appointment>,
}
