// libs/appointment-cell/src/services/store.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use scheduling_cell::services::ServiceCatalog;
use shared_config::AppConfig;
use shared_models::auth::IdentityProvider;
use shared_models::error::AppError;

use crate::models::{
    appointment_datetime, Appointment, AppointmentStatus, AppointmentUpdate, CancellationResult,
    CreateAppointmentRequest, RepositoryError, UpdateAppointmentRequest,
};
use crate::services::code::ConfirmationCodeGenerator;
use crate::services::repository::AppointmentRepository;
use crate::services::supabase::SupabaseAppointmentRepository;

pub const MAX_CODE_ATTEMPTS: usize = 5;

pub struct AppointmentStore {
    repository: Arc<dyn AppointmentRepository>,
    codes: ConfirmationCodeGenerator,
    catalog: ServiceCatalog,
}

fn require_user(identity: &dyn IdentityProvider) -> Result<String, AppError> {
    identity
        .current_user_id()
        .ok_or_else(|| AppError::AuthRequired("Sign in to book an appointment".to_string()))
}

impl AppointmentStore {
    pub fn new(repository: Arc<dyn AppointmentRepository>, codes: ConfirmationCodeGenerator) -> Self {
        Self {
            repository,
            codes,
            catalog: ServiceCatalog::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(SupabaseAppointmentRepository::new(config)),
            ConfirmationCodeGenerator::new(config.confirmation_code_prefix.clone()),
        )
    }

    /// Persist a new pending appointment for the signed-in user.
    ///
    /// Nothing is written without an identity. A clashing confirmation code is
    /// regenerated up to [`MAX_CODE_ATTEMPTS`] times.
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        identity: &dyn IdentityProvider,
    ) -> Result<Appointment, AppError> {
        let user_id = require_user(identity)?;
        request.validate(&self.catalog)?;

        let token = identity.access_token();
        let now = Utc::now();
        let mut appointment = Appointment {
            id: Uuid::new_v4(),
            user_id,
            service_type: request.service_type.trim().to_string(),
            appointment_date: request.appointment_date,
            appointment_time: request.appointment_time,
            datetime: appointment_datetime(request.appointment_date, request.appointment_time),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email.trim().to_string(),
            phone: request.phone.trim().to_string(),
            message: request.message.filter(|m| !m.trim().is_empty()),
            status: AppointmentStatus::Pending,
            confirmation_code: String::new(),
            assigned_staff_id: request.assigned_staff_id,
            staff_gender_preference: request.staff_gender_preference,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
            cancellation_reason: None,
        };

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            appointment.confirmation_code = self.codes.generate();

            match self.repository.insert(&appointment, token.as_deref()).await {
                Ok(created) => {
                    info!("Created appointment {} ({}) for {} on {} at {}",
                          created.id, created.confirmation_code, created.service_type,
                          created.appointment_date, created.appointment_time);
                    return Ok(created);
                }
                Err(RepositoryError::DuplicateConfirmationCode) => {
                    warn!("Confirmation code {} already taken (attempt {}/{})",
                          appointment.confirmation_code, attempt, MAX_CODE_ATTEMPTS);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Conflict("Could not allocate a confirmation code".to_string()))
    }

    /// Fetch an appointment owned by the signed-in user. Other users'
    /// appointments read as not found.
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        identity: &dyn IdentityProvider,
    ) -> Result<Appointment, AppError> {
        let user_id = require_user(identity)?;
        debug!("Fetching appointment {}", appointment_id);

        self.repository
            .get(appointment_id, identity.access_token().as_deref())
            .await?
            .filter(|appointment| appointment.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        reason: Option<String>,
        identity: &dyn IdentityProvider,
    ) -> Result<CancellationResult, AppError> {
        let appointment = self.get_appointment(appointment_id, identity).await?;

        match appointment.status {
            AppointmentStatus::Cancelled => {
                debug!("Appointment {} already cancelled", appointment_id);
                return Ok(CancellationResult { appointment, already_cancelled: true });
            }
            AppointmentStatus::Completed => {
                return Err(AppError::Conflict("Completed appointments cannot be cancelled".to_string()));
            }
            AppointmentStatus::Pending | AppointmentStatus::Confirmed => {}
        }

        let now = Utc::now();
        let update = AppointmentUpdate {
            status: Some(AppointmentStatus::Cancelled),
            cancelled_at: Some(now),
            cancellation_reason: reason.filter(|r| !r.trim().is_empty()),
            updated_at: now,
            ..Default::default()
        };

        let cancelled = self.repository
            .update(appointment_id, &update, identity.access_token().as_deref())
            .await?;

        info!("Appointment {} cancelled", appointment_id);
        Ok(CancellationResult { appointment: cancelled, already_cancelled: false })
    }

    /// Move an appointment to a new date and time. Status and provider stay as they were.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        new_date: NaiveDate,
        new_time: NaiveTime,
        identity: &dyn IdentityProvider,
    ) -> Result<Appointment, AppError> {
        let appointment = self.get_appointment(appointment_id, identity).await?;

        if appointment.status == AppointmentStatus::Cancelled {
            return Err(AppError::Conflict("Cancelled appointments cannot be rescheduled".to_string()));
        }

        let update = AppointmentUpdate {
            appointment_date: Some(new_date),
            appointment_time: Some(new_time),
            datetime: Some(appointment_datetime(new_date, new_time)),
            updated_at: Utc::now(),
            ..Default::default()
        };

        let rescheduled = self.repository
            .update(appointment_id, &update, identity.access_token().as_deref())
            .await?;

        info!("Appointment {} rescheduled to {} at {}", appointment_id, new_date, new_time);
        Ok(rescheduled)
    }

    /// Apply a partial edit to an appointment the user owns. `updated_at` is
    /// always refreshed. Cancelled and completed appointments are read-only.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        identity: &dyn IdentityProvider,
    ) -> Result<Appointment, AppError> {
        request.validate()?;
        let appointment = self.get_appointment(appointment_id, identity).await?;

        if matches!(appointment.status, AppointmentStatus::Cancelled | AppointmentStatus::Completed) {
            return Err(AppError::Conflict(format!(
                "{} appointments cannot be changed", appointment.status
            )));
        }

        let update = AppointmentUpdate::from_request(request, Utc::now());
        let updated = self.repository
            .update(appointment_id, &update, identity.access_token().as_deref())
            .await?;

        info!("Appointment {} updated", appointment_id);
        Ok(updated)
    }

    pub async fn list_for_user(
        &self,
        identity: &dyn IdentityProvider,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppError> {
        let user_id = require_user(identity)?;

        let mut appointments = self.repository
            .list_for_user(&user_id, status, identity.access_token().as_deref())
            .await?;
        appointments.sort_by_key(|a| a.datetime);

        debug!("Listed {} appointments for {}", appointments.len(), user_id);
        Ok(appointments)
    }

    /// Confirmed appointments at or after `now`.
    pub async fn upcoming_confirmed_count(
        &self,
        identity: &dyn IdentityProvider,
        now: NaiveDateTime,
    ) -> Result<usize, AppError> {
        let confirmed = self.list_for_user(identity, Some(AppointmentStatus::Confirmed)).await?;
        Ok(confirmed.iter().filter(|a| a.datetime >= now).count())
    }
}
