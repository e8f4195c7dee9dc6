// libs/appointment-cell/src/services/supabase.rs
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{Appointment, AppointmentStatus, AppointmentUpdate, RepositoryError};
use crate::services::repository::AppointmentRepository;

const CONFIRMATION_CODE_COLUMN: &str = "confirmation_code";

/// Appointments stored in the `appointments` table through PostgREST.
pub struct SupabaseAppointmentRepository {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

fn storage_error(context: &str, err: anyhow::Error) -> RepositoryError {
    error!("{}: {}", context, err);
    RepositoryError::Storage(context.to_string())
}

fn parse_first(rows: Vec<Value>) -> Result<Option<Appointment>, RepositoryError> {
    match rows.into_iter().next() {
        Some(row) => serde_json::from_value(row)
            .map(Some)
            .map_err(|e| RepositoryError::Storage(format!("Failed to parse appointment: {}", e))),
        None => Ok(None),
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn insert(&self, appointment: &Appointment, auth_token: Option<&str>)
                    -> Result<Appointment, RepositoryError> {
        debug!("Inserting appointment {} ({})", appointment.id, appointment.confirmation_code);

        let body = serde_json::to_value(appointment)
            .map_err(|e| RepositoryError::Storage(format!("Failed to encode appointment: {}", e)))?;

        let rows = self.supabase
            .request_returning(Method::POST, "/rest/v1/appointments", auth_token, body)
            .await
            .map_err(|e| {
                if SupabaseError::is_unique_violation(&e, CONFIRMATION_CODE_COLUMN) {
                    RepositoryError::DuplicateConfirmationCode
                } else {
                    storage_error("Failed to create appointment", e)
                }
            })?;

        parse_first(rows)?.ok_or_else(|| RepositoryError::Storage("Insert returned no rows".to_string()))
    }

    async fn get(&self, appointment_id: Uuid, auth_token: Option<&str>)
                 -> Result<Option<Appointment>, RepositoryError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| storage_error("Failed to load appointment", e))?;

        parse_first(rows)
    }

    async fn update(&self, appointment_id: Uuid, update: &AppointmentUpdate, auth_token: Option<&str>)
                    -> Result<Appointment, RepositoryError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let body = serde_json::to_value(update)
            .map_err(|e| RepositoryError::Storage(format!("Failed to encode update: {}", e)))?;

        let rows = self.supabase
            .request_returning(Method::PATCH, &path, auth_token, body)
            .await
            .map_err(|e| storage_error("Failed to update appointment", e))?;

        parse_first(rows)?.ok_or(RepositoryError::NotFound)
    }

    async fn list_for_user(&self, user_id: &str, status: Option<AppointmentStatus>, auth_token: Option<&str>)
                           -> Result<Vec<Appointment>, RepositoryError> {
        let mut path = format!(
            "/rest/v1/appointments?user_id=eq.{}&order=datetime.asc",
            urlencoding::encode(user_id)
        );
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let appointments: Vec<Appointment> = self.supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| storage_error("Failed to list appointments", e))?;

        Ok(appointments)
    }
}
