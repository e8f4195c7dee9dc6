// libs/appointment-cell/src/services/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, AppointmentUpdate, RepositoryError};
use crate::services::repository::AppointmentRepository;

/// Appointments kept in process memory. Enforces confirmation-code uniqueness
/// the same way the `appointments` table does.
#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn insert(&self, appointment: &Appointment, _auth_token: Option<&str>)
                    -> Result<Appointment, RepositoryError> {
        let mut appointments = self.appointments.write().await;

        if appointments.values().any(|a| a.confirmation_code == appointment.confirmation_code) {
            return Err(RepositoryError::DuplicateConfirmationCode);
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn get(&self, appointment_id: Uuid, _auth_token: Option<&str>)
                 -> Result<Option<Appointment>, RepositoryError> {
        Ok(self.appointments.read().await.get(&appointment_id).cloned())
    }

    async fn update(&self, appointment_id: Uuid, update: &AppointmentUpdate, _auth_token: Option<&str>)
                    -> Result<Appointment, RepositoryError> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments.get_mut(&appointment_id).ok_or(RepositoryError::NotFound)?;

        update.apply_to(appointment);
        Ok(appointment.clone())
    }

    async fn list_for_user(&self, user_id: &str, status: Option<AppointmentStatus>, _auth_token: Option<&str>)
                           -> Result<Vec<Appointment>, RepositoryError> {
        let appointments = self.appointments.read().await;
        let mut matching: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.user_id == user_id)
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();

        matching.sort_by_key(|a| (a.datetime, a.created_at));
        Ok(matching)
    }
}
