// libs/appointment-cell/src/services/repository.rs
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, AppointmentUpdate, RepositoryError};

/// Persistence for appointments. `auth_token` is the caller's bearer, passed
/// through so the store can apply row-level security; in-memory stores ignore it.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Fails with `DuplicateConfirmationCode` when the code is already taken.
    async fn insert(&self, appointment: &Appointment, auth_token: Option<&str>)
                    -> Result<Appointment, RepositoryError>;

    async fn get(&self, appointment_id: Uuid, auth_token: Option<&str>)
                 -> Result<Option<Appointment>, RepositoryError>;

    async fn update(&self, appointment_id: Uuid, update: &AppointmentUpdate, auth_token: Option<&str>)
                    -> Result<Appointment, RepositoryError>;

    /// Ascending by appointment datetime.
    async fn list_for_user(&self, user_id: &str, status: Option<AppointmentStatus>, auth_token: Option<&str>)
                           -> Result<Vec<Appointment>, RepositoryError>;
}
