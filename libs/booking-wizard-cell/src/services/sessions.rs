// libs/booking-wizard-cell/src/services/sessions.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::models::CreateAppointmentRequest;
use appointment_cell::services::AppointmentStore;
use scheduling_cell::services::{clinic_today, AvailabilityGateway, SlotProvider};
use shared_config::AppConfig;
use shared_models::auth::{IdentityProvider, IdentitySnapshot};
use shared_models::error::AppError;
use staff_cell::models::PatientGenderPreference;
use staff_cell::services::{StaffMatcher, SupabaseStaffDirectory};

use crate::models::{ContactInfo, SubmissionStart, WizardStep, WizardView};
use crate::services::wizard::BookingWizard;

/// The collaborators a wizard talks to.
#[derive(Clone)]
pub struct WizardServices {
    pub slots: Arc<dyn SlotProvider>,
    pub staff: Arc<StaffMatcher>,
    pub appointments: Arc<AppointmentStore>,
}

impl WizardServices {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            slots: Arc::new(AvailabilityGateway::new(config)),
            staff: Arc::new(StaffMatcher::new(Arc::new(SupabaseStaffDirectory::new(config)))),
            appointments: Arc::new(AppointmentStore::from_config(config)),
        }
    }
}

struct LiveSession {
    wizard: BookingWizard,
    last_touched: Instant,
}

impl LiveSession {
    fn touch(&mut self) -> &mut BookingWizard {
        self.last_touched = Instant::now();
        &mut self.wizard
    }
}

type SharedSession = Arc<Mutex<LiveSession>>;

/// Live wizards keyed by session id. Each wizard has its own lock, released
/// while its lookups are in flight.
///
/// Sessions idle for longer than the TTL are swept whenever a new one opens.
/// Submissions run on their own task, so a caller that goes away mid-submit
/// never leaves the wizard stuck in `submitting`.
pub struct BookingSessions {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
    services: WizardServices,
    config: Arc<AppConfig>,
    session_ttl: Duration,
    submission_timeout: Duration,
}

impl BookingSessions {
    pub fn new(config: Arc<AppConfig>, services: WizardServices) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            services,
            session_ttl: Duration::from_secs(config.booking_session_ttl_secs),
            submission_timeout: Duration::from_secs(config.booking_submission_timeout_secs),
            config,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_submission_timeout(mut self, timeout: Duration) -> Self {
        self.submission_timeout = timeout;
        self
    }

    pub fn services(&self) -> &WizardServices {
        &self.services
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub async fn create(&self) -> WizardView {
        self.sweep_expired(Instant::now()).await;

        let session_id = Uuid::new_v4();
        let wizard = BookingWizard::from_config(&self.config);
        let view = wizard.view(session_id);

        let session = LiveSession { wizard, last_touched: Instant::now() };
        self.sessions.write().await.insert(session_id, Arc::new(Mutex::new(session)));
        info!("Opened booking session {}", session_id);
        view
    }

    /// Drop sessions idle since before `now - ttl`. Sessions that are busy or
    /// mid-submission are kept.
    pub async fn sweep_expired(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|session_id, session| {
            let Ok(live) = session.try_lock() else {
                return true;
            };
            let keep = live.wizard.is_submitting()
                || now.saturating_duration_since(live.last_touched) < self.session_ttl;
            if !keep {
                debug!("Expired booking session {}", session_id);
            }
            keep
        });

        let expired = before - sessions.len();
        if expired > 0 {
            info!("Swept {} idle booking sessions", expired);
        }
        expired
    }

    async fn session(&self, session_id: Uuid) -> Result<SharedSession, AppError> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Booking session {} not found", session_id)))
    }

    pub async fn remove(&self, session_id: Uuid) -> Result<(), AppError> {
        self.sessions
            .write()
            .await
            .remove(&session_id)
            .map(|_| debug!("Closed booking session {}", session_id))
            .ok_or_else(|| AppError::NotFound(format!("Booking session {} not found", session_id)))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Current state, after resetting a confirmation that has been shown long enough.
    pub async fn view(&self, session_id: Uuid) -> Result<WizardView, AppError> {
        let session = self.session(session_id).await?;
        let mut live = session.lock().await;
        let wizard = live.touch();
        wizard.poll_reset(Instant::now());
        Ok(wizard.view(session_id))
    }

    async fn with_wizard<F>(&self, session_id: Uuid, action: F) -> Result<WizardView, AppError>
    where
        F: FnOnce(&mut BookingWizard) -> Result<(), AppError>,
    {
        let session = self.session(session_id).await?;
        let mut live = session.lock().await;
        let wizard = live.touch();
        action(wizard)?;
        Ok(wizard.view(session_id))
    }

    pub async fn update_info(&self, session_id: Uuid, info: ContactInfo) -> Result<WizardView, AppError> {
        self.with_wizard(session_id, |wizard| wizard.update_info(info)).await
    }

    /// Move forward; entering the provider step loads the provider list.
    pub async fn advance(&self, session_id: Uuid) -> Result<WizardView, AppError> {
        let step = {
            let session = self.session(session_id).await?;
            let mut live = session.lock().await;
            live.touch().advance()?
        };

        if step == WizardStep::Provider {
            return self.refresh_staff(session_id).await;
        }
        self.view(session_id).await
    }

    pub async fn go_back_to(&self, session_id: Uuid, step: WizardStep) -> Result<WizardView, AppError> {
        self.with_wizard(session_id, |wizard| wizard.go_back_to(step).map(|_| ())).await
    }

    /// Pick a day and load its open times.
    pub async fn select_date(&self, session_id: Uuid, date: NaiveDate) -> Result<WizardView, AppError> {
        let session = self.session(session_id).await?;

        let ticket = session.lock().await.touch().begin_slot_query(date, clinic_today())?;

        let lookup = self.services.slots.list_available_slots(ticket.date, &ticket.service_name).await;

        let mut live = session.lock().await;
        let wizard = live.touch();
        wizard.apply_slots(&ticket, lookup);
        Ok(wizard.view(session_id))
    }

    pub async fn select_slot(&self, session_id: Uuid, time: NaiveTime) -> Result<WizardView, AppError> {
        self.with_wizard(session_id, |wizard| wizard.select_slot(time)).await
    }

    /// Record a gender preference and reload providers with it applied.
    pub async fn choose_gender_preference(
        &self,
        session_id: Uuid,
        preference: PatientGenderPreference,
    ) -> Result<WizardView, AppError> {
        {
            let session = self.session(session_id).await?;
            session.lock().await.touch().choose_gender_preference(preference)?;
        }
        self.refresh_staff(session_id).await
    }

    pub async fn refresh_staff(&self, session_id: Uuid) -> Result<WizardView, AppError> {
        let session = self.session(session_id).await?;

        let ticket = session.lock().await.touch().begin_staff_query()?;

        let result = self.services.staff
            .find_available_staff(&ticket.service_name, ticket.date, ticket.time, ticket.preference)
            .await;

        let mut live = session.lock().await;
        let wizard = live.touch();
        wizard.apply_staff_result(&ticket, result);
        Ok(wizard.view(session_id))
    }

    pub async fn select_staff(&self, session_id: Uuid, staff_id: Option<Uuid>) -> Result<WizardView, AppError> {
        self.with_wizard(session_id, |wizard| wizard.select_staff(staff_id).map(|_| ())).await
    }

    /// Submit the reviewed booking. Anonymous callers get the view back with a
    /// pending-submission token to redeem after signing in.
    pub async fn submit(&self, session_id: Uuid, identity: &dyn IdentityProvider) -> Result<WizardView, AppError> {
        let session = self.session(session_id).await?;

        let start = session.lock().await.touch().begin_submission(identity)?;

        let request = match start {
            SubmissionStart::Ready(request) => request,
            SubmissionStart::AwaitingAuth(_) => return Ok(session.lock().await.wizard.view(session_id)),
        };

        self.run_submission(session_id, session, request, IdentitySnapshot::capture(identity)).await
    }

    /// Redeem a pending-submission token with the now signed-in identity.
    pub async fn resume(
        &self,
        session_id: Uuid,
        token: Uuid,
        identity: &dyn IdentityProvider,
    ) -> Result<WizardView, AppError> {
        let session = self.session(session_id).await?;

        let request = session.lock().await.touch().resume_submission(token, identity)?;

        self.run_submission(session_id, session, request, IdentitySnapshot::capture(identity)).await
    }

    /// The store call and its bookkeeping run on a detached task bounded by the
    /// submission timeout; the wizard leaves `submitting` even if the caller
    /// stops waiting.
    async fn run_submission(
        &self,
        session_id: Uuid,
        session: SharedSession,
        request: CreateAppointmentRequest,
        identity: IdentitySnapshot,
    ) -> Result<WizardView, AppError> {
        let store = self.services.appointments.clone();
        let limit = self.submission_timeout;

        let task = tokio::spawn(async move {
            let result = match tokio::time::timeout(limit, store.create_appointment(request, &identity)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Booking submission for session {} timed out after {:?}", session_id, limit);
                    Err(AppError::Upstream("Booking submission timed out".to_string()))
                }
            };

            let mut live = session.lock().await;
            let wizard = live.touch();
            wizard.finish_submission(result, Instant::now())?;
            Ok::<_, AppError>(wizard.view(session_id))
        });

        task.await
            .map_err(|e| AppError::Internal(format!("Submission task failed: {}", e)))?
    }

    pub async fn start_over(&self, session_id: Uuid) -> Result<WizardView, AppError> {
        self.with_wizard(session_id, |wizard| wizard.start_over()).await
    }
}
