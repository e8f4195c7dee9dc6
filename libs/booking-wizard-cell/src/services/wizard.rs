// libs/booking-wizard-cell/src/services/wizard.rs
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::models::{Appointment, CreateAppointmentRequest};
use scheduling_cell::models::SlotLookup;
use scheduling_cell::services::{BookingCalendar, ServiceCatalog};
use shared_config::{AppConfig, DEFAULT_BOOKING_SUCCESS_RESET_SECS};
use shared_models::auth::IdentityProvider;
use shared_models::error::AppError;
use staff_cell::models::{PatientGenderPreference, StaffMatch};

use crate::models::{
    BookingDraft, ContactInfo, PendingSubmission, ProviderPhase, QueryKind, SlotQueryTicket,
    StaffQueryTicket, SubmissionStart, WizardStep, WizardView,
};
use crate::services::sequencer::RequestSequencer;

/// One patient's walk through the four booking steps.
///
/// All methods are synchronous. Lookups are split into `begin_*` (issue a
/// ticket) and `apply_*` (accept the answer if the ticket is still current) so
/// the caller can release its lock while the network call runs.
#[derive(Debug)]
pub struct BookingWizard {
    step: WizardStep,
    phase: ProviderPhase,
    draft: BookingDraft,
    slots: Option<SlotLookup>,
    staff: Option<StaffMatch>,
    sequencer: RequestSequencer,
    submitting: bool,
    pending: Option<PendingSubmission>,
    last_error: Option<AppError>,
    appointment: Option<Appointment>,
    submitted_at: Option<Instant>,
    reset_delay: Duration,
    calendar: BookingCalendar,
    catalog: ServiceCatalog,
}

impl Default for BookingWizard {
    fn default() -> Self {
        Self::new(
            BookingCalendar::default(),
            Duration::from_secs(DEFAULT_BOOKING_SUCCESS_RESET_SECS),
        )
    }
}

impl BookingWizard {
    pub fn new(calendar: BookingCalendar, reset_delay: Duration) -> Self {
        Self {
            step: WizardStep::Info,
            phase: ProviderPhase::default(),
            draft: BookingDraft::default(),
            slots: None,
            staff: None,
            sequencer: RequestSequencer::new(),
            submitting: false,
            pending: None,
            last_error: None,
            appointment: None,
            submitted_at: None,
            reset_delay,
            calendar,
            catalog: ServiceCatalog::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            BookingCalendar::new(config.booking_horizon_months),
            Duration::from_secs(config.booking_success_reset_secs),
        )
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn provider_phase(&self) -> ProviderPhase {
        self.phase
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn slots(&self) -> Option<&SlotLookup> {
        self.slots.as_ref()
    }

    pub fn staff_match(&self) -> Option<&StaffMatch> {
        self.staff.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn pending_submission(&self) -> Option<PendingSubmission> {
        self.pending
    }

    pub fn last_error(&self) -> Option<&AppError> {
        self.last_error.as_ref()
    }

    pub fn appointment(&self) -> Option<&Appointment> {
        self.appointment.as_ref()
    }

    pub fn view(&self, session_id: Uuid) -> WizardView {
        WizardView {
            session_id,
            step: self.step,
            step_number: self.step.number(),
            provider_phase: self.phase,
            draft: self.draft.clone(),
            slots: self.slots.clone(),
            staff: self.staff.clone(),
            submitting: self.submitting,
            pending_submission: self.pending,
            error: self.last_error.as_ref().map(|e| e.message().to_string()),
            appointment: self.appointment.clone(),
        }
    }

    fn ensure_editable(&self) -> Result<(), AppError> {
        if self.step == WizardStep::Submitted {
            return Err(AppError::ValidationError("Booking already submitted".to_string()));
        }
        if self.submitting {
            return Err(AppError::Conflict("Submission in progress".to_string()));
        }
        Ok(())
    }

    fn ensure_step(&self, expected: WizardStep) -> Result<(), AppError> {
        self.ensure_editable()?;
        if self.step != expected {
            return Err(AppError::ValidationError(format!(
                "Not available on the {:?} step", self.step
            )));
        }
        Ok(())
    }

    fn reset_provider(&mut self) {
        self.draft.clear_provider();
        self.staff = None;
        self.phase = ProviderPhase::AwaitingPreference;
        self.sequencer.invalidate(QueryKind::Staff);
    }

    fn reset_schedule(&mut self) {
        self.draft.clear_schedule();
        self.slots = None;
        self.sequencer.invalidate(QueryKind::Slots);
        self.reset_provider();
    }

    // --------------------------------------------------------------------------
    // Step 1
    // --------------------------------------------------------------------------

    /// Store the contact form. A different service clears date, time and provider.
    pub fn update_info(&mut self, info: ContactInfo) -> Result<(), AppError> {
        self.ensure_step(WizardStep::Info)?;

        let service_changed = self.draft.service_name.trim() != info.service_name.trim();

        self.draft.first_name = info.first_name;
        self.draft.last_name = info.last_name;
        self.draft.email = info.email;
        self.draft.phone = info.phone;
        self.draft.service_name = info.service_name;
        self.draft.message = info.message.filter(|m| !m.trim().is_empty());

        if service_changed {
            debug!("Service changed to '{}', clearing schedule", self.draft.service_name);
            self.reset_schedule();
        }

        self.last_error = None;
        Ok(())
    }

    /// Move forward one step if the current step's guard holds.
    pub fn advance(&mut self) -> Result<WizardStep, AppError> {
        self.ensure_editable()?;

        let next = match self.step {
            WizardStep::Info => {
                if let Some(field) = self.draft.missing_info_field() {
                    return Err(AppError::ValidationError(format!("{} is required", field)));
                }
                let service = self.catalog.lookup(&self.draft.service_name).ok_or_else(|| {
                    AppError::ValidationError(format!("Unknown service: {}", self.draft.service_name.trim()))
                })?;
                self.draft.service_name = service.name.to_string();
                WizardStep::DateTime
            }
            WizardStep::DateTime => {
                if self.draft.date.is_none() || self.draft.time.is_none() {
                    return Err(AppError::ValidationError("Choose a date and time".to_string()));
                }
                WizardStep::Provider
            }
            // Choosing a provider is optional
            WizardStep::Provider => WizardStep::Review,
            WizardStep::Review => {
                return Err(AppError::ValidationError("Submit to finish booking".to_string()));
            }
            WizardStep::Submitted => {
                return Err(AppError::ValidationError("Booking already submitted".to_string()));
            }
        };

        debug!("Wizard advanced {:?} -> {:?}", self.step, next);
        self.step = next;
        self.last_error = None;
        Ok(next)
    }

    /// Return to any earlier step. Nothing already entered is lost.
    pub fn go_back_to(&mut self, target: WizardStep) -> Result<WizardStep, AppError> {
        self.ensure_editable()?;

        if target >= self.step {
            return Err(AppError::ValidationError(format!(
                "Cannot go back from {:?} to {:?}", self.step, target
            )));
        }

        if self.pending.take().is_some() {
            debug!("Dropped pending submission on going back to {:?}", target);
        }

        self.step = target;
        self.last_error = None;
        Ok(target)
    }

    // --------------------------------------------------------------------------
    // Step 2
    // --------------------------------------------------------------------------

    /// Pick a day and issue a slot lookup for it. Closed days are refused here
    /// without any lookup being issued.
    pub fn begin_slot_query(&mut self, date: NaiveDate, today: NaiveDate) -> Result<SlotQueryTicket, AppError> {
        self.ensure_step(WizardStep::DateTime)?;

        self.calendar
            .check_date(date, today)
            .map_err(|rejection| AppError::ValidationError(rejection.to_string()))?;

        if self.draft.date != Some(date) {
            self.draft.date = Some(date);
            self.draft.clear_time();
            self.reset_provider();
        }

        self.slots = None;
        let ticket = SlotQueryTicket {
            sequence: self.sequencer.issue(QueryKind::Slots),
            date,
            service_name: self.draft.service_name.clone(),
        };

        debug!("Issued slot query #{} for {} on {}", ticket.sequence, ticket.service_name, date);
        Ok(ticket)
    }

    /// Accept a slot lookup unless a newer one was issued or the inputs moved on.
    pub fn apply_slots(&mut self, ticket: &SlotQueryTicket, lookup: SlotLookup) -> bool {
        let current = self.sequencer.is_latest(QueryKind::Slots, ticket.sequence)
            && self.draft.date == Some(ticket.date)
            && self.draft.service_name == ticket.service_name;

        if !current {
            debug!("Discarding stale slot result #{}", ticket.sequence);
            return false;
        }

        // Only a successful lookup can rule out the chosen time
        match &lookup.error {
            Some(error) => warn!("Slot lookup for {} failed: {}", ticket.date, error),
            None => {
                if let Some(time) = self.draft.time {
                    if lookup.contains_time(time).is_none() {
                        self.draft.clear_time();
                        self.reset_provider();
                    }
                }
            }
        }

        self.slots = Some(lookup);
        true
    }

    /// Choose one of the listed times.
    pub fn select_slot(&mut self, time: NaiveTime) -> Result<(), AppError> {
        self.ensure_step(WizardStep::DateTime)?;

        let slot = self.slots
            .as_ref()
            .filter(|lookup| Some(lookup.date) == self.draft.date)
            .and_then(|lookup| lookup.contains_time(time))
            .cloned()
            .ok_or_else(|| AppError::ValidationError("That time is not available".to_string()))?;

        if self.draft.time != Some(slot.time) {
            self.reset_provider();
        }

        self.draft.time = Some(slot.time);
        self.draft.datetime = Some(slot.datetime);
        self.last_error = None;
        Ok(())
    }

    // --------------------------------------------------------------------------
    // Step 3
    // --------------------------------------------------------------------------

    /// Record the patient's provider-gender preference. Does not advance; the
    /// caller re-queries staff afterwards. The list loaded under the previous
    /// preference is dropped until that query lands.
    pub fn choose_gender_preference(&mut self, preference: PatientGenderPreference) -> Result<(), AppError> {
        self.ensure_step(WizardStep::Provider)?;

        self.draft.staff_gender_preference = Some(preference);
        self.draft.selected_staff_id = None;
        self.staff = None;
        self.phase = ProviderPhase::PreferenceCollected;
        self.sequencer.invalidate(QueryKind::Staff);
        Ok(())
    }

    pub fn begin_staff_query(&mut self) -> Result<StaffQueryTicket, AppError> {
        self.ensure_step(WizardStep::Provider)?;

        let (Some(date), Some(time)) = (self.draft.date, self.draft.time) else {
            return Err(AppError::ValidationError("Choose a date and time".to_string()));
        };

        let ticket = StaffQueryTicket {
            sequence: self.sequencer.issue(QueryKind::Staff),
            service_name: self.draft.service_name.clone(),
            date,
            time,
            preference: self.draft.staff_gender_preference,
        };

        debug!("Issued staff query #{} for {} on {} at {}",
               ticket.sequence, ticket.service_name, date, time);
        Ok(ticket)
    }

    pub fn apply_staff_result(&mut self, ticket: &StaffQueryTicket, result: Result<StaffMatch, AppError>) -> bool {
        let current = self.sequencer.is_latest(QueryKind::Staff, ticket.sequence)
            && self.draft.service_name == ticket.service_name
            && self.draft.date == Some(ticket.date)
            && self.draft.time == Some(ticket.time)
            && self.draft.staff_gender_preference == ticket.preference;

        if !current {
            debug!("Discarding stale staff result #{}", ticket.sequence);
            return false;
        }

        match result {
            Ok(found) => {
                if let Some(selected) = self.draft.selected_staff_id {
                    if !found.staff.iter().any(|c| c.staff_id == selected) {
                        self.draft.selected_staff_id = None;
                    }
                }
                self.staff = Some(found);
                self.phase = ProviderPhase::StaffQueried;
                self.last_error = None;
            }
            Err(e) => {
                warn!("Staff lookup #{} failed: {}", ticket.sequence, e);
                self.last_error = Some(e);
            }
        }

        true
    }

    /// Pick a provider from the current list, or `None` for "no specific
    /// provider". Either way the wizard moves on to review.
    pub fn select_staff(&mut self, staff_id: Option<Uuid>) -> Result<WizardStep, AppError> {
        self.ensure_step(WizardStep::Provider)?;

        if let Some(staff_id) = staff_id {
            if !matches!(self.phase, ProviderPhase::StaffQueried | ProviderPhase::StaffChosen) {
                return Err(AppError::ValidationError("Providers have not been loaded".to_string()));
            }

            let found = self.staff
                .as_ref()
                .ok_or_else(|| AppError::ValidationError("Providers have not been loaded".to_string()))?;

            if found.policy.asks_patient() && self.draft.staff_gender_preference.is_none() {
                return Err(AppError::ValidationError(
                    "Choose a provider gender preference first".to_string(),
                ));
            }

            if !found.staff.iter().any(|c| c.staff_id == staff_id) {
                return Err(AppError::ValidationError(
                    "That provider is not available at this time".to_string(),
                ));
            }
        }

        self.draft.selected_staff_id = staff_id;
        self.phase = ProviderPhase::StaffChosen;
        self.step = WizardStep::Review;
        self.last_error = None;
        Ok(self.step)
    }

    // --------------------------------------------------------------------------
    // Step 4
    // --------------------------------------------------------------------------

    /// Start the final submission. Without a signed-in user the draft is parked
    /// behind a pending-submission token instead.
    pub fn begin_submission(&mut self, identity: &dyn IdentityProvider) -> Result<SubmissionStart, AppError> {
        if self.submitting {
            return Err(AppError::Conflict("Submission already in progress".to_string()));
        }
        self.ensure_step(WizardStep::Review)?;

        let request = self.draft.to_request()?;

        if identity.current_user_id().is_none() {
            let pending = *self.pending.get_or_insert_with(PendingSubmission::new);
            info!("Submission waiting for sign-in (token {})", pending.token);
            return Ok(SubmissionStart::AwaitingAuth(pending));
        }

        self.submitting = true;
        self.last_error = None;
        Ok(SubmissionStart::Ready(request))
    }

    /// Redeem a pending-submission token once the patient has signed in.
    pub fn resume_submission(
        &mut self,
        token: Uuid,
        identity: &dyn IdentityProvider,
    ) -> Result<CreateAppointmentRequest, AppError> {
        if self.submitting {
            return Err(AppError::Conflict("Submission already in progress".to_string()));
        }

        self.ensure_step(WizardStep::Review)?;

        if self.pending.map(|p| p.token) != Some(token) {
            return Err(AppError::ValidationError("No pending submission for this token".to_string()));
        }

        if identity.current_user_id().is_none() {
            return Err(AppError::AuthRequired("Sign in to finish booking".to_string()));
        }

        let request = self.draft.to_request()?;
        self.pending = None;
        self.submitting = true;
        self.last_error = None;
        Ok(request)
    }

    /// Record the store's answer. On failure the wizard stays on review with
    /// everything intact.
    pub fn finish_submission(&mut self, result: Result<Appointment, AppError>, now: Instant) -> Result<(), AppError> {
        self.submitting = false;

        match result {
            Ok(appointment) => {
                info!("Booking submitted: {} ({})", appointment.id, appointment.confirmation_code);
                self.appointment = Some(appointment);
                self.step = WizardStep::Submitted;
                self.submitted_at = Some(now);
                self.pending = None;
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!("Booking submission failed: {}", e);
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Start over once the confirmation has been shown long enough.
    pub fn poll_reset(&mut self, now: Instant) -> bool {
        let due = self.step == WizardStep::Submitted
            && self.submitted_at
                .is_some_and(|at| now.saturating_duration_since(at) >= self.reset_delay);

        if due {
            self.reset();
        }
        due
    }

    /// Discard the booking and return to step 1.
    pub fn start_over(&mut self) -> Result<(), AppError> {
        if self.submitting {
            return Err(AppError::Conflict("Submission in progress".to_string()));
        }
        self.reset();
        Ok(())
    }

    /// Empty draft, back to step 1. Outstanding lookups become stale.
    fn reset(&mut self) {
        self.step = WizardStep::Info;
        self.phase = ProviderPhase::default();
        self.draft = BookingDraft::default();
        self.slots = None;
        self.staff = None;
        self.submitting = false;
        self.pending = None;
        self.last_error = None;
        self.appointment = None;
        self.submitted_at = None;
        self.sequencer.invalidate(QueryKind::Slots);
        self.sequencer.invalidate(QueryKind::Staff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{NaiveDateTime, Utc};
    use scheduling_cell::models::Slot;
    use staff_cell::models::{GenderPreferenceMode, GenderPreferencePolicy, StaffCandidate, StaffGender, StaffRole};

    use appointment_cell::models::AppointmentStatus;

    // Saturday; the next bookable day is Monday 2024-06-03.
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn info(service: &str) -> ContactInfo {
        ContactInfo {
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            email: "a@b.co".to_string(),
            phone: "5".to_string(),
            service_name: service.to_string(),
            message: None,
        }
    }

    fn lookup(date: NaiveDate, times: &[NaiveTime]) -> SlotLookup {
        let slots = times
            .iter()
            .map(|t| Slot { time: *t, datetime: NaiveDateTime::new(date, *t) })
            .collect();
        SlotLookup::found(date, "IV Therapy", slots)
    }

    fn candidate(last: &str, gender: StaffGender) -> StaffCandidate {
        StaffCandidate {
            staff_id: Uuid::new_v4(),
            first_name: "Sam".to_string(),
            last_name: last.to_string(),
            role: StaffRole::NursePractitioner,
            gender,
            specializations: vec![],
        }
    }

    fn staff_match(policy: GenderPreferencePolicy, staff: Vec<StaffCandidate>) -> StaffMatch {
        StaffMatch {
            preference_prompt_required: policy.asks_patient(),
            staff,
            policy,
            applied_gender: None,
            soft_filter_exhausted: false,
        }
    }

    fn appointment(request: &CreateAppointmentRequest) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            service_type: request.service_type.clone(),
            appointment_date: request.appointment_date,
            appointment_time: request.appointment_time,
            datetime: request.appointment_date.and_time(request.appointment_time),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            message: None,
            status: AppointmentStatus::Pending,
            confirmation_code: "SWC-ABC123".to_string(),
            assigned_staff_id: request.assigned_staff_id,
            staff_gender_preference: request.staff_gender_preference,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
            cancellation_reason: None,
        }
    }

    /// Wizard parked on the provider step with 09:00 Monday chosen.
    fn at_provider_step() -> BookingWizard {
        let mut wizard = BookingWizard::default();
        wizard.update_info(info("IV Therapy")).unwrap();
        wizard.advance().unwrap();
        let ticket = wizard.begin_slot_query(monday(), today()).unwrap();
        assert!(wizard.apply_slots(&ticket, lookup(monday(), &[at(9, 0), at(10, 0)])));
        wizard.select_slot(at(9, 0)).unwrap();
        assert_eq!(wizard.advance().unwrap(), WizardStep::Provider);
        wizard
    }

    fn at_review_step() -> BookingWizard {
        let mut wizard = at_provider_step();
        wizard.select_staff(None).unwrap();
        wizard
    }

    #[test]
    fn test_single_character_fields_pass_step_one() {
        let mut wizard = BookingWizard::default();
        wizard.update_info(info("IV Therapy")).unwrap();

        assert_eq!(wizard.advance().unwrap(), WizardStep::DateTime);
    }

    #[test]
    fn test_step_one_blocks_blank_and_unknown_service() {
        let mut wizard = BookingWizard::default();
        wizard.update_info(ContactInfo { email: " ".to_string(), ..info("IV Therapy") }).unwrap();
        assert_matches!(wizard.advance(), Err(AppError::ValidationError(msg)) if msg.contains("email"));

        wizard.update_info(info("Botox")).unwrap();
        assert_matches!(wizard.advance(), Err(AppError::ValidationError(_)));
        assert_eq!(wizard.step(), WizardStep::Info);
    }

    #[test]
    fn test_service_name_is_normalized_on_advance() {
        let mut wizard = BookingWizard::default();
        wizard.update_info(info("  IV Therapy ")).unwrap();
        wizard.advance().unwrap();

        assert_eq!(wizard.draft().service_name, "IV Therapy");
    }

    #[test]
    fn test_weekend_date_is_refused_without_query() {
        let mut wizard = BookingWizard::default();
        wizard.update_info(info("IV Therapy")).unwrap();
        wizard.advance().unwrap();

        let issued = wizard.sequencer.latest(QueryKind::Slots);
        let saturday = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap();
        assert_matches!(wizard.begin_slot_query(saturday, today()), Err(AppError::ValidationError(_)));
        assert_eq!(wizard.sequencer.latest(QueryKind::Slots), issued);
        assert!(wizard.draft().date.is_none());
    }

    #[test]
    fn test_stale_slot_result_is_discarded() {
        let mut wizard = BookingWizard::default();
        wizard.update_info(info("IV Therapy")).unwrap();
        wizard.advance().unwrap();

        let tuesday = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        let first = wizard.begin_slot_query(monday(), today()).unwrap();
        let second = wizard.begin_slot_query(tuesday, today()).unwrap();

        assert!(wizard.apply_slots(&second, lookup(tuesday, &[at(11, 0)])));
        assert!(!wizard.apply_slots(&first, lookup(monday(), &[at(9, 0)])));

        assert_eq!(wizard.slots().unwrap().date, tuesday);
        assert_matches!(wizard.select_slot(at(9, 0)), Err(AppError::ValidationError(_)));
        assert!(wizard.select_slot(at(11, 0)).is_ok());
    }

    #[test]
    fn test_new_date_clears_time_and_provider() {
        let mut wizard = at_provider_step();
        wizard.go_back_to(WizardStep::DateTime).unwrap();

        let tuesday = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        wizard.begin_slot_query(tuesday, today()).unwrap();

        assert!(wizard.draft().time.is_none());
        assert!(wizard.draft().selected_staff_id.is_none());
        assert_matches!(wizard.advance(), Err(AppError::ValidationError(_)));
    }

    #[test]
    fn test_failed_slot_lookup_keeps_chosen_time() {
        let mut wizard = at_provider_step();
        wizard.go_back_to(WizardStep::DateTime).unwrap();

        let ticket = wizard.begin_slot_query(monday(), today()).unwrap();
        assert!(wizard.apply_slots(&ticket, SlotLookup::failed(monday(), "IV Therapy", "timeout")));
        assert_eq!(wizard.draft().time, Some(at(9, 0)));

        let ticket = wizard.begin_slot_query(monday(), today()).unwrap();
        assert!(wizard.apply_slots(&ticket, lookup(monday(), &[at(10, 0)])));
        assert!(wizard.draft().time.is_none());
    }

    #[test]
    fn test_going_back_keeps_entered_data() {
        let mut wizard = at_provider_step();
        wizard.go_back_to(WizardStep::Info).unwrap();

        assert_eq!(wizard.draft().time, Some(at(9, 0)));
        assert_matches!(wizard.go_back_to(WizardStep::Review), Err(AppError::ValidationError(_)));
    }

    #[test]
    fn test_changing_service_resets_schedule() {
        let mut wizard = at_provider_step();
        wizard.go_back_to(WizardStep::Info).unwrap();
        wizard.update_info(info("NAD+ Therapy")).unwrap();

        assert!(wizard.draft().date.is_none());
        assert!(wizard.slots().is_none());
    }

    #[test]
    fn test_staff_result_for_old_preference_is_stale() {
        let mut wizard = at_provider_step();
        let policy = GenderPreferencePolicy::new(GenderPreferenceMode::PatientChoice, false);

        let before = wizard.begin_staff_query().unwrap();
        wizard.choose_gender_preference(PatientGenderPreference::Female).unwrap();
        let after = wizard.begin_staff_query().unwrap();

        let everyone = staff_match(policy.clone(), vec![candidate("Kim", StaffGender::Male)]);
        assert!(!wizard.apply_staff_result(&before, Ok(everyone)));

        let women = staff_match(policy, vec![candidate("Santos", StaffGender::Female)]);
        assert!(wizard.apply_staff_result(&after, Ok(women)));
        assert_eq!(wizard.provider_phase(), ProviderPhase::StaffQueried);
        assert_eq!(wizard.staff_match().unwrap().staff[0].last_name, "Santos");
    }

    #[test]
    fn test_patient_choice_requires_preference_before_pick() {
        let mut wizard = at_provider_step();
        let policy = GenderPreferencePolicy::new(GenderPreferenceMode::PatientChoice, false);
        let kim = candidate("Kim", StaffGender::Male);
        let kim_id = kim.staff_id;

        let ticket = wizard.begin_staff_query().unwrap();
        wizard.apply_staff_result(&ticket, Ok(staff_match(policy, vec![kim])));

        assert_matches!(wizard.select_staff(Some(kim_id)), Err(AppError::ValidationError(_)));
        assert_eq!(wizard.step(), WizardStep::Provider);
    }

    #[test]
    fn test_new_preference_discards_old_list() {
        let mut wizard = at_provider_step();
        let policy = GenderPreferencePolicy::new(GenderPreferenceMode::PatientChoice, false);
        let kim = candidate("Kim", StaffGender::Male);
        let kim_id = kim.staff_id;

        let ticket = wizard.begin_staff_query().unwrap();
        wizard.apply_staff_result(&ticket, Ok(staff_match(policy, vec![kim])));
        wizard.choose_gender_preference(PatientGenderPreference::Female).unwrap();

        assert!(wizard.staff_match().is_none());
        let ticket = wizard.begin_staff_query().unwrap();
        wizard.apply_staff_result(&ticket, Err(AppError::Upstream("down".to_string())));

        assert_matches!(wizard.select_staff(Some(kim_id)), Err(AppError::ValidationError(_)));
        assert_eq!(wizard.step(), WizardStep::Provider);
        assert_eq!(wizard.select_staff(None).unwrap(), WizardStep::Review);
    }

    #[test]
    fn test_unknown_staff_is_rejected() {
        let mut wizard = at_provider_step();
        let ticket = wizard.begin_staff_query().unwrap();
        wizard.apply_staff_result(&ticket, Ok(staff_match(
            GenderPreferencePolicy::default(),
            vec![candidate("Kim", StaffGender::Male)],
        )));

        assert_matches!(wizard.select_staff(Some(Uuid::new_v4())), Err(AppError::ValidationError(_)));
    }

    #[test]
    fn test_staff_lookup_failure_keeps_state() {
        let mut wizard = at_provider_step();
        let ticket = wizard.begin_staff_query().unwrap();

        assert!(wizard.apply_staff_result(&ticket, Err(AppError::Upstream("down".to_string()))));
        assert_eq!(wizard.step(), WizardStep::Provider);
        assert_matches!(wizard.last_error(), Some(AppError::Upstream(_)));
        assert_eq!(wizard.draft().time, Some(at(9, 0)));
    }

    #[test]
    fn test_double_submit_is_blocked() {
        let mut wizard = at_review_step();
        let signed_in = Some("user-1".to_string());

        assert_matches!(wizard.begin_submission(&signed_in), Ok(SubmissionStart::Ready(_)));
        assert_matches!(wizard.begin_submission(&signed_in), Err(AppError::Conflict(_)));
        assert_matches!(wizard.start_over(), Err(AppError::Conflict(_)));
    }

    #[test]
    fn test_anonymous_submit_parks_behind_single_use_token() {
        let mut wizard = at_review_step();
        let anonymous: Option<String> = None;

        let pending = assert_matches!(
            wizard.begin_submission(&anonymous),
            Ok(SubmissionStart::AwaitingAuth(pending)) => pending
        );
        assert!(!wizard.is_submitting());

        // Still anonymous: token stays redeemable.
        assert_matches!(wizard.resume_submission(pending.token, &anonymous), Err(AppError::AuthRequired(_)));

        let signed_in = Some("user-1".to_string());
        let request = wizard.resume_submission(pending.token, &signed_in).unwrap();
        assert_eq!(request.appointment_time, at(9, 0));

        wizard.finish_submission(Err(AppError::Upstream("down".to_string())), Instant::now()).unwrap_err();
        assert_matches!(
            wizard.resume_submission(pending.token, &signed_in),
            Err(AppError::ValidationError(_))
        );
    }

    #[test]
    fn test_going_back_voids_pending_token() {
        let mut wizard = at_review_step();
        let pending = assert_matches!(
            wizard.begin_submission(&None::<String>),
            Ok(SubmissionStart::AwaitingAuth(pending)) => pending
        );

        wizard.go_back_to(WizardStep::Info).unwrap();

        assert!(wizard.pending_submission().is_none());
        assert_matches!(
            wizard.resume_submission(pending.token, &Some("user-1".to_string())),
            Err(AppError::ValidationError(_))
        );
        assert!(!wizard.is_submitting());
        assert!(wizard.appointment().is_none());
    }

    #[test]
    fn test_failed_submission_stays_on_review() {
        let mut wizard = at_review_step();
        let signed_in = Some("user-1".to_string());
        wizard.begin_submission(&signed_in).unwrap();

        let result = wizard.finish_submission(Err(AppError::Upstream("store down".to_string())), Instant::now());

        assert!(result.is_err());
        assert_eq!(wizard.step(), WizardStep::Review);
        assert!(!wizard.is_submitting());
        assert_eq!(wizard.draft().service_name, "IV Therapy");
        assert_matches!(wizard.begin_submission(&signed_in), Ok(SubmissionStart::Ready(_)));
    }

    #[test]
    fn test_successful_submission_resets_after_delay() {
        let mut wizard = BookingWizard::new(BookingCalendar::default(), Duration::from_secs(5));
        wizard.update_info(info("IV Therapy")).unwrap();
        wizard.advance().unwrap();
        let ticket = wizard.begin_slot_query(monday(), today()).unwrap();
        wizard.apply_slots(&ticket, lookup(monday(), &[at(9, 0)]));
        wizard.select_slot(at(9, 0)).unwrap();
        wizard.advance().unwrap();
        wizard.select_staff(None).unwrap();

        let request = assert_matches!(
            wizard.begin_submission(&Some("user-1".to_string())),
            Ok(SubmissionStart::Ready(request)) => request
        );
        let submitted = Instant::now();
        wizard.finish_submission(Ok(appointment(&request)), submitted).unwrap();

        assert_eq!(wizard.step(), WizardStep::Submitted);
        assert_matches!(wizard.update_info(info("IV Therapy")), Err(AppError::ValidationError(_)));

        assert!(!wizard.poll_reset(submitted + Duration::from_secs(4)));
        assert!(wizard.appointment().is_some());

        assert!(wizard.poll_reset(submitted + Duration::from_secs(5)));
        assert_eq!(wizard.step(), WizardStep::Info);
        assert_eq!(wizard.draft(), &BookingDraft::default());
    }

    #[test]
    fn test_start_over_invalidates_outstanding_lookups() {
        let mut wizard = BookingWizard::default();
        wizard.update_info(info("IV Therapy")).unwrap();
        wizard.advance().unwrap();
        let ticket = wizard.begin_slot_query(monday(), today()).unwrap();

        wizard.start_over().unwrap();

        assert!(!wizard.apply_slots(&ticket, lookup(monday(), &[at(9, 0)])));
        assert!(wizard.slots().is_none());
    }
}
