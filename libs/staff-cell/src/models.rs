// libs/staff-cell/src/models.rs
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_models::time_format::hhmm;

// ==============================================================================
// ENUMS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Nurse,
    NursePractitioner,
    PhysicianAssistant,
    Doctor,
    Technician,
}

impl StaffRole {
    /// Credential suffix shown after a provider's name.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            StaffRole::Nurse => "RN",
            StaffRole::NursePractitioner => "NP",
            StaffRole::PhysicianAssistant => "PA",
            StaffRole::Doctor => "MD",
            StaffRole::Technician => "Tech",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StaffGender {
    Male,
    Female,
    #[default]
    #[serde(other)]
    Unspecified,
}

impl fmt::Display for StaffGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaffGender::Male => write!(f, "male"),
            StaffGender::Female => write!(f, "female"),
            StaffGender::Unspecified => write!(f, "unspecified"),
        }
    }
}

fn gender_or_unspecified<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StaffGender, D::Error> {
    Ok(Option::<StaffGender>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenderPreferenceMode {
    #[default]
    Any,
    MaleOnly,
    FemaleOnly,
    PatientChoice,
}

/// What the patient asked for when the service lets them choose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatientGenderPreference {
    Male,
    Female,
    NoPreference,
}

impl PatientGenderPreference {
    pub fn as_gender(&self) -> Option<StaffGender> {
        match self {
            PatientGenderPreference::Male => Some(StaffGender::Male),
            PatientGenderPreference::Female => Some(StaffGender::Female),
            PatientGenderPreference::NoPreference => None,
        }
    }
}

impl fmt::Display for PatientGenderPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatientGenderPreference::Male => write!(f, "male"),
            PatientGenderPreference::Female => write!(f, "female"),
            PatientGenderPreference::NoPreference => write!(f, "no_preference"),
        }
    }
}

// ==============================================================================
// GENDER PREFERENCE POLICY
// ==============================================================================

/// Per-service rule for provider gender. Stored rows use `gender_preference`
/// and `is_strict`; both spellings are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenderPreferencePolicy {
    #[serde(alias = "gender_preference")]
    pub mode: GenderPreferenceMode,
    #[serde(alias = "is_strict", default)]
    pub strict: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl GenderPreferencePolicy {
    pub fn new(mode: GenderPreferenceMode, strict: bool) -> Self {
        Self { mode, strict, notes: None }
    }

    /// Gender every provider must have, regardless of what the patient says.
    pub fn required_gender(&self) -> Option<StaffGender> {
        if !self.strict {
            return None;
        }

        match self.mode {
            GenderPreferenceMode::MaleOnly => Some(StaffGender::Male),
            GenderPreferenceMode::FemaleOnly => Some(StaffGender::Female),
            _ => None,
        }
    }

    pub fn asks_patient(&self) -> bool {
        self.mode == GenderPreferenceMode::PatientChoice
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceGenderPolicy {
    pub service_name: String,
    pub policy: GenderPreferencePolicy,
}

// ==============================================================================
// STAFF
// ==============================================================================

/// A provider who can take the requested slot, as returned by the
/// eligible-staff query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffCandidate {
    pub staff_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub role: StaffRole,
    #[serde(default, deserialize_with = "gender_or_unspecified")]
    pub gender: StaffGender,
    #[serde(default)]
    pub specializations: Vec<String>,
}

impl StaffCandidate {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// "Jane Doe, NP"
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.full_name(), self.role.abbreviation())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRef {
    pub name: String,
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffService {
    pub service_id: Option<Uuid>,
    #[serde(default)]
    pub is_certified: bool,
    pub services: Option<ServiceRef>,
}

/// Recurring weekly window; `day_of_week` counts from Sunday = 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityWindow {
    pub day_of_week: u32,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

impl AvailabilityWindow {
    pub fn covers(&self, date: NaiveDate, start: NaiveTime, duration_minutes: u32) -> bool {
        if !self.is_available || self.day_of_week != date.weekday().num_days_from_sunday() {
            return false;
        }

        match end_of(start, duration_minutes) {
            Some(end) => self.start_time <= start && end <= self.end_time,
            None => false,
        }
    }
}

/// Leave request; only approved ones keep a provider off the schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimeOff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

impl TimeOff {
    pub fn blocks(&self, date: NaiveDate) -> bool {
        self.is_approved && self.start_date <= date && date <= self.end_date
    }

    /// Inclusive ranges touching at a single day count as overlapping.
    pub fn overlaps_range(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.end_date >= start && self.start_date <= end
    }
}

fn default_true() -> bool {
    true
}

/// Full roster entry with certifications, weekly windows and time off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub role: StaffRole,
    #[serde(default, deserialize_with = "gender_or_unspecified")]
    pub gender: StaffGender,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(alias = "is_active", default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub staff_services: Vec<StaffService>,
    #[serde(default)]
    pub staff_availability: Vec<AvailabilityWindow>,
    #[serde(default)]
    pub staff_time_off: Vec<TimeOff>,
}

impl StaffMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_certified_for(&self, service_name: &str) -> bool {
        self.staff_services.iter().any(|link| {
            link.is_certified
                && link.services.as_ref().is_some_and(|service| service.name == service_name)
        })
    }

    pub fn works_at(&self, date: NaiveDate, time: NaiveTime, duration_minutes: u32) -> bool {
        self.staff_availability
            .iter()
            .any(|window| window.covers(date, time, duration_minutes))
    }

    pub fn is_off_on(&self, date: NaiveDate) -> bool {
        self.staff_time_off.iter().any(|off| off.blocks(date))
    }

    pub fn to_candidate(&self) -> StaffCandidate {
        StaffCandidate {
            staff_id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            gender: self.gender,
            specializations: self.specializations.clone(),
        }
    }
}

/// A pending or confirmed appointment already holding a provider's time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedInterval {
    pub staff_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
}

impl BookedInterval {
    /// Half-open overlap of `[start, start + duration)` ranges on the same day.
    pub fn overlaps(&self, date: NaiveDate, start: NaiveTime, duration_minutes: u32) -> bool {
        if self.date != date {
            return false;
        }

        let (Some(own_end), Some(end)) = (
            end_of(self.start_time, self.duration_minutes),
            end_of(start, duration_minutes),
        ) else {
            return true;
        };

        self.start_time < end && start < own_end
    }
}

/// End of a block starting at `start`, or `None` if it would run past midnight.
fn end_of(start: NaiveTime, duration_minutes: u32) -> Option<NaiveTime> {
    let (end, wrapped) = start.overflowing_add_signed(Duration::minutes(duration_minutes as i64));
    (wrapped == 0).then_some(end)
}

// ==============================================================================
// ADMINISTRATION
// ==============================================================================

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Roster entry to create. Certifications, hours and leave are added afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStaffMember {
    pub first_name: String,
    pub last_name: String,
    pub role: StaffRole,
    #[serde(default)]
    pub gender: Option<StaffGender>,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewStaffMember {
    pub fn validate(&self) -> Result<(), String> {
        if blank(&self.first_name) || blank(&self.last_name) {
            return Err("first_name and last_name are required".to_string());
        }
        Ok(())
    }

    /// The member as stored, before any certifications or hours exist.
    pub fn into_member(self, id: Uuid) -> StaffMember {
        StaffMember {
            id,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            role: self.role,
            gender: self.gender.unwrap_or_default(),
            specializations: self.specializations,
            active: self.is_active,
            staff_services: vec![],
            staff_availability: vec![],
            staff_time_off: vec![],
        }
    }
}

/// Partial edit of a roster entry; `None` leaves the column alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffMemberUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<StaffRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<StaffGender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specializations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl StaffMemberUpdate {
    pub fn validate(&self) -> Result<(), String> {
        let nothing = self.first_name.is_none()
            && self.last_name.is_none()
            && self.role.is_none()
            && self.gender.is_none()
            && self.specializations.is_none()
            && self.is_active.is_none();
        if nothing {
            return Err("Nothing to update".to_string());
        }

        if [&self.first_name, &self.last_name].into_iter().flatten().any(|name| blank(name)) {
            return Err("Names cannot be blank".to_string());
        }
        Ok(())
    }

    pub fn apply_to(&self, member: &mut StaffMember) {
        if let Some(first_name) = &self.first_name {
            member.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = &self.last_name {
            member.last_name = last_name.trim().to_string();
        }
        if let Some(role) = self.role {
            member.role = role;
        }
        if let Some(gender) = self.gender {
            member.gender = gender;
        }
        if let Some(specializations) = &self.specializations {
            member.specializations = specializations.clone();
        }
        if let Some(active) = self.is_active {
            member.active = active;
        }
    }
}

/// Certification of a provider for one service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceAssignment {
    pub service_id: Uuid,
    #[serde(default = "default_true")]
    pub is_certified: bool,
    #[serde(default)]
    pub certification_date: Option<NaiveDate>,
    #[serde(default)]
    pub certification_expiry: Option<NaiveDate>,
}

impl ServiceAssignment {
    pub fn validate(&self) -> Result<(), String> {
        match (self.certification_date, self.certification_expiry) {
            (Some(from), Some(until)) if until < from => {
                Err("certification_expiry is before certification_date".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// A `staff_services` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffServiceLink {
    pub staff_id: Uuid,
    #[serde(flatten)]
    pub assignment: ServiceAssignment,
}

/// Weekly hours replace the previous set wholesale; days count from Sunday = 0.
pub fn validate_availability(windows: &[AvailabilityWindow]) -> Result<(), String> {
    for window in windows {
        if window.day_of_week > 6 {
            return Err(format!("day_of_week {} is out of range", window.day_of_week));
        }
        if window.start_time >= window.end_time {
            return Err(format!(
                "Window on day {} ends before it starts", window.day_of_week
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeOffRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
}

impl TimeOffRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.end_date < self.start_date {
            return Err("end_date is before start_date".to_string());
        }
        Ok(())
    }

    pub fn into_time_off(self, id: Uuid) -> TimeOff {
        TimeOff {
            id: Some(id),
            start_date: self.start_date,
            end_date: self.end_date,
            reason: self.reason.filter(|r| !blank(r)),
            ..Default::default()
        }
    }
}

/// Pending or confirmed appointment assigned to a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledAppointment {
    pub id: Uuid,
    #[serde(alias = "assigned_staff_id")]
    pub staff_id: Uuid,
    pub service_type: String,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub appointment_time: NaiveTime,
    pub status: String,
    #[serde(default)]
    pub confirmation_code: Option<String>,
}

impl ScheduledAppointment {
    pub fn holds_slot(&self) -> bool {
        matches!(self.status.as_str(), "pending" | "confirmed")
    }
}

/// A provider's working picture over `[start_date, end_date]`: weekly hours
/// they are available, approved leave touching the range, and the pending or
/// confirmed appointments inside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffSchedule {
    pub staff_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub availability: Vec<AvailabilityWindow>,
    pub time_off: Vec<TimeOff>,
    pub appointments: Vec<ScheduledAppointment>,
}

// ==============================================================================
// MATCHING
// ==============================================================================

/// Input to the eligible-staff query, serialized as the RPC's named arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EligibleStaffQuery {
    pub service_name: String,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub appointment_time: NaiveTime,
    pub duration_minutes: u32,
    pub gender_preference: Option<PatientGenderPreference>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StaffMatch {
    pub staff: Vec<StaffCandidate>,
    pub policy: GenderPreferencePolicy,
    /// The service lets the patient choose and they have not yet.
    pub preference_prompt_required: bool,
    /// Gender the list was narrowed to, if any.
    pub applied_gender: Option<StaffGender>,
    /// A soft patient preference filtered every candidate out.
    pub soft_filter_exhausted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn test_strict_policy_required_gender() {
        let strict_male = GenderPreferencePolicy::new(GenderPreferenceMode::MaleOnly, true);
        let soft_female = GenderPreferencePolicy::new(GenderPreferenceMode::FemaleOnly, false);

        assert_eq!(strict_male.required_gender(), Some(StaffGender::Male));
        assert_eq!(soft_female.required_gender(), None);
    }

    #[test]
    fn test_policy_row_aliases() {
        let policy: GenderPreferencePolicy = serde_json::from_str(
            r#"{"gender_preference": "patient_choice", "is_strict": false, "notes": "Ask first"}"#,
        ).unwrap();

        assert!(policy.asks_patient());
        assert_eq!(policy.notes.as_deref(), Some("Ask first"));
    }

    #[test]
    fn test_candidate_null_gender() {
        let candidate: StaffCandidate = serde_json::from_str(
            r#"{"staff_id": "4c1a5c52-1b2f-4a3e-9d64-0c4a2f3b5e61", "first_name": "Sam",
                "last_name": "Lee", "role": "technician", "gender": null}"#,
        ).unwrap();

        assert_eq!(candidate.gender, StaffGender::Unspecified);
        assert_eq!(candidate.display_name(), "Sam Lee, Tech");
    }

    #[test]
    fn test_window_covers_whole_appointment() {
        let window = AvailabilityWindow {
            day_of_week: 1,
            start_time: t(9, 0),
            end_time: t(12, 0),
            is_available: true,
        };

        assert!(window.covers(monday(), t(9, 0), 45));
        assert!(window.covers(monday(), t(11, 15), 45));
        assert!(!window.covers(monday(), t(11, 30), 45));
        assert!(!window.covers(monday(), t(8, 45), 30));
        assert!(!window.covers(monday().succ_opt().unwrap(), t(9, 0), 45));
    }

    #[test]
    fn test_booked_interval_half_open_overlap() {
        let booked = BookedInterval {
            staff_id: Uuid::new_v4(),
            date: monday(),
            start_time: t(10, 0),
            duration_minutes: 60,
        };

        assert!(booked.overlaps(monday(), t(10, 30), 30));
        assert!(booked.overlaps(monday(), t(9, 30), 45));
        assert!(!booked.overlaps(monday(), t(11, 0), 45));
        assert!(!booked.overlaps(monday(), t(9, 0), 60));
    }

    #[test]
    fn test_time_off_requires_approval() {
        let pending = TimeOff { start_date: monday(), end_date: monday(), ..Default::default() };
        let approved = TimeOff { is_approved: true, ..pending.clone() };

        assert!(!pending.blocks(monday()));
        assert!(approved.blocks(monday()));
    }

    #[test]
    fn test_time_off_range_overlap_is_inclusive() {
        let off = TimeOff {
            start_date: monday(),
            end_date: monday() + Duration::days(2),
            ..Default::default()
        };

        assert!(off.overlaps_range(monday() + Duration::days(2), monday() + Duration::days(9)));
        assert!(off.overlaps_range(monday() - Duration::days(7), monday()));
        assert!(!off.overlaps_range(monday() + Duration::days(3), monday() + Duration::days(4)));
    }

    #[test]
    fn test_staff_update_rejects_empty_and_blank() {
        assert!(StaffMemberUpdate::default().validate().is_err());
        let blank_name = StaffMemberUpdate { last_name: Some(" ".to_string()), ..Default::default() };
        assert!(blank_name.validate().is_err());

        let deactivate = StaffMemberUpdate { is_active: Some(false), ..Default::default() };
        assert!(deactivate.validate().is_ok());
        assert_eq!(serde_json::to_value(&deactivate).unwrap(), serde_json::json!({ "is_active": false }));
    }

    #[test]
    fn test_availability_windows_checked() {
        let window = |day, start, end| AvailabilityWindow {
            day_of_week: day,
            start_time: start,
            end_time: end,
            is_available: true,
        };

        assert!(validate_availability(&[window(1, t(9, 0), t(17, 0))]).is_ok());
        assert!(validate_availability(&[window(7, t(9, 0), t(17, 0))]).is_err());
        assert!(validate_availability(&[window(2, t(17, 0), t(9, 0))]).is_err());
    }

    #[test]
    fn test_service_link_row_shape() {
        let link: StaffServiceLink = serde_json::from_str(
            r#"{"staff_id": "4c1a5c52-1b2f-4a3e-9d64-0c4a2f3b5e61",
                "service_id": "9d1a5c52-1b2f-4a3e-9d64-0c4a2f3b5e61",
                "is_certified": true, "certification_date": "2024-01-15",
                "certification_expiry": null}"#,
        ).unwrap();

        assert!(link.assignment.is_certified);
        assert_eq!(link.assignment.certification_date, NaiveDate::from_ymd_opt(2024, 1, 15));
    }
}
