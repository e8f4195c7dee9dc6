// libs/staff-cell/src/services/directory.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{
    AvailabilityWindow, EligibleStaffQuery, GenderPreferencePolicy, NewStaffMember, ServiceAssignment,
    ServiceGenderPolicy, StaffCandidate, StaffMember, StaffMemberUpdate, StaffSchedule, StaffServiceLink,
    TimeOff, TimeOffRequest,
};

/// Where staff, their schedules and the per-service gender rules live.
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    /// Staff who are active, certified for the service, scheduled to work over
    /// `[time, time + duration)`, not on approved time off that day, and not
    /// already booked in that range.
    async fn eligible_staff(&self, query: &EligibleStaffQuery) -> Result<Vec<StaffCandidate>>;

    /// `None` when no rule is stored for the service.
    async fn gender_policy(&self, service_name: &str) -> Result<Option<GenderPreferencePolicy>>;

    /// Active staff ordered by last name.
    async fn all_active_staff(&self) -> Result<Vec<StaffMember>>;

    async fn staff_by_id(&self, staff_id: Uuid) -> Result<Option<StaffMember>>;

    async fn service_gender_policies(&self) -> Result<Vec<ServiceGenderPolicy>>;
}

/// Roster maintenance. Writes carry the caller's token so the store's
/// row-level policies decide who may make them.
#[async_trait]
pub trait StaffAdministration: Send + Sync {
    async fn create_staff(&self, member: NewStaffMember, auth_token: Option<&str>) -> Result<StaffMember>;

    /// `None` when no such staff member exists.
    async fn update_staff(&self, staff_id: Uuid, update: &StaffMemberUpdate, auth_token: Option<&str>)
                          -> Result<Option<StaffMember>>;

    async fn assign_service(&self, staff_id: Uuid, assignment: &ServiceAssignment, auth_token: Option<&str>)
                            -> Result<StaffServiceLink>;

    /// False when the staff member was not linked to the service.
    async fn remove_service(&self, staff_id: Uuid, service_id: Uuid, auth_token: Option<&str>) -> Result<bool>;

    /// Replace the weekly hours with `windows`.
    async fn set_availability(&self, staff_id: Uuid, windows: &[AvailabilityWindow], auth_token: Option<&str>)
                              -> Result<Vec<AvailabilityWindow>>;

    /// Recorded unapproved.
    async fn request_time_off(&self, staff_id: Uuid, request: TimeOffRequest, auth_token: Option<&str>)
                              -> Result<TimeOff>;

    /// `None` when the request does not exist.
    async fn approve_time_off(&self, time_off_id: Uuid, approver_id: &str, auth_token: Option<&str>)
                              -> Result<Option<TimeOff>>;

    async fn staff_schedule(&self, staff_id: Uuid, start_date: NaiveDate, end_date: NaiveDate,
                            auth_token: Option<&str>) -> Result<StaffSchedule>;

    /// Create or replace the rule for one service.
    async fn upsert_gender_policy(&self, service_id: Uuid, policy: &GenderPreferencePolicy,
                                  auth_token: Option<&str>) -> Result<GenderPreferencePolicy>;
}
