// libs/staff-cell/src/services/supabase.rs
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AvailabilityWindow, EligibleStaffQuery, GenderPreferencePolicy, NewStaffMember, ScheduledAppointment,
    ServiceAssignment, ServiceGenderPolicy, StaffCandidate, StaffMember, StaffMemberUpdate, StaffSchedule,
    StaffServiceLink, TimeOff, TimeOffRequest,
};
use crate::services::directory::{StaffAdministration, StaffDirectory};

const STAFF_SELECT: &str = "*,staff_services(service_id,is_certified,services(name,duration_minutes)),\
staff_availability(day_of_week,start_time,end_time,is_available),\
staff_time_off(id,start_date,end_date,reason,is_approved,approved_by,approved_at)";

const SCHEDULED_APPOINTMENT_SELECT: &str =
    "id,assigned_staff_id,service_type,appointment_date,appointment_time,status,confirmation_code";

#[derive(Debug, Deserialize)]
struct ServicePolicyRow {
    name: String,
    #[serde(default)]
    service_gender_preferences: Vec<GenderPreferencePolicy>,
}

#[derive(Debug, Deserialize)]
struct PolicyServiceRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PolicyRow {
    #[serde(flatten)]
    policy: GenderPreferencePolicy,
    services: Option<PolicyServiceRef>,
}

fn first_row<T: DeserializeOwned>(rows: Vec<Value>, what: &str) -> Result<Option<T>> {
    match rows.into_iter().next() {
        Some(row) => serde_json::from_value(row)
            .map(Some)
            .map_err(|e| anyhow!("Failed to parse {}: {}", what, e)),
        None => Ok(None),
    }
}

fn required_row<T: DeserializeOwned>(rows: Vec<Value>, what: &str) -> Result<T> {
    first_row(rows, what)?.ok_or_else(|| anyhow!("Write returned no {} row", what))
}

/// Staff directory backed by the clinic's Supabase tables and the
/// `get_available_staff` database function.
pub struct SupabaseStaffDirectory {
    supabase: SupabaseClient,
}

impl SupabaseStaffDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl StaffDirectory for SupabaseStaffDirectory {
    async fn eligible_staff(&self, query: &EligibleStaffQuery) -> Result<Vec<StaffCandidate>> {
        debug!("Calling get_available_staff for {} on {} at {}",
               query.service_name, query.appointment_date, query.appointment_time);

        // PostgREST binds RPC arguments by name
        let args = serde_json::to_value(query)?;

        let rows: Vec<StaffCandidate> = self.supabase.rpc("get_available_staff", None, args).await?;
        Ok(rows)
    }

    async fn gender_policy(&self, service_name: &str) -> Result<Option<GenderPreferencePolicy>> {
        let path = format!(
            "/rest/v1/services?select=name,service_gender_preferences(gender_preference,is_strict,notes)&name=eq.{}",
            urlencoding::encode(service_name)
        );

        let rows: Vec<ServicePolicyRow> = self.supabase.request(Method::GET, &path, None, None).await?;

        let policy = rows
            .into_iter()
            .find(|row| row.name == service_name)
            .and_then(|row| row.service_gender_preferences.into_iter().next());

        debug!("Gender policy for {}: {:?}", service_name, policy);
        Ok(policy)
    }

    async fn all_active_staff(&self) -> Result<Vec<StaffMember>> {
        let path = format!(
            "/rest/v1/staff?select={}&is_active=eq.true&order=last_name.asc,first_name.asc",
            STAFF_SELECT
        );

        let staff: Vec<StaffMember> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(staff)
    }

    async fn staff_by_id(&self, staff_id: Uuid) -> Result<Option<StaffMember>> {
        let path = format!("/rest/v1/staff?select={}&id=eq.{}", STAFF_SELECT, staff_id);

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;

        match rows.into_iter().next() {
            Some(row) => {
                let member: StaffMember = serde_json::from_value(row)
                    .map_err(|e| anyhow!("Failed to parse staff {}: {}", staff_id, e))?;
                Ok(Some(member))
            }
            None => Ok(None),
        }
    }

    async fn service_gender_policies(&self) -> Result<Vec<ServiceGenderPolicy>> {
        let rows: Vec<PolicyRow> = self.supabase.request(
            Method::GET,
            "/rest/v1/service_gender_preferences?select=gender_preference,is_strict,notes,services(name)",
            None,
            None,
        ).await?;

        let mut policies: Vec<ServiceGenderPolicy> = rows
            .into_iter()
            .filter_map(|row| {
                row.services.map(|service| ServiceGenderPolicy {
                    service_name: service.name,
                    policy: row.policy,
                })
            })
            .collect();

        policies.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        Ok(policies)
    }
}

#[async_trait]
impl StaffAdministration for SupabaseStaffDirectory {
    async fn create_staff(&self, member: NewStaffMember, auth_token: Option<&str>) -> Result<StaffMember> {
        let body = serde_json::to_value(&member)?;
        let rows = self.supabase
            .request_returning(Method::POST, "/rest/v1/staff", auth_token, body)
            .await?;

        let created: StaffMember = required_row(rows, "staff")?;
        info!("Created staff member {} ({})", created.id, created.full_name());
        Ok(created)
    }

    async fn update_staff(&self, staff_id: Uuid, update: &StaffMemberUpdate, auth_token: Option<&str>)
                          -> Result<Option<StaffMember>> {
        let path = format!("/rest/v1/staff?id=eq.{}", staff_id);
        let rows = self.supabase
            .request_returning(Method::PATCH, &path, auth_token, serde_json::to_value(update)?)
            .await?;

        first_row(rows, "staff")
    }

    async fn assign_service(&self, staff_id: Uuid, assignment: &ServiceAssignment, auth_token: Option<&str>)
                            -> Result<StaffServiceLink> {
        let link = StaffServiceLink { staff_id, assignment: assignment.clone() };
        let rows = self.supabase
            .request_returning(Method::POST, "/rest/v1/staff_services", auth_token, serde_json::to_value(&link)?)
            .await?;

        required_row(rows, "staff_services")
    }

    async fn remove_service(&self, staff_id: Uuid, service_id: Uuid, auth_token: Option<&str>) -> Result<bool> {
        let path = format!("/rest/v1/staff_services?staff_id=eq.{}&service_id=eq.{}", staff_id, service_id);
        let removed = self.supabase.delete_returning(&path, auth_token).await?;
        Ok(!removed.is_empty())
    }

    async fn set_availability(&self, staff_id: Uuid, windows: &[AvailabilityWindow], auth_token: Option<&str>)
                              -> Result<Vec<AvailabilityWindow>> {
        let path = format!("/rest/v1/staff_availability?staff_id=eq.{}", staff_id);
        let cleared = self.supabase.delete_returning(&path, auth_token).await?;
        debug!("Cleared {} availability windows for {}", cleared.len(), staff_id);

        if windows.is_empty() {
            return Ok(vec![]);
        }

        let rows: Vec<Value> = windows
            .iter()
            .map(|window| -> Result<Value> {
                let mut row = serde_json::to_value(window)?;
                row["staff_id"] = json!(staff_id);
                Ok(row)
            })
            .collect::<Result<_>>()?;

        let inserted = self.supabase
            .request_returning(Method::POST, "/rest/v1/staff_availability", auth_token, Value::Array(rows))
            .await?;

        inserted
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| anyhow!("Failed to parse availability: {}", e)))
            .collect()
    }

    async fn request_time_off(&self, staff_id: Uuid, request: TimeOffRequest, auth_token: Option<&str>)
                              -> Result<TimeOff> {
        let body = json!({
            "staff_id": staff_id,
            "start_date": request.start_date,
            "end_date": request.end_date,
            "reason": request.reason,
        });
        let rows = self.supabase
            .request_returning(Method::POST, "/rest/v1/staff_time_off", auth_token, body)
            .await?;

        required_row(rows, "staff_time_off")
    }

    async fn approve_time_off(&self, time_off_id: Uuid, approver_id: &str, auth_token: Option<&str>)
                              -> Result<Option<TimeOff>> {
        let path = format!("/rest/v1/staff_time_off?id=eq.{}", time_off_id);
        let body = json!({
            "is_approved": true,
            "approved_by": approver_id,
            "approved_at": Utc::now(),
        });
        let rows = self.supabase.request_returning(Method::PATCH, &path, auth_token, body).await?;

        first_row(rows, "staff_time_off")
    }

    async fn staff_schedule(&self, staff_id: Uuid, start_date: NaiveDate, end_date: NaiveDate,
                            auth_token: Option<&str>) -> Result<StaffSchedule> {
        let availability_path = format!(
            "/rest/v1/staff_availability?staff_id=eq.{}&is_available=eq.true&order=day_of_week.asc,start_time.asc",
            staff_id
        );
        let time_off_path = format!(
            "/rest/v1/staff_time_off?staff_id=eq.{}&is_approved=eq.true&end_date=gte.{}&start_date=lte.{}",
            staff_id, start_date, end_date
        );
        let appointments_path = format!(
            "/rest/v1/appointments?select={}&assigned_staff_id=eq.{}&status=in.(pending,confirmed)\
&appointment_date=gte.{}&appointment_date=lte.{}&order=datetime.asc",
            SCHEDULED_APPOINTMENT_SELECT, staff_id, start_date, end_date
        );

        let (availability, time_off, appointments) = tokio::try_join!(
            self.supabase.request::<Vec<AvailabilityWindow>>(Method::GET, &availability_path, auth_token, None),
            self.supabase.request::<Vec<TimeOff>>(Method::GET, &time_off_path, auth_token, None),
            self.supabase.request::<Vec<ScheduledAppointment>>(Method::GET, &appointments_path, auth_token, None),
        )?;

        Ok(StaffSchedule { staff_id, start_date, end_date, availability, time_off, appointments })
    }

    async fn upsert_gender_policy(&self, service_id: Uuid, policy: &GenderPreferencePolicy,
                                  auth_token: Option<&str>) -> Result<GenderPreferencePolicy> {
        let body = json!({
            "service_id": service_id,
            "gender_preference": policy.mode,
            "is_strict": policy.strict,
            "notes": policy.notes,
        });
        let rows = self.supabase
            .upsert("service_gender_preferences", "service_id", auth_token, body)
            .await?;

        let stored: GenderPreferencePolicy = required_row(rows, "service_gender_preferences")?;
        info!("Gender policy for service {} set to {:?}", service_id, stored.mode);
        Ok(stored)
    }
}
