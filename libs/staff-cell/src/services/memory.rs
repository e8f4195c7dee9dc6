// libs/staff-cell/src/services/memory.rs
use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{
    AvailabilityWindow, BookedInterval, EligibleStaffQuery, GenderPreferencePolicy, NewStaffMember,
    ScheduledAppointment, ServiceAssignment, ServiceGenderPolicy, ServiceRef, StaffCandidate, StaffMember,
    StaffMemberUpdate, StaffSchedule, StaffService, StaffServiceLink, TimeOff, TimeOffRequest,
};
use crate::services::directory::{StaffAdministration, StaffDirectory};

/// Directory held in memory, for local runs and tests.
#[derive(Default)]
pub struct InMemoryStaffDirectory {
    staff: RwLock<Vec<StaffMember>>,
    policies: RwLock<HashMap<String, GenderPreferencePolicy>>,
    bookings: RwLock<Vec<BookedInterval>>,
    services: RwLock<HashMap<Uuid, String>>,
    appointments: RwLock<Vec<ScheduledAppointment>>,
}

impl InMemoryStaffDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_staff(self, member: StaffMember) -> Self {
        if let Ok(mut staff) = self.staff.write() {
            staff.push(member);
        }
        self
    }

    pub fn with_policy(self, service_name: &str, policy: GenderPreferencePolicy) -> Self {
        if let Ok(mut policies) = self.policies.write() {
            policies.insert(service_name.to_string(), policy);
        }
        self
    }

    /// Make a catalog service known by id, for certification and policy writes.
    pub fn with_service(self, service_id: Uuid, name: &str) -> Self {
        if let Ok(mut services) = self.services.write() {
            services.insert(service_id, name.to_string());
        }
        self
    }

    pub fn with_appointment(self, appointment: ScheduledAppointment) -> Self {
        if let Ok(mut appointments) = self.appointments.write() {
            appointments.push(appointment);
        }
        self
    }

    pub fn with_booking(self, booking: BookedInterval) -> Self {
        self.record_booking(booking);
        self
    }

    pub fn record_booking(&self, booking: BookedInterval) {
        if let Ok(mut bookings) = self.bookings.write() {
            bookings.push(booking);
        }
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("Staff directory lock poisoned")
}

fn staff_not_found(staff_id: Uuid) -> anyhow::Error {
    AppError::NotFound(format!("Staff member {} not found", staff_id)).into()
}

impl InMemoryStaffDirectory {
    fn service_name(&self, service_id: Uuid) -> Result<String> {
        let services = self.services.read().map_err(poisoned)?;
        services
            .get(&service_id)
            .cloned()
            .ok_or_else(|| AppError::ValidationError(format!("Unknown service {}", service_id)).into())
    }

    fn with_member<T>(&self, staff_id: Uuid, edit: impl FnOnce(&mut StaffMember) -> T) -> Result<Option<T>> {
        let mut staff = self.staff.write().map_err(poisoned)?;
        Ok(staff.iter_mut().find(|m| m.id == staff_id).map(edit))
    }
}

#[async_trait]
impl StaffDirectory for InMemoryStaffDirectory {
    async fn eligible_staff(&self, query: &EligibleStaffQuery) -> Result<Vec<StaffCandidate>> {
        let staff = self.staff.read().map_err(poisoned)?;
        let bookings = self.bookings.read().map_err(poisoned)?;
        let wanted = query.gender_preference.and_then(|p| p.as_gender());

        let eligible = staff
            .iter()
            .filter(|member| member.active)
            .filter(|member| member.is_certified_for(&query.service_name))
            .filter(|member| member.works_at(query.appointment_date, query.appointment_time, query.duration_minutes))
            .filter(|member| !member.is_off_on(query.appointment_date))
            .filter(|member| {
                !bookings.iter().any(|booked| {
                    booked.staff_id == member.id
                        && booked.overlaps(query.appointment_date, query.appointment_time, query.duration_minutes)
                })
            })
            .filter(|member| wanted.map_or(true, |gender| member.gender == gender))
            .map(StaffMember::to_candidate)
            .collect();

        Ok(eligible)
    }

    async fn gender_policy(&self, service_name: &str) -> Result<Option<GenderPreferencePolicy>> {
        let policies = self.policies.read().map_err(poisoned)?;
        Ok(policies.get(service_name).cloned())
    }

    async fn all_active_staff(&self) -> Result<Vec<StaffMember>> {
        let staff = self.staff.read().map_err(poisoned)?;
        let mut active: Vec<StaffMember> = staff.iter().filter(|m| m.active).cloned().collect();
        active.sort_by(|a, b| a.last_name.cmp(&b.last_name).then_with(|| a.first_name.cmp(&b.first_name)));
        Ok(active)
    }

    async fn staff_by_id(&self, staff_id: Uuid) -> Result<Option<StaffMember>> {
        let staff = self.staff.read().map_err(poisoned)?;
        Ok(staff.iter().find(|m| m.id == staff_id).cloned())
    }

    async fn service_gender_policies(&self) -> Result<Vec<ServiceGenderPolicy>> {
        let policies = self.policies.read().map_err(poisoned)?;
        let mut all: Vec<ServiceGenderPolicy> = policies
            .iter()
            .map(|(service_name, policy)| ServiceGenderPolicy {
                service_name: service_name.clone(),
                policy: policy.clone(),
            })
            .collect();
        all.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        Ok(all)
    }
}

#[async_trait]
impl StaffAdministration for InMemoryStaffDirectory {
    async fn create_staff(&self, member: NewStaffMember, _auth_token: Option<&str>) -> Result<StaffMember> {
        let created = member.into_member(Uuid::new_v4());
        self.staff.write().map_err(poisoned)?.push(created.clone());
        Ok(created)
    }

    async fn update_staff(&self, staff_id: Uuid, update: &StaffMemberUpdate, _auth_token: Option<&str>)
                          -> Result<Option<StaffMember>> {
        self.with_member(staff_id, |member| {
            update.apply_to(member);
            member.clone()
        })
    }

    async fn assign_service(&self, staff_id: Uuid, assignment: &ServiceAssignment, _auth_token: Option<&str>)
                            -> Result<StaffServiceLink> {
        let name = self.service_name(assignment.service_id)?;

        self.with_member(staff_id, |member| {
            if member.staff_services.iter().any(|link| link.service_id == Some(assignment.service_id)) {
                return Err(AppError::Conflict(format!("Already assigned to {}", name)).into());
            }
            member.staff_services.push(StaffService {
                service_id: Some(assignment.service_id),
                is_certified: assignment.is_certified,
                services: Some(ServiceRef { name, duration_minutes: None }),
            });
            Ok(StaffServiceLink { staff_id, assignment: assignment.clone() })
        })?
        .ok_or_else(|| staff_not_found(staff_id))?
    }

    async fn remove_service(&self, staff_id: Uuid, service_id: Uuid, _auth_token: Option<&str>) -> Result<bool> {
        let removed = self.with_member(staff_id, |member| {
            let before = member.staff_services.len();
            member.staff_services.retain(|link| link.service_id != Some(service_id));
            member.staff_services.len() != before
        })?;
        Ok(removed.unwrap_or(false))
    }

    async fn set_availability(&self, staff_id: Uuid, windows: &[AvailabilityWindow], _auth_token: Option<&str>)
                              -> Result<Vec<AvailabilityWindow>> {
        self.with_member(staff_id, |member| {
            member.staff_availability = windows.to_vec();
            member.staff_availability.clone()
        })?
        .ok_or_else(|| staff_not_found(staff_id))
    }

    async fn request_time_off(&self, staff_id: Uuid, request: TimeOffRequest, _auth_token: Option<&str>)
                              -> Result<TimeOff> {
        let time_off = request.into_time_off(Uuid::new_v4());
        self.with_member(staff_id, |member| {
            member.staff_time_off.push(time_off.clone());
            time_off
        })?
        .ok_or_else(|| staff_not_found(staff_id))
    }

    async fn approve_time_off(&self, time_off_id: Uuid, approver_id: &str, _auth_token: Option<&str>)
                              -> Result<Option<TimeOff>> {
        let mut staff = self.staff.write().map_err(poisoned)?;

        let approved = staff
            .iter_mut()
            .flat_map(|member| member.staff_time_off.iter_mut())
            .find(|off| off.id == Some(time_off_id))
            .map(|off| {
                off.is_approved = true;
                off.approved_by = Some(approver_id.to_string());
                off.approved_at = Some(Utc::now());
                off.clone()
            });

        Ok(approved)
    }

    async fn staff_schedule(&self, staff_id: Uuid, start_date: NaiveDate, end_date: NaiveDate,
                            _auth_token: Option<&str>) -> Result<StaffSchedule> {
        let (availability, time_off) = {
            let staff = self.staff.read().map_err(poisoned)?;
            let member = staff.iter().find(|m| m.id == staff_id).ok_or_else(|| staff_not_found(staff_id))?;
            (
                member.staff_availability.iter().filter(|w| w.is_available).cloned().collect(),
                member.staff_time_off
                    .iter()
                    .filter(|off| off.is_approved && off.overlaps_range(start_date, end_date))
                    .cloned()
                    .collect(),
            )
        };

        let appointments = self.appointments
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|a| a.staff_id == staff_id && a.holds_slot())
            .filter(|a| start_date <= a.appointment_date && a.appointment_date <= end_date)
            .cloned()
            .collect();

        Ok(StaffSchedule { staff_id, start_date, end_date, availability, time_off, appointments })
    }

    async fn upsert_gender_policy(&self, service_id: Uuid, policy: &GenderPreferencePolicy,
                                  _auth_token: Option<&str>) -> Result<GenderPreferencePolicy> {
        let name = self.service_name(service_id)?;
        self.policies.write().map_err(poisoned)?.insert(name, policy.clone());
        Ok(policy.clone())
    }
}
