// libs/staff-cell/src/services/matching.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, warn, error};

use scheduling_cell::services::ServiceCatalog;
use shared_models::error::AppError;

use crate::models::{
    EligibleStaffQuery, GenderPreferencePolicy, PatientGenderPreference, StaffCandidate,
    StaffMatch,
};
use crate::services::directory::StaffDirectory;

pub struct StaffMatcher {
    directory: Arc<dyn StaffDirectory>,
    catalog: ServiceCatalog,
}

impl StaffMatcher {
    pub fn new(directory: Arc<dyn StaffDirectory>) -> Self {
        Self {
            directory,
            catalog: ServiceCatalog::new(),
        }
    }

    pub fn directory(&self) -> &Arc<dyn StaffDirectory> {
        &self.directory
    }

    /// Staff who can take the slot, narrowed by the service's gender rule and
    /// the patient's preference.
    pub async fn find_available_staff(
        &self,
        service_name: &str,
        date: NaiveDate,
        time: NaiveTime,
        patient_preference: Option<PatientGenderPreference>,
    ) -> Result<StaffMatch, AppError> {
        debug!("Finding available staff for {} on {} at {} (preference: {:?})",
               service_name, date, time, patient_preference);

        let service = self.catalog.lookup(service_name)
            .ok_or_else(|| AppError::NotFound(format!("Unknown service: {}", service_name)))?;

        let policy = self.directory.gender_policy(service.name).await
            .map_err(|e| {
                error!("Gender policy lookup failed for {}: {}", service.name, e);
                AppError::Upstream("Availability lookup failed".to_string())
            })?
            .unwrap_or_default();

        // Gender filtering happens below so a strict rule always wins over the
        // patient's choice.
        let query = EligibleStaffQuery {
            service_name: service.name.to_string(),
            appointment_date: date,
            appointment_time: time,
            duration_minutes: service.duration_minutes,
            gender_preference: None,
        };

        let candidates = self.directory.eligible_staff(&query).await
            .map_err(|e| {
                error!("Eligible staff lookup failed for {} on {} at {}: {}", service.name, date, time, e);
                AppError::Upstream("Availability lookup failed".to_string())
            })?;

        let result = apply_gender_policy(candidates, &policy, patient_preference);

        if result.soft_filter_exhausted {
            warn!("No {:?} providers for {} on {} at {}",
                  result.applied_gender, service.name, date, time);
        }

        info!("Found {} eligible staff for {} on {} at {} (prompt required: {})",
              result.staff.len(), service.name, date, time, result.preference_prompt_required);

        Ok(result)
    }
}

/// Narrow an eligible list by the service policy and the patient's preference.
///
/// A strict male-only/female-only rule is a hard filter and ignores the
/// patient. A `patient_choice` service with no answer yet returns everyone and
/// asks for a prompt. Otherwise a male/female preference is a soft filter.
pub fn apply_gender_policy(
    mut candidates: Vec<StaffCandidate>,
    policy: &GenderPreferencePolicy,
    patient_preference: Option<PatientGenderPreference>,
) -> StaffMatch {
    candidates.sort_by(|a, b| {
        a.last_name.cmp(&b.last_name)
            .then_with(|| a.first_name.cmp(&b.first_name))
            .then_with(|| a.staff_id.cmp(&b.staff_id))
    });

    let preference_prompt_required = policy.asks_patient() && patient_preference.is_none();

    let (applied_gender, soft) = match policy.required_gender() {
        Some(required) => (Some(required), false),
        None if preference_prompt_required => (None, false),
        None => (patient_preference.and_then(|p| p.as_gender()), true),
    };

    let staff: Vec<StaffCandidate> = match applied_gender {
        Some(gender) => candidates.into_iter().filter(|c| c.gender == gender).collect(),
        None => candidates,
    };

    let soft_filter_exhausted = soft && applied_gender.is_some() && staff.is_empty();

    StaffMatch {
        staff,
        policy: policy.clone(),
        preference_prompt_required,
        applied_gender,
        soft_filter_exhausted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenderPreferenceMode, StaffGender, StaffRole};
    use uuid::Uuid;

    fn candidate(first: &str, last: &str, gender: StaffGender) -> StaffCandidate {
        StaffCandidate {
            staff_id: Uuid::new_v4(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            role: StaffRole::Nurse,
            gender,
            specializations: vec![],
        }
    }

    fn roster() -> Vec<StaffCandidate> {
        vec![
            candidate("Maria", "Santos", StaffGender::Female),
            candidate("David", "Kim", StaffGender::Male),
            candidate("Alex", "Rivera", StaffGender::Unspecified),
            candidate("Emily", "Chen", StaffGender::Female),
        ]
    }

    #[test]
    fn test_any_policy_keeps_everyone_sorted() {
        let result = apply_gender_policy(roster(), &GenderPreferencePolicy::default(), None);

        let names: Vec<_> = result.staff.iter().map(|c| c.last_name.as_str()).collect();
        assert_eq!(names, vec!["Chen", "Kim", "Rivera", "Santos"]);
        assert!(!result.preference_prompt_required);
        assert_eq!(result.applied_gender, None);
    }

    #[test]
    fn test_strict_policy_overrides_patient() {
        let policy = GenderPreferencePolicy::new(GenderPreferenceMode::FemaleOnly, true);

        for preference in [
            None,
            Some(PatientGenderPreference::Male),
            Some(PatientGenderPreference::Female),
            Some(PatientGenderPreference::NoPreference),
        ] {
            let result = apply_gender_policy(roster(), &policy, preference);
            assert_eq!(result.staff.len(), 2);
            assert!(result.staff.iter().all(|c| c.gender == StaffGender::Female));
            assert!(!result.soft_filter_exhausted);
        }
    }

    #[test]
    fn test_non_strict_mode_is_not_a_filter() {
        let policy = GenderPreferencePolicy::new(GenderPreferenceMode::MaleOnly, false);
        let result = apply_gender_policy(roster(), &policy, None);

        assert_eq!(result.staff.len(), 4);
    }

    #[test]
    fn test_patient_choice_without_answer_prompts() {
        let policy = GenderPreferencePolicy::new(GenderPreferenceMode::PatientChoice, false);
        let result = apply_gender_policy(roster(), &policy, None);

        assert!(result.preference_prompt_required);
        assert_eq!(result.staff.len(), 4);
    }

    #[test]
    fn test_patient_choice_with_answer_filters() {
        let policy = GenderPreferencePolicy::new(GenderPreferenceMode::PatientChoice, false);
        let result = apply_gender_policy(roster(), &policy, Some(PatientGenderPreference::Male));

        assert!(!result.preference_prompt_required);
        assert_eq!(result.applied_gender, Some(StaffGender::Male));
        assert_eq!(result.staff.len(), 1);
        assert_eq!(result.staff[0].last_name, "Kim");
    }

    #[test]
    fn test_no_preference_keeps_everyone() {
        let policy = GenderPreferencePolicy::new(GenderPreferenceMode::PatientChoice, false);
        let result = apply_gender_policy(roster(), &policy, Some(PatientGenderPreference::NoPreference));

        assert!(!result.preference_prompt_required);
        assert_eq!(result.staff.len(), 4);
    }

    #[test]
    fn test_soft_filter_exhausted() {
        let only_women = vec![candidate("Maria", "Santos", StaffGender::Female)];
        let result = apply_gender_policy(
            only_women,
            &GenderPreferencePolicy::default(),
            Some(PatientGenderPreference::Male),
        );

        assert!(result.staff.is_empty());
        assert!(result.soft_filter_exhausted);
    }
}
