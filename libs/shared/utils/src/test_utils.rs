use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub scheduler_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            scheduler_base_url: "http://localhost:54322".to_string(),
        }
    }
}

impl TestConfig {
    /// Point both the store and the scheduler at a mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            scheduler_base_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            scheduler_base_url: self.scheduler_base_url.clone(),
            scheduler_user_id: "test-scheduler-user".to_string(),
            scheduler_api_key: "test-scheduler-key".to_string(),
            confirmation_code_prefix: "SWC-".to_string(),
            booking_horizon_months: 3,
            booking_success_reset_secs: 5,
            booking_session_ttl_secs: 1800,
            booking_submission_timeout_secs: 30,
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "authenticated".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "authenticated")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows shaped like the clinic's tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    /// A row as returned by the `get_available_staff` function.
    pub fn available_staff_row(
        staff_id: &str,
        first_name: &str,
        last_name: &str,
        gender: &str,
    ) -> serde_json::Value {
        json!({
            "staff_id": staff_id,
            "first_name": first_name,
            "last_name": last_name,
            "role": "nurse_practitioner",
            "gender": gender,
            "specializations": ["IV Therapy"]
        })
    }

    /// A `services` row with its embedded gender policy.
    pub fn service_policy_row(
        service_name: &str,
        gender_preference: &str,
        is_strict: bool,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "name": service_name,
            "duration_minutes": 60,
            "service_gender_preferences": [{
                "gender_preference": gender_preference,
                "is_strict": is_strict,
                "notes": null
            }]
        })
    }

    pub fn staff_row(staff_id: &str, first_name: &str, last_name: &str, gender: &str) -> serde_json::Value {
        json!({
            "id": staff_id,
            "first_name": first_name,
            "last_name": last_name,
            "role": "nurse",
            "gender": gender,
            "specializations": [],
            "is_active": true,
            "staff_services": [{
                "service_id": Uuid::new_v4(),
                "is_certified": true,
                "services": { "id": Uuid::new_v4(), "name": "IV Therapy", "duration_minutes": 45 }
            }],
            "staff_availability": [{
                "day_of_week": 1,
                "start_time": "09:00:00",
                "end_time": "17:00:00",
                "is_available": true
            }]
        })
    }

    pub fn appointment_row(
        appointment_id: &str,
        user_id: &str,
        date: &str,
        time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "user_id": user_id,
            "service_type": "IV Therapy",
            "appointment_date": date,
            "appointment_time": time,
            "datetime": format!("{}T{}:00", date, time),
            "first_name": "Test",
            "last_name": "Patient",
            "email": "test@example.com",
            "phone": "555-0100",
            "message": null,
            "status": status,
            "confirmation_code": "SWC-TEST01",
            "assigned_staff_id": null,
            "staff_gender_preference": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "cancelled_at": null,
            "cancellation_reason": null
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }

    /// What PostgREST sends when an insert reuses a confirmation code.
    pub fn duplicate_confirmation_code(code: &str) -> serde_json::Value {
        json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_confirmation_code_key\"",
            "details": format!("Key (confirmation_code)=({}) already exists.", code),
            "hint": null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert!(app_config.is_scheduler_configured());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::patient("patient@example.com");
        assert_eq!(user.email, "patient@example.com");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
