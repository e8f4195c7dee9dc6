use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_SCHEDULER_BASE_URL: &str = "https://acuityscheduling.com/api/v1";
pub const DEFAULT_CONFIRMATION_CODE_PREFIX: &str = "SWC-";
pub const DEFAULT_BOOKING_HORIZON_MONTHS: u32 = 3;
pub const DEFAULT_BOOKING_SUCCESS_RESET_SECS: u64 = 5;
pub const DEFAULT_BOOKING_SESSION_TTL_SECS: u64 = 1800;
pub const DEFAULT_BOOKING_SUBMISSION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub scheduler_base_url: String,
    pub scheduler_user_id: String,
    pub scheduler_api_key: String,
    pub confirmation_code_prefix: String,
    pub booking_horizon_months: u32,
    pub booking_success_reset_secs: u64,
    /// Idle booking sessions older than this are dropped.
    pub booking_session_ttl_secs: u64,
    pub booking_submission_timeout_secs: u64,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            scheduler_base_url: env::var("SCHEDULER_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SCHEDULER_BASE_URL not set, using default");
                    DEFAULT_SCHEDULER_BASE_URL.to_string()
                }),
            scheduler_user_id: env::var("SCHEDULER_USER_ID")
                .unwrap_or_else(|_| {
                    warn!("SCHEDULER_USER_ID not set, using empty value");
                    String::new()
                }),
            scheduler_api_key: env::var("SCHEDULER_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("SCHEDULER_API_KEY not set, using empty value");
                    String::new()
                }),
            confirmation_code_prefix: env::var("CONFIRMATION_CODE_PREFIX")
                .unwrap_or_else(|_| DEFAULT_CONFIRMATION_CODE_PREFIX.to_string()),
            booking_horizon_months: parse_or_default(
                "BOOKING_HORIZON_MONTHS",
                DEFAULT_BOOKING_HORIZON_MONTHS,
            ),
            booking_success_reset_secs: parse_or_default(
                "BOOKING_SUCCESS_RESET_SECS",
                DEFAULT_BOOKING_SUCCESS_RESET_SECS,
            ),
            booking_session_ttl_secs: parse_or_default(
                "BOOKING_SESSION_TTL_SECS",
                DEFAULT_BOOKING_SESSION_TTL_SECS,
            ),
            booking_submission_timeout_secs: parse_or_default(
                "BOOKING_SUBMISSION_TIMEOUT_SECS",
                DEFAULT_BOOKING_SUBMISSION_TIMEOUT_SECS,
            ),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if !config.is_scheduler_configured() {
            warn!("Scheduler credentials missing - availability lookups will return no slots");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_scheduler_configured(&self) -> bool {
        !self.scheduler_base_url.is_empty()
            && !self.scheduler_user_id.is_empty()
            && !self.scheduler_api_key.is_empty()
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
