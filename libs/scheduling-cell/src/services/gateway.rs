// libs/scheduling-cell/src/services/gateway.rs
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::Client;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_models::time_format::parse_slot_time;

use crate::models::{SchedulerSlot, Service, Slot, SlotLookup};
use crate::services::catalog::ServiceCatalog;

/// Anything that can answer "which times are free for this service on this day".
///
/// Failures never surface as `Err`: they come back as an empty lookup with the
/// error message attached, and callers show "no times available".
#[async_trait]
pub trait SlotProvider: Send + Sync {
    async fn list_available_slots(&self, date: NaiveDate, service_name: &str) -> SlotLookup;
}

/// Queries the external scheduler over HTTP with basic credentials. No caching.
pub struct AvailabilityGateway {
    client: Client,
    base_url: String,
    user_id: String,
    api_key: String,
    catalog: ServiceCatalog,
}

impl AvailabilityGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.scheduler_base_url.trim_end_matches('/').to_string(),
            user_id: config.scheduler_user_id.clone(),
            api_key: config.scheduler_api_key.clone(),
            catalog: ServiceCatalog::new(),
        }
    }

    async fn fetch_slots(&self, date: NaiveDate, service: &Service) -> Result<Vec<Slot>> {
        if self.base_url.is_empty() || self.user_id.is_empty() || self.api_key.is_empty() {
            return Err(anyhow!("Scheduler credentials are not configured"));
        }

        let url = format!("{}/availability/times", self.base_url);
        debug!("Fetching available times from {} for {} ({})", url, date, service.name);

        let response = self.client
            .get(&url)
            .basic_auth(&self.user_id, Some(&self.api_key))
            .query(&[
                ("date", date.format("%Y-%m-%d").to_string()),
                ("appointmentTypeID", service.external_id.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Scheduler returned {}: {}", status, body));
        }

        let raw: Vec<SchedulerSlot> = response.json().await?;
        let mut slots = raw
            .into_iter()
            .map(to_slot)
            .collect::<Result<Vec<Slot>>>()?;

        slots.sort_by_key(|slot| slot.datetime);
        slots.dedup_by_key(|slot| slot.datetime);

        Ok(slots)
    }
}

fn to_slot(raw: SchedulerSlot) -> Result<Slot> {
    let datetime = NaiveDateTime::parse_from_str(&raw.datetime, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| DateTime::parse_from_str(&raw.datetime, "%Y-%m-%dT%H:%M:%S%z").map(|dt| dt.naive_local()))
        .map_err(|e| anyhow!("Unparseable slot datetime '{}': {}", raw.datetime, e))?;

    let time = match raw.time.as_deref() {
        Some(t) => parse_slot_time(t).ok_or_else(|| anyhow!("Unparseable slot time '{}'", t))?,
        None => datetime.time(),
    };

    Ok(Slot { time, datetime })
}

#[async_trait]
impl SlotProvider for AvailabilityGateway {
    async fn list_available_slots(&self, date: NaiveDate, service_name: &str) -> SlotLookup {
        let Some(service) = self.catalog.lookup(service_name) else {
            warn!("Availability requested for unknown service '{}'", service_name);
            return SlotLookup::failed(date, service_name, format!("Unknown service: {}", service_name));
        };

        match self.fetch_slots(date, service).await {
            Ok(slots) => {
                info!("Scheduler reported {} slots for {} on {}", slots.len(), service.name, date);
                SlotLookup::found(date, service.name, slots)
            }
            Err(e) => {
                warn!("Error fetching available times for {} on {}: {}", service.name, date, e);
                SlotLookup::failed(date, service.name, "Unable to load available times. Please try again.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn test_to_slot_local_datetime() {
        let slot = to_slot(SchedulerSlot {
            time: Some("09:30".to_string()),
            datetime: "2024-06-03T09:30:00".to_string(),
        })
        .unwrap();

        assert_eq!(slot.time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }

    #[test]
    fn test_to_slot_offset_datetime_without_time() {
        let slot = to_slot(SchedulerSlot {
            time: None,
            datetime: "2024-06-03T14:00:00-0700".to_string(),
        })
        .unwrap();

        assert_eq!(slot.time, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert_eq!(slot.datetime.to_string(), "2024-06-03 14:00:00");
    }

    #[test]
    fn test_to_slot_rejects_garbage() {
        assert!(to_slot(SchedulerSlot { time: None, datetime: "tomorrow".to_string() }).is_err());
    }
}
