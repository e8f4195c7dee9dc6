// libs/scheduling-cell/src/services/catalog.rs
use crate::models::Service;

const SERVICES: [Service; 9] = [
    Service { name: "Medical Weight Loss", external_id: 1, duration_minutes: 60 },
    Service { name: "IV Therapy", external_id: 2, duration_minutes: 45 },
    Service { name: "Anti-Aging", external_id: 3, duration_minutes: 60 },
    Service { name: "PRP Hair Restoration", external_id: 4, duration_minutes: 90 },
    Service { name: "Hormone Replacement", external_id: 5, duration_minutes: 60 },
    Service { name: "Cellulite Z Wave", external_id: 6, duration_minutes: 45 },
    Service { name: "Erectile Dysfunction", external_id: 7, duration_minutes: 60 },
    Service { name: "NAD+ Therapy", external_id: 8, duration_minutes: 120 },
    Service { name: "Other/Multiple Services", external_id: 9, duration_minutes: 60 },
];

/// The clinic's fixed list of treatments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceCatalog;

impl ServiceCatalog {
    pub fn new() -> Self {
        Self
    }

    pub fn all(&self) -> &'static [Service] {
        &SERVICES
    }

    pub fn lookup(&self, name: &str) -> Option<&'static Service> {
        let name = name.trim();
        SERVICES.iter().find(|service| service.name == name)
    }

    pub fn duration_for(&self, name: &str) -> Option<u32> {
        self.lookup(name).map(|service| service.duration_minutes)
    }
}
