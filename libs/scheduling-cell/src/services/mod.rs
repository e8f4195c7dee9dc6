pub mod calendar;
pub mod catalog;
pub mod gateway;

pub use calendar::{clinic_now, clinic_today, BookingCalendar};
pub use catalog::ServiceCatalog;
pub use gateway::{AvailabilityGateway, SlotProvider};
