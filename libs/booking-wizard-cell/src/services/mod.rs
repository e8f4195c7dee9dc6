pub mod sequencer;
pub mod sessions;
pub mod wizard;

pub use sequencer::RequestSequencer;
pub use sessions::{BookingSessions, WizardServices};
pub use wizard::BookingWizard;
