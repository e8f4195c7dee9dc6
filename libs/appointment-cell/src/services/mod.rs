pub mod code;
pub mod memory;
pub mod repository;
pub mod store;
pub mod supabase;

pub use code::ConfirmationCodeGenerator;
pub use memory::InMemoryAppointmentRepository;
pub use repository::AppointmentRepository;
pub use store::AppointmentStore;
pub use supabase::SupabaseAppointmentRepository;
