pub mod directory;
pub mod matching;
pub mod memory;
pub mod supabase;

pub use directory::{StaffAdministration, StaffDirectory};
pub use matching::{apply_gender_policy, StaffMatcher};
pub use memory::InMemoryStaffDirectory;
pub use supabase::SupabaseStaffDirectory;
