pub mod memory;
pub mod second_factor;

pub use memory::MemorySecondFactorStore;
pub use second_factor::{PgSecondFactorStore, SecondFactorStore};
