pub mod second_factor;

pub use second_factor::{SecondFactorRecord, SecondFactorState};
