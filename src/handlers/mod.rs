pub mod health;
pub mod two_factor;

pub use health::health_check;
pub use two_factor::{
    activate_2fa, deactivate_2fa, regenerate_backup_codes, setup_2fa, status_2fa, verify_2fa,
};
