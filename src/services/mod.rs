pub mod backup_codes;
pub mod cipher;
pub mod qr;
pub mod totp;
pub mod two_factor;

pub use cipher::SecretCipher;
pub use qr::QrRenderer;
pub use two_factor::{SetupResult, TwoFactorService, TwoFactorStatus};
