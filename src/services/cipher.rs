use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::error::AppError;

const NONCE_LEN: usize = 12;

/// 共有シークレットの保存時暗号化（AES-256-GCM）
///
/// 保存形式は `nonce (12バイト) || 暗号文 || tag (16バイト)`。
/// 復号に失敗した場合は改ざんまたはキー不一致として内部エラーにする
#[derive(Clone)]
pub struct SecretCipher {
    aead: Aes256Gcm,
}

impl SecretCipher {
    /// `ENCRYPTION_KEY`（Base64、32バイト）から作成
    pub fn from_base64(key_base64: &str) -> Result<Self, AppError> {
        let key = STANDARD
            .decode(key_base64)
            .map_err(|e| key_error(format!("base64 decode failed: {e}")))?;

        let aead = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| key_error(format!("expected 32 bytes, got {}", key.len())))?;

        Ok(Self { aead })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, AppError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .aead
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| AppError::Internal(anyhow::anyhow!("secret sealing failed")))?;

        Ok([nonce.as_slice(), sealed.as_slice()].concat())
    }

    pub fn decrypt(&self, stored: &[u8]) -> Result<String, AppError> {
        let (nonce, sealed) = stored
            .split_at_checked(NONCE_LEN)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("stored secret is truncated")))?;

        let opened = self
            .aead
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| {
                tracing::error!(len = stored.len(), "保存済みシークレットを復号できない");
                AppError::Internal(anyhow::anyhow!("secret opening failed"))
            })?;

        String::from_utf8(opened)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("opened secret is not utf-8")))
    }
}

fn key_error(detail: String) -> AppError {
    tracing::error!(detail = %detail, "ENCRYPTION_KEY が不正");
    AppError::Internal(anyhow::anyhow!("invalid ENCRYPTION_KEY: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> SecretCipher {
        SecretCipher::from_base64(&STANDARD.encode([7u8; 32])).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt("JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP").unwrap();
        // 12バイトnonce + 32バイト平文 + 16バイトtag
        assert_eq!(encrypted.len(), 12 + 32 + 16);
        assert_eq!(
            cipher.decrypt(&encrypted).unwrap(),
            "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP"
        );
    }

    #[test]
    fn test_nonce_is_random() {
        let cipher = test_cipher();
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(&a[..NONCE_LEN], &b[..NONCE_LEN]);
    }

    #[test]
    fn test_decrypt_tampered() {
        let cipher = test_cipher();
        let mut encrypted = cipher.encrypt("secret").unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0xff;
        assert!(cipher.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_decrypt_with_other_key() {
        let encrypted = test_cipher().encrypt("secret").unwrap();
        let other = SecretCipher::from_base64(&STANDARD.encode([8u8; 32])).unwrap();
        assert!(other.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_decrypt_truncated() {
        assert!(test_cipher().decrypt(&[0u8; 4]).is_err());
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = STANDARD.encode([0u8; 16]);
        assert!(SecretCipher::from_base64(&short_key).is_err());
    }

    #[test]
    fn test_invalid_base64() {
        assert!(SecretCipher::from_base64("not-valid-base64!!!").is_err());
    }
}
