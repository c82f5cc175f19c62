use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{SecondFactorRecord, SecondFactorState};
use crate::repositories::SecondFactorStore;
use crate::services::backup_codes::{generate_backup_codes, hash_backup_code};
use crate::services::{QrRenderer, SecretCipher, totp};

/// 2FA設定開始時の返却値
///
/// シークレットとバックアップコードを平文で返すのはこの時だけ
#[derive(Debug, Serialize)]
pub struct SetupResult {
    pub secret: String,
    pub otpauth_uri: String,
    pub qr_code_url: String,
    pub backup_codes: Vec<String>,
}

/// 2FAの状態
#[derive(Debug, Serialize)]
pub struct TwoFactorStatus {
    pub state: SecondFactorState,
    pub backup_codes_remaining: usize,
}

/// 二要素認証のライフサイクル管理
///
/// 状態遷移: 未設定 → 未確認 → 有効 → 未設定（無効化でレコード削除）
///
/// # Security
/// - 誤ったコードはエラーではなく `false` / `None` で返す
/// - シークレット・コードはログ出力禁止
#[derive(Clone)]
pub struct TwoFactorService {
    store: Arc<dyn SecondFactorStore>,
    cipher: SecretCipher,
    qr_renderer: QrRenderer,
    issuer: String,
    backup_code_count: usize,
    /// 未設定・未確認ユーザーの検証で使う使い捨てシークレット（暗号化済み）
    decoy_secret_encrypted: Arc<[u8]>,
}

impl TwoFactorService {
    pub fn new(
        store: Arc<dyn SecondFactorStore>,
        cipher: SecretCipher,
        qr_renderer: QrRenderer,
        issuer: String,
        backup_code_count: usize,
    ) -> Result<Self, AppError> {
        let decoy_secret_encrypted = cipher.encrypt(&totp::generate_secret())?.into();

        Ok(Self {
            store,
            cipher,
            qr_renderer,
            issuer,
            backup_code_count,
            decoy_secret_encrypted,
        })
    }

    /// 2FA設定を開始
    ///
    /// 未確認のレコードがあれば置き換える。有効化済みの場合は先に無効化が必要
    pub async fn setup(&self, user_id: Uuid, email: &str) -> Result<SetupResult, AppError> {
        let secret = totp::generate_secret();
        let backup_codes = generate_backup_codes(self.backup_code_count);
        let hashes = hash_all(&backup_codes);

        let encrypted = self.cipher.encrypt(&secret)?;
        if !self.store.put_pending(user_id, &encrypted, &hashes).await? {
            tracing::warn!(user_id = %user_id, "2FA設定開始: 既に有効");
            return Err(AppError::AlreadyEnabled);
        }

        let otpauth_uri = totp::provisioning_uri(&self.issuer, email, &secret);
        let qr_code_url = self.qr_renderer.render(&otpauth_uri);

        tracing::info!(user_id = %user_id, "2FA設定開始");

        Ok(SetupResult {
            secret,
            otpauth_uri,
            qr_code_url,
            backup_codes,
        })
    }

    /// 初回コード検証で2FAを有効化
    pub async fn activate(&self, user_id: Uuid, code: &str) -> Result<bool, AppError> {
        let record = self
            .store
            .get(user_id)
            .await?
            .ok_or(AppError::NotConfigured)?;

        if record.enabled {
            return Err(AppError::AlreadyEnabled);
        }

        if !self.verify_time_code(&record, code)? {
            tracing::warn!(user_id = %user_id, "2FA有効化: コード不一致");
            return Ok(false);
        }

        // 検証の間に他のリクエストが有効化・削除した場合
        if !self.store.enable(user_id).await? {
            return match self.store.get(user_id).await? {
                Some(current) if current.enabled => Err(AppError::AlreadyEnabled),
                _ => Err(AppError::NotConfigured),
            };
        }

        tracing::info!(user_id = %user_id, "2FA有効化完了");
        Ok(true)
    }

    /// 2FAを無効化（レコード削除）
    pub async fn deactivate(&self, user_id: Uuid, code: &str) -> Result<bool, AppError> {
        let record = self.active_record(user_id).await?;

        if !self.verify_time_code(&record, code)? {
            tracing::warn!(user_id = %user_id, "2FA無効化: コード不一致");
            return Ok(false);
        }

        // 他のリクエストが先に削除した場合
        if !self.store.delete(user_id).await? {
            return Err(AppError::NotEnabled);
        }

        tracing::info!(user_id = %user_id, "2FA無効化完了");
        Ok(true)
    }

    /// サインイン時の2FA検証
    ///
    /// 未設定・未確認のユーザーはエラーではなく `false`。
    /// TOTPコードが一致しなければバックアップコードとして照合し、一致したものは消費する
    ///
    /// # Security
    /// 未設定・未確認でも使い捨てシークレットで復号・照合・消費クエリまで同じ手順を踏み、
    /// 応答時間から2FAの有無を推測できないようにする
    pub async fn verify_at_sign_in(&self, user_id: Uuid, code: &str) -> Result<bool, AppError> {
        let record = self.store.get(user_id).await?.filter(|r| r.enabled);
        let secret_encrypted = record
            .as_ref()
            .map_or(&*self.decoy_secret_encrypted, |r| r.secret_encrypted.as_slice());

        let time_code_matched = self.verify_encrypted(secret_encrypted, code)?;
        if time_code_matched && record.is_some() {
            tracing::info!(user_id = %user_id, "2FA検証成功");
            return Ok(true);
        }

        // ストア側で有効なレコードに限定されるため、未設定・未確認なら何も消費されない
        if self
            .store
            .remove_backup_code(user_id, &hash_backup_code(code))
            .await?
        {
            tracing::info!(
                user_id = %user_id,
                remaining = record.map_or(0, |r| r.backup_codes.len().saturating_sub(1)),
                "2FA検証成功（バックアップコード使用）"
            );
            return Ok(true);
        }

        tracing::warn!(user_id = %user_id, "2FA検証失敗");
        Ok(false)
    }

    /// バックアップコードを再発行
    ///
    /// TOTPコードのみ受け付ける（バックアップコードでの再発行は不可）
    pub async fn regenerate_backup_codes(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<Vec<String>>, AppError> {
        let record = self.active_record(user_id).await?;

        if !self.verify_time_code(&record, code)? {
            tracing::warn!(user_id = %user_id, "バックアップコード再発行: コード不一致");
            return Ok(None);
        }

        let backup_codes = generate_backup_codes(self.backup_code_count);
        if !self
            .store
            .replace_backup_codes(user_id, &hash_all(&backup_codes))
            .await?
        {
            return Err(AppError::NotEnabled);
        }

        tracing::info!(user_id = %user_id, count = backup_codes.len(), "バックアップコード再発行");
        Ok(Some(backup_codes))
    }

    /// 2FAが有効かどうか
    pub async fn is_enabled(&self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .store
            .get(user_id)
            .await?
            .is_some_and(|record| record.enabled))
    }

    pub async fn status(&self, user_id: Uuid) -> Result<TwoFactorStatus, AppError> {
        let record = self.store.get(user_id).await?;
        Ok(TwoFactorStatus {
            state: SecondFactorState::of(record.as_ref()),
            backup_codes_remaining: record
                .filter(|r| r.enabled)
                .map_or(0, |r| r.backup_codes.len()),
        })
    }

    async fn active_record(&self, user_id: Uuid) -> Result<SecondFactorRecord, AppError> {
        self.store
            .get(user_id)
            .await?
            .filter(|record| record.enabled)
            .ok_or(AppError::NotEnabled)
    }

    fn verify_time_code(&self, record: &SecondFactorRecord, code: &str) -> Result<bool, AppError> {
        self.verify_encrypted(&record.secret_encrypted, code)
    }

    fn verify_encrypted(&self, secret_encrypted: &[u8], code: &str) -> Result<bool, AppError> {
        let secret = self.cipher.decrypt(secret_encrypted)?;
        totp::verify(&secret, code)
    }
}

fn hash_all(codes: &[String]) -> Vec<String> {
    codes.iter().map(|c| hash_backup_code(c)).collect()
}
