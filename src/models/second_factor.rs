use std::fmt;

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ユーザーの二要素認証レコード（1ユーザー1件）
///
/// シークレットは AES-256-GCM で暗号化されて保存される。
/// バックアップコードは SHA256 ハッシュのみ保存し、平文は保持しない。
/// 平文シークレット・コードはログに出力禁止
#[derive(Clone, FromRow, Serialize)]
pub struct SecondFactorRecord {
    pub user_id: Uuid,
    #[serde(skip)]
    pub secret_encrypted: Vec<u8>,
    #[serde(skip)]
    pub backup_codes: Vec<String>,
    pub enabled: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

// 暗号文・ハッシュは Debug 出力に含めない
impl fmt::Debug for SecondFactorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondFactorRecord")
            .field("user_id", &self.user_id)
            .field("secret_encrypted", &"[REDACTED]")
            .field("backup_codes", &format_args!("[{} redacted]", self.backup_codes.len()))
            .field("enabled", &self.enabled)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// 二要素認証の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondFactorState {
    /// 未設定
    Absent,
    /// 設定開始済み・未確認
    Pending,
    /// 有効
    Active,
}

impl SecondFactorState {
    pub fn of(record: Option<&SecondFactorRecord>) -> Self {
        match record {
            None => Self::Absent,
            Some(r) if r.enabled => Self::Active,
            Some(_) => Self::Pending,
        }
    }
}
