use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::AppState;

/// 呼び出し元サービスが付与する認証ヘッダー
pub const SERVICE_KEY_HEADER: &str = "x-service-key";

const MIN_SERVICE_KEY_LEN: usize = 16;

/// 内部サービス認証キー
///
/// 平文は保持せず SHA256 ダイジェストのみ保持し、定数時間で比較する
#[derive(Clone)]
pub struct ServiceKey {
    digest: [u8; 32],
}

impl ServiceKey {
    pub fn new(key: &str) -> Result<Self, AppError> {
        if key.len() < MIN_SERVICE_KEY_LEN {
            tracing::error!(
                min = MIN_SERVICE_KEY_LEN,
                actual = key.len(),
                "SERVICE_API_KEY が短すぎる"
            );
            return Err(AppError::Internal(anyhow::anyhow!(
                "service api key must be at least {} bytes",
                MIN_SERVICE_KEY_LEN
            )));
        }

        Ok(Self {
            digest: Sha256::digest(key.as_bytes()).into(),
        })
    }

    pub fn matches(&self, presented: &str) -> bool {
        let presented: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
        presented.as_slice().ct_eq(self.digest.as_slice()).into()
    }
}

/// `/api/2fa/*` 用ミドルウェア
///
/// # Security
/// user_id はリクエストの値をそのまま信頼するため、呼び出し元（サインイン済みの
/// アプリケーションサーバー）の認証を必須とする
pub async fn require_service_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = request
        .headers()
        .get(SERVICE_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|presented| state.service_key.matches(presented));

    if !authorized {
        tracing::warn!(path = %request.uri().path(), "サービスキー認証失敗");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
