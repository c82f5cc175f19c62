use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 呼び出し元サービスの認証失敗
    #[error("呼び出し元の認証に失敗しました")]
    Unauthorized,

    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// データストアの失敗（リトライ可能）
    #[error("データベースエラー")]
    TransientStore(#[from] sqlx::Error),

    /// データストアの応答待ちタイムアウト（リトライ可能）
    #[error("データベース応答タイムアウト")]
    StoreTimeout,

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),

    #[error("二要素認証の設定が必要です")]
    NotConfigured,

    #[error("二要素認証が有効化されていません")]
    NotEnabled,

    #[error("二要素認証は既に有効です")]
    AlreadyEnabled,

    #[error("認証コードが無効です")]
    VerificationFailed,
}

impl AppError {
    /// 呼び出し側でリトライしてよいエラーか
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStore(_) | Self::StoreTimeout)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "認証が必要です".to_string(),
            ),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, "validation", msg.clone()),
            Self::TransientStore(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "transient_store_error",
                    "一時的なエラーが発生しました。再試行してください".to_string(),
                )
            }
            Self::StoreTimeout => {
                tracing::error!("データベース応答タイムアウト");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "transient_store_error",
                    "一時的なエラーが発生しました。再試行してください".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::NotConfigured => (
                StatusCode::BAD_REQUEST,
                "not_configured",
                "二要素認証の設定が必要です".to_string(),
            ),
            Self::NotEnabled => (
                StatusCode::BAD_REQUEST,
                "not_enabled",
                "二要素認証が有効化されていません".to_string(),
            ),
            Self::AlreadyEnabled => (
                StatusCode::CONFLICT,
                "already_enabled",
                "二要素認証は既に有効です".to_string(),
            ),
            Self::VerificationFailed => (
                StatusCode::UNAUTHORIZED,
                "verification_failed",
                "認証コードが正しくありません".to_string(),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: code,
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotConfigured.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotEnabled.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::AlreadyEnabled.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::VerificationFailed.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::StoreTimeout.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(AppError::StoreTimeout.is_transient());
        assert!(AppError::TransientStore(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!AppError::NotEnabled.is_transient());
        assert!(!AppError::VerificationFailed.is_transient());
    }
}
