use axum::{
    Json,
    extract::{Path, State},
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::SecondFactorState;
use crate::services::SetupResult;
use crate::state::AppState;

// === 2FA Setup ===

#[derive(Debug, Deserialize, Validate)]
pub struct SetupRequest {
    #[garde(skip)]
    pub user_id: Uuid,
    #[garde(email)]
    pub email: String,
}

/// POST /api/2fa/setup
///
/// 2FA設定を開始（シークレット・QRコードURL・バックアップコード返却）
///
/// # Security
/// - シークレット平文・バックアップコードはログ出力禁止
/// - 平文を返すのはこのレスポンスのみ
pub async fn setup_2fa(
    State(state): State<AppState>,
    Json(request): Json<SetupRequest>,
) -> Result<Json<SetupResult>, AppError> {
    validate_request(&request)?;

    let result = state
        .two_factor_service
        .setup(request.user_id, &request.email)
        .await?;

    Ok(Json(result))
}

// === コード付きリクエスト（共通） ===

#[derive(Debug, Deserialize, Validate)]
pub struct CodeRequest {
    #[garde(skip)]
    pub user_id: Uuid,
    #[garde(length(min = 1, max = 32))]
    pub code: String,
}

// === 2FA Activate ===

#[derive(Debug, Serialize)]
pub struct ActivateResponse {
    pub enabled: bool,
}

/// POST /api/2fa/activate
///
/// 2FA設定確認（初回コード検証で有効化）
pub async fn activate_2fa(
    State(state): State<AppState>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<ActivateResponse>, AppError> {
    validate_request(&request)?;

    if !state
        .two_factor_service
        .activate(request.user_id, &request.code)
        .await?
    {
        return Err(AppError::VerificationFailed);
    }

    Ok(Json(ActivateResponse { enabled: true }))
}

// === 2FA Deactivate ===

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub disabled: bool,
}

/// POST /api/2fa/deactivate
///
/// 2FA無効化（TOTPコード確認必須）
pub async fn deactivate_2fa(
    State(state): State<AppState>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<DeactivateResponse>, AppError> {
    validate_request(&request)?;

    if !state
        .two_factor_service
        .deactivate(request.user_id, &request.code)
        .await?
    {
        return Err(AppError::VerificationFailed);
    }

    Ok(Json(DeactivateResponse { disabled: true }))
}

// === 2FA Verify (サインイン時) ===

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

/// POST /api/2fa/verify
///
/// サインイン時の2FA検証（TOTPコードまたはバックアップコード）
///
/// # Security
/// - 失敗理由（コード不一致・未設定・未確認）は区別せず `valid: false` のみ返す
pub async fn verify_2fa(
    State(state): State<AppState>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    validate_request(&request)?;

    let valid = state
        .two_factor_service
        .verify_at_sign_in(request.user_id, &request.code)
        .await?;

    Ok(Json(VerifyResponse { valid }))
}

// === バックアップコード再発行 ===

#[derive(Debug, Serialize)]
pub struct RegenerateResponse {
    pub backup_codes: Vec<String>,
}

/// POST /api/2fa/backup-codes/regenerate
///
/// # Security
/// - TOTPコードのみ受け付ける
pub async fn regenerate_backup_codes(
    State(state): State<AppState>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<RegenerateResponse>, AppError> {
    validate_request(&request)?;

    let backup_codes = state
        .two_factor_service
        .regenerate_backup_codes(request.user_id, &request.code)
        .await?
        .ok_or(AppError::VerificationFailed)?;

    Ok(Json(RegenerateResponse { backup_codes }))
}

// === 2FA Status ===

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub enabled: bool,
    pub state: SecondFactorState,
    pub backup_codes_remaining: usize,
}

/// GET /api/2fa/status/{user_id}
pub async fn status_2fa(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, AppError> {
    let status = state.two_factor_service.status(user_id).await?;

    Ok(Json(StatusResponse {
        enabled: status.state == SecondFactorState::Active,
        state: status.state,
        backup_codes_remaining: status.backup_codes_remaining,
    }))
}

// === Helper Functions ===

/// リクエストのバリデーション（garde）
fn validate_request<T>(request: &T) -> Result<(), AppError>
where
    T: Validate,
    T::Context: Default,
{
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}
