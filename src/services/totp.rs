use data_encoding::BASE32;
use rand::RngCore;
use subtle::{Choice, ConstantTimeEq};
use time::OffsetDateTime;
use totp_rs::{Algorithm, TOTP};

use crate::error::AppError;

/// コード桁数
pub const DIGITS: usize = 6;
/// タイムステップ（秒）
pub const STEP_SECS: u64 = 30;
/// 前後に許容するステップ数
pub const SKEW_STEPS: u64 = 1;

/// 20バイトのランダムシークレットを生成し、Base32でエンコード（32文字）
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 20];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    BASE32.encode(&bytes)
}

/// 現在時刻のカウンタ（UNIX秒 / 30 の切り捨て）
pub fn current_counter() -> u64 {
    counter_at(OffsetDateTime::now_utc())
}

/// 指定時刻のカウンタ
pub fn counter_at(at: OffsetDateTime) -> u64 {
    u64::try_from(at.unix_timestamp()).unwrap_or(0) / STEP_SECS
}

/// シークレットとカウンタから6桁のコードを導出
///
/// HMAC-SHA1 + 動的切り詰め（RFC 4226 / RFC 6238）
pub fn derive_passcode(secret: &str, counter: u64) -> Result<String, AppError> {
    let totp = build_totp(secret)?;
    Ok(totp.generate(counter.saturating_mul(STEP_SECS)))
}

/// 指定カウンタの前後1ステップでコードを検証
///
/// # Security
/// - 3候補すべてを定数時間で比較し、どのカウンタで一致したかは返さない
/// - 6桁の数字以外は導出前に拒否
pub fn verify_at_counter(secret: &str, code: &str, now_counter: u64) -> Result<bool, AppError> {
    let Some(code) = normalize_code(code) else {
        return Ok(false);
    };

    let totp = build_totp(secret)?;
    let first = now_counter.saturating_sub(SKEW_STEPS);
    let last = now_counter.saturating_add(SKEW_STEPS);

    let mut matched = Choice::from(0);
    for counter in first..=last {
        let expected = totp.generate(counter.saturating_mul(STEP_SECS));
        matched |= expected.as_bytes().ct_eq(code.as_bytes());
    }

    Ok(matched.into())
}

/// 現在時刻でコードを検証
pub fn verify(secret: &str, code: &str) -> Result<bool, AppError> {
    verify_at_counter(secret, code, current_counter())
}

/// 認証アプリ向けのプロビジョニングURIを構築
///
/// `otpauth://totp/<issuer>:<email>?secret=<secret>&issuer=<issuer>`
pub fn provisioning_uri(issuer: &str, email: &str, secret: &str) -> String {
    let issuer = urlencoding::encode(issuer);
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}",
        issuer,
        urlencoding::encode(email),
        secret,
        issuer
    )
}

/// 空白とハイフンを除去し、6桁の数字であれば返す
fn normalize_code(code: &str) -> Option<String> {
    let code: String = code
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    (code.len() == DIGITS && code.chars().all(|c| c.is_ascii_digit())).then_some(code)
}

fn build_totp(secret: &str) -> Result<TOTP, AppError> {
    let secret_bytes = BASE32.decode(secret.as_bytes()).map_err(|e| {
        tracing::error!(error = ?e, "シークレットのBase32デコードエラー");
        AppError::Internal(anyhow::anyhow!("invalid base32 secret"))
    })?;

    TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        SKEW_STEPS as u8,
        STEP_SECS,
        secret_bytes,
        None,
        String::new(),
    )
    .map_err(|e| {
        tracing::error!(error = %e, "TOTP作成エラー");
        AppError::Internal(anyhow::anyhow!("totp creation error"))
    })
}
