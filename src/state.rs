use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::middleware::ServiceKey;
use crate::repositories::{PgSecondFactorStore, SecondFactorStore};
use crate::services::{QrRenderer, SecretCipher, TwoFactorService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// 二要素認証サービス
    pub two_factor_service: TwoFactorService,
    /// 呼び出し元サービスの認証キー
    pub service_key: ServiceKey,
}

impl AppState {
    /// PostgreSQL をデータストアとして AppState を作成
    pub fn new(db_pool: PgPool, config: &Config) -> Result<Self, AppError> {
        let store = PgSecondFactorStore::new(
            db_pool,
            Duration::from_secs(config.store_timeout_secs),
        );
        Self::with_store(Arc::new(store), config)
    }

    /// 任意のデータストアで AppState を作成
    pub fn with_store(
        store: Arc<dyn SecondFactorStore>,
        config: &Config,
    ) -> Result<Self, AppError> {
        let service_key = ServiceKey::new(config.service_api_key.expose_secret())?;
        let cipher = SecretCipher::from_base64(config.encryption_key.expose_secret())?;
        let qr_renderer = QrRenderer::new(config.qr_renderer_url.clone());

        let two_factor_service = TwoFactorService::new(
            store,
            cipher,
            qr_renderer,
            config.totp_issuer.clone(),
            config.backup_code_count,
        )?;

        Ok(Self {
            two_factor_service,
            service_key,
        })
    }
}
