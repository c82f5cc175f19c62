use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    /// データストア呼び出しのタイムアウト（秒）
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,

    /// 呼び出し元サービスの認証キー（`x-service-key` ヘッダーで受け取る）
    pub service_api_key: SecretBox<String>,

    // 2FA (TOTP) 設定
    /// TOTP発行者名（認証アプリに表示される）
    pub totp_issuer: String,
    /// AES-256暗号化キー（Base64エンコード、32バイト）
    pub encryption_key: SecretBox<String>,
    /// 1回に発行するバックアップコード数
    #[serde(default = "default_backup_code_count")]
    pub backup_code_count: usize,
    /// QRコード画像レンダラーのベースURL（末尾にURIエンコード済みデータを連結）
    #[serde(default = "default_qr_renderer_url")]
    pub qr_renderer_url: String,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_BACKUP_CODE_COUNT: usize = 10;
const DEFAULT_QR_RENDERER_URL: &str = "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data=";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    DEFAULT_DB_MAX_CONNECTIONS
}

fn default_store_timeout_secs() -> u64 {
    DEFAULT_STORE_TIMEOUT_SECS
}

fn default_backup_code_count() -> usize {
    DEFAULT_BACKUP_CODE_COUNT
}

fn default_qr_renderer_url() -> String {
    DEFAULT_QR_RENDERER_URL.to_string()
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    #[cfg(test)]
    pub(crate) fn load_from<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_load_with_defaults() {
        let config = Config::load_from(vars(&[
            ("DATABASE_URL", "postgres://localhost/test"),
            ("TOTP_ISSUER", "Maintenance"),
            ("ENCRYPTION_KEY", "AAAA"),
            ("SERVICE_API_KEY", "internal-key"),
        ]))
        .unwrap();

        assert_eq!(config.service_api_key.expose_secret(), "internal-key");
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.backup_code_count, 10);
        assert_eq!(config.store_timeout_secs, 5);
        assert_eq!(config.qr_renderer_url, DEFAULT_QR_RENDERER_URL);
        assert_eq!(config.database_url.expose_secret(), "postgres://localhost/test");
    }

    #[test]
    fn test_load_overrides() {
        let config = Config::load_from(vars(&[
            ("DATABASE_URL", "postgres://localhost/test"),
            ("TOTP_ISSUER", "Maintenance"),
            ("ENCRYPTION_KEY", "AAAA"),
            ("SERVICE_API_KEY", "internal-key"),
            ("PORT", "8080"),
            ("BACKUP_CODE_COUNT", "12"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.backup_code_count, 12);
    }

    #[test]
    fn test_load_missing_issuer() {
        let result = Config::load_from(vars(&[
            ("DATABASE_URL", "postgres://localhost/test"),
            ("ENCRYPTION_KEY", "AAAA"),
            ("SERVICE_API_KEY", "internal-key"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_service_api_key() {
        let result = Config::load_from(vars(&[
            ("DATABASE_URL", "postgres://localhost/test"),
            ("TOTP_ISSUER", "Maintenance"),
            ("ENCRYPTION_KEY", "AAAA"),
        ]));
        assert!(result.is_err());
    }
}
