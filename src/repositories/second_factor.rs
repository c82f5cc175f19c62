use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::SecondFactorRecord;

/// 二要素認証レコードの永続化
///
/// 変更系の操作はすべて1行単位でアトミックであること。
/// 戻り値の `bool` は条件に合う行が更新されたかどうか。
#[async_trait]
pub trait SecondFactorStore: Send + Sync {
    /// ユーザーIDでレコードを検索
    async fn get(&self, user_id: Uuid) -> Result<Option<SecondFactorRecord>, AppError>;

    /// 未確認（enabled = false）のレコードを作成または上書き
    ///
    /// # Note
    /// 有効化済みのレコードは上書きせず `false` を返す
    async fn put_pending(
        &self,
        user_id: Uuid,
        secret_encrypted: &[u8],
        backup_code_hashes: &[String],
    ) -> Result<bool, AppError>;

    /// 未確認のレコードを有効化
    async fn enable(&self, user_id: Uuid) -> Result<bool, AppError>;

    /// レコードを削除
    async fn delete(&self, user_id: Uuid) -> Result<bool, AppError>;

    /// 有効なレコードからバックアップコード（ハッシュ）を1件取り除く
    ///
    /// 存在して取り除けた場合のみ `true`
    async fn remove_backup_code(&self, user_id: Uuid, code_hash: &str) -> Result<bool, AppError>;

    /// 有効なレコードのバックアップコードを丸ごと置き換える
    async fn replace_backup_codes(
        &self,
        user_id: Uuid,
        backup_code_hashes: &[String],
    ) -> Result<bool, AppError>;
}

/// PostgreSQL 実装
#[derive(Clone)]
pub struct PgSecondFactorStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgSecondFactorStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// クエリにタイムアウトを適用
    async fn bounded<T, F>(&self, query: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| AppError::StoreTimeout)?
            .map_err(AppError::from)
    }
}

#[async_trait]
impl SecondFactorStore for PgSecondFactorStore {
    async fn get(&self, user_id: Uuid) -> Result<Option<SecondFactorRecord>, AppError> {
        self.bounded(
            sqlx::query_as::<_, SecondFactorRecord>(
                r#"
                SELECT user_id, secret_encrypted, backup_codes, enabled, created_at, updated_at
                FROM user_second_factors
                WHERE user_id = $1
                "#,
            )
            .bind(user_id)
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn put_pending(
        &self,
        user_id: Uuid,
        secret_encrypted: &[u8],
        backup_code_hashes: &[String],
    ) -> Result<bool, AppError> {
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    INSERT INTO user_second_factors (user_id, secret_encrypted, backup_codes)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (user_id) DO UPDATE
                    SET secret_encrypted = EXCLUDED.secret_encrypted,
                        backup_codes = EXCLUDED.backup_codes,
                        enabled = false,
                        created_at = NOW(),
                        updated_at = NOW()
                    WHERE user_second_factors.enabled = false
                    "#,
                )
                .bind(user_id)
                .bind(secret_encrypted)
                .bind(backup_code_hashes)
                .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn enable(&self, user_id: Uuid) -> Result<bool, AppError> {
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE user_second_factors
                    SET enabled = true, updated_at = NOW()
                    WHERE user_id = $1 AND enabled = false
                    "#,
                )
                .bind(user_id)
                .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, user_id: Uuid) -> Result<bool, AppError> {
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    DELETE FROM user_second_factors
                    WHERE user_id = $1
                    "#,
                )
                .bind(user_id)
                .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove_backup_code(&self, user_id: Uuid, code_hash: &str) -> Result<bool, AppError> {
        // 存在確認と削除を1文で行い、同一コードの同時使用を防ぐ
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE user_second_factors
                    SET backup_codes = array_remove(backup_codes, $2), updated_at = NOW()
                    WHERE user_id = $1 AND enabled = true AND $2 = ANY(backup_codes)
                    "#,
                )
                .bind(user_id)
                .bind(code_hash)
                .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn replace_backup_codes(
        &self,
        user_id: Uuid,
        backup_code_hashes: &[String],
    ) -> Result<bool, AppError> {
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE user_second_factors
                    SET backup_codes = $2, updated_at = NOW()
                    WHERE user_id = $1 AND enabled = true
                    "#,
                )
                .bind(user_id)
                .bind(backup_code_hashes)
                .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
