use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::SecondFactorRecord;
use crate::repositories::SecondFactorStore;

/// インメモリ実装（テスト用）
///
/// ロック内で判定と更新を行うため、各操作は PostgreSQL 実装と同じくアトミック
#[derive(Default)]
pub struct MemorySecondFactorStore {
    records: Mutex<HashMap<Uuid, SecondFactorRecord>>,
}

impl MemorySecondFactorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecondFactorStore for MemorySecondFactorStore {
    async fn get(&self, user_id: Uuid) -> Result<Option<SecondFactorRecord>, AppError> {
        Ok(self.records.lock().await.get(&user_id).cloned())
    }

    async fn put_pending(
        &self,
        user_id: Uuid,
        secret_encrypted: &[u8],
        backup_code_hashes: &[String],
    ) -> Result<bool, AppError> {
        let mut records = self.records.lock().await;
        if records.get(&user_id).is_some_and(|r| r.enabled) {
            return Ok(false);
        }

        let now = OffsetDateTime::now_utc();
        records.insert(
            user_id,
            SecondFactorRecord {
                user_id,
                secret_encrypted: secret_encrypted.to_vec(),
                backup_codes: backup_code_hashes.to_vec(),
                enabled: false,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(true)
    }

    async fn enable(&self, user_id: Uuid) -> Result<bool, AppError> {
        let mut records = self.records.lock().await;
        match records.get_mut(&user_id) {
            Some(record) if !record.enabled => {
                record.enabled = true;
                record.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.records.lock().await.remove(&user_id).is_some())
    }

    async fn remove_backup_code(&self, user_id: Uuid, code_hash: &str) -> Result<bool, AppError> {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&user_id).filter(|r| r.enabled) else {
            return Ok(false);
        };

        let before = record.backup_codes.len();
        record.backup_codes.retain(|h| h != code_hash);
        if record.backup_codes.len() == before {
            return Ok(false);
        }
        record.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn replace_backup_codes(
        &self,
        user_id: Uuid,
        backup_code_hashes: &[String],
    ) -> Result<bool, AppError> {
        let mut records = self.records.lock().await;
        match records.get_mut(&user_id) {
            Some(record) if record.enabled => {
                record.backup_codes = backup_code_hashes.to_vec();
                record.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashes(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_put_pending_does_not_overwrite_enabled() {
        let store = MemorySecondFactorStore::new();
        let user_id = Uuid::new_v4();

        assert!(store.put_pending(user_id, b"a", &hashes(&["h1"])).await.unwrap());
        // 未確認なら上書き可能
        assert!(store.put_pending(user_id, b"b", &hashes(&["h2"])).await.unwrap());
        assert!(store.enable(user_id).await.unwrap());
        assert!(!store.put_pending(user_id, b"c", &hashes(&["h3"])).await.unwrap());

        let record = store.get(user_id).await.unwrap().unwrap();
        assert_eq!(record.secret_encrypted, b"b");
        assert!(record.enabled);
    }

    #[tokio::test]
    async fn test_enable_only_pending() {
        let store = MemorySecondFactorStore::new();
        let user_id = Uuid::new_v4();

        assert!(!store.enable(user_id).await.unwrap());
        store.put_pending(user_id, b"a", &[]).await.unwrap();
        assert!(store.enable(user_id).await.unwrap());
        assert!(!store.enable(user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_backup_code_once() {
        let store = MemorySecondFactorStore::new();
        let user_id = Uuid::new_v4();
        store
            .put_pending(user_id, b"a", &hashes(&["h1", "h2"]))
            .await
            .unwrap();

        // 未確認のレコードからは取り除けない
        assert!(!store.remove_backup_code(user_id, "h1").await.unwrap());

        store.enable(user_id).await.unwrap();
        assert!(store.remove_backup_code(user_id, "h1").await.unwrap());
        assert!(!store.remove_backup_code(user_id, "h1").await.unwrap());

        let record = store.get(user_id).await.unwrap().unwrap();
        assert_eq!(record.backup_codes, hashes(&["h2"]));
    }

    #[tokio::test]
    async fn test_replace_and_delete() {
        let store = MemorySecondFactorStore::new();
        let user_id = Uuid::new_v4();
        store.put_pending(user_id, b"a", &hashes(&["h1"])).await.unwrap();

        assert!(!store.replace_backup_codes(user_id, &hashes(&["x"])).await.unwrap());
        store.enable(user_id).await.unwrap();
        assert!(store.replace_backup_codes(user_id, &hashes(&["x"])).await.unwrap());
        assert_eq!(
            store.get(user_id).await.unwrap().unwrap().backup_codes,
            hashes(&["x"])
        );

        assert!(store.delete(user_id).await.unwrap());
        assert!(!store.delete(user_id).await.unwrap());
        assert!(store.get(user_id).await.unwrap().is_none());
    }
}
