//! Singleton system-state key/value pairs, mirroring the upstream
//! `SystemStateStorage` table: indexer watermark timestamps and
//! first-time-setup flags.

use super::Store;
use crate::error::Result;

/// Unix timestamp of the last successful full index run.
pub const KEY_FULL_INDEX_LAST_UPDATE: &str = "indexer_full__last_update";
/// Unix timestamp of the last successful quick index run.
pub const KEY_QUICK_INDEX_LAST_UPDATE: &str = "indexer_quick__last_update";
pub const KEY_DB_VERSION: &str = "db__version";
pub const KEY_SETUP_INITIATED: &str = "first_time_setup__initiated";
pub const KEY_SETUP_COMPLETE: &str = "first_time_setup__complete";

impl Store {
    pub async fn get_system_state(&self, key: &str) -> Result<Option<String>> {
        Ok(sqlx::query_scalar("SELECT value FROM system_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn set_system_state(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO system_state (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_system_state_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self
            .get_system_state(key)
            .await?
            .and_then(|v| v.parse::<i64>().ok()))
    }

    pub async fn set_system_state_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set_system_state(key, &value.to_string()).await
    }

    pub async fn get_system_state_bool(&self, key: &str) -> Result<bool> {
        Ok(self.get_system_state(key).await?.as_deref() == Some("true"))
    }

    pub async fn set_system_state_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_system_state(key, if value { "true" } else { "false" }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::Messenger;
    use std::sync::Arc;

    async fn test_store() -> Store {
        let (tx, _rx) = tokio::sync::broadcast::channel(16);
        Store::new(&std::path::PathBuf::from(":memory:"), Arc::new(Messenger::new()), tx)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn round_trips_watermark_timestamp() {
        let store = test_store().await;
        assert!(store.get_system_state_i64(KEY_FULL_INDEX_LAST_UPDATE).await.unwrap().is_none());

        store.set_system_state_i64(KEY_FULL_INDEX_LAST_UPDATE, 1_700_000_000).await.unwrap();
        assert_eq!(
            store.get_system_state_i64(KEY_FULL_INDEX_LAST_UPDATE).await.unwrap(),
            Some(1_700_000_000)
        );
    }

    #[tokio::test]
    async fn setup_flags_default_false() {
        let store = test_store().await;
        assert!(!store.get_system_state_bool(KEY_SETUP_COMPLETE).await.unwrap());
        store.set_system_state_bool(KEY_SETUP_COMPLETE, true).await.unwrap();
        assert!(store.get_system_state_bool(KEY_SETUP_COMPLETE).await.unwrap());
    }
}
