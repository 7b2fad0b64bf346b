//! Generic user-configurable key/value settings, separate from
//! `system_state` (which is internal bookkeeping, not user-facing).

use super::Store;
use crate::error::Result;

impl Store {
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_settings(&self) -> Result<Vec<(String, String)>> {
        Ok(sqlx::query_as::<_, (String, String)>("SELECT key, value FROM settings ORDER BY key ASC")
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn delete_setting(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
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
    async fn set_then_get_round_trips() {
        let store = test_store().await;
        store.set_setting("quick_lookback_margin_hours", "24").await.unwrap();
        assert_eq!(
            store.get_setting("quick_lookback_margin_hours").await.unwrap(),
            Some("24".to_string())
        );
    }

    #[tokio::test]
    async fn overwrite_replaces_value() {
        let store = test_store().await;
        store.set_setting("k", "v1").await.unwrap();
        store.set_setting("k", "v2").await.unwrap();
        assert_eq!(store.get_setting("k").await.unwrap(), Some("v2".to_string()));
    }
}
