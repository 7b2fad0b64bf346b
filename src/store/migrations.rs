//! Store lifecycle: connection setup and versioned schema migrations.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use super::Store;
use crate::error::{Error, Result, StoreError};
use crate::messenger::Messenger;
use crate::types::Event;

struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                icon_url TEXT,
                medium_url TEXT,
                original_url TEXT,
                screen_url TEXT,
                screen_large_url TEXT,
                small_url TEXT,
                super_url TEXT,
                thumb_url TEXT,
                tiny_url TEXT,
                UNIQUE(original_url, screen_url, icon_url)
            );

            CREATE TABLE IF NOT EXISTS video_categories (
                id INTEGER PRIMARY KEY,
                name TEXT,
                deck TEXT,
                site_detail_url TEXT,
                image_id INTEGER REFERENCES images(id),
                saved_time INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS video_shows (
                id INTEGER PRIMARY KEY,
                guid TEXT UNIQUE,
                title TEXT,
                deck TEXT,
                position INTEGER,
                active INTEGER,
                site_detail_url TEXT,
                image_id INTEGER REFERENCES images(id),
                logo_id INTEGER REFERENCES images(id),
                saved_time INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS videos (
                id INTEGER PRIMARY KEY,
                guid TEXT UNIQUE,
                name TEXT,
                deck TEXT,
                publish_date TEXT,
                length_seconds INTEGER,
                site_detail_url TEXT,
                hd_url TEXT,
                high_url TEXT,
                low_url TEXT,
                youtube_id TEXT,
                premium INTEGER,
                video_show_id INTEGER REFERENCES video_shows(id),
                image_id INTEGER REFERENCES images(id),
                saved_time INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_kind TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                field TEXT NOT NULL,
                url TEXT NOT NULL,
                path TEXT NOT NULL,
                downloaded INTEGER NOT NULL DEFAULT 0,
                size_bytes INTEGER,
                UNIQUE(entity_kind, entity_id, field)
            );

            CREATE TABLE IF NOT EXISTS downloads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_kind TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                url_field TEXT NOT NULL,
                download_url TEXT NOT NULL,
                file_path TEXT NOT NULL,
                status INTEGER NOT NULL,
                priority INTEGER NOT NULL,
                bytes_downloaded INTEGER NOT NULL DEFAULT 0,
                total_bytes INTEGER,
                error_message TEXT,
                created_time INTEGER NOT NULL,
                started_time INTEGER,
                completed_time INTEGER
            );

            CREATE TABLE IF NOT EXISTS background_jobs (
                uuid TEXT PRIMARY KEY,
                tag TEXT NOT NULL,
                name TEXT NOT NULL,
                pauseable INTEGER NOT NULL,
                recoverable INTEGER NOT NULL,
                state INTEGER NOT NULL,
                progress_current INTEGER NOT NULL DEFAULT 0,
                progress_denominator INTEGER NOT NULL DEFAULT 0,
                session_data TEXT,
                created_time INTEGER NOT NULL,
                updated_time INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS background_job_archive (
                uuid TEXT PRIMARY KEY,
                tag TEXT NOT NULL,
                name TEXT NOT NULL,
                state INTEGER NOT NULL,
                progress_current INTEGER NOT NULL,
                progress_denominator INTEGER NOT NULL,
                created_time INTEGER NOT NULL,
                finished_time INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS system_state (
                key TEXT PRIMARY KEY,
                value TEXT
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT
            );
        "#,
    },
];

impl Store {
    /// Opens (creating if missing) the SQLite database at `path` and runs
    /// any migrations not yet applied.
    pub async fn new(
        path: &Path,
        messenger: Arc<Messenger>,
        event_tx: tokio::sync::broadcast::Sender<Event>,
    ) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| Error::Store(StoreError::ConnectionFailed(e.to_string())))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        // A single in-memory database is private to the connection that
        // created it — cap the pool to one connection so every query in a
        // `:memory:` store sees the same database, the way sqlite3's
        // `:memory:` is used in the upstream project's own test suite.
        let is_memory = path.as_os_str() == ":memory:";
        let pool_options = if is_memory {
            SqlitePoolOptions::new().max_connections(1)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| Error::Store(StoreError::ConnectionFailed(e.to_string())))?;

        let store = Self {
            pool,
            messenger,
            event_tx,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(StoreError::MigrationFailed(e.to_string())))?;

        let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Store(StoreError::MigrationFailed(e.to_string())))?;
        let current = current.unwrap_or(0);

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| Error::Store(StoreError::MigrationFailed(e.to_string())))?;

            sqlx::raw_sql(migration.sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    Error::Store(StoreError::MigrationFailed(format!(
                        "migration {} failed: {e}",
                        migration.version
                    )))
                })?;

            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, unixepoch())")
                .bind(migration.version)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::Store(StoreError::MigrationFailed(e.to_string())))?;

            tx.commit()
                .await
                .map_err(|e| Error::Store(StoreError::MigrationFailed(e.to_string())))?;

            tracing::info!(version = migration.version, "applied store migration");
        }

        Ok(())
    }
}
