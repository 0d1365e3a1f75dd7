//! SQLite-backed snapshot store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{PersistedCounts, SnapshotStore, StoreResult, DATA_VERSION};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn init(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS country_clicks (
                country TEXT PRIMARY KEY,
                clicks INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                total_clicks INTEGER NOT NULL,
                last_update TEXT NOT NULL,
                data_version TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self) -> StoreResult<Option<PersistedCounts>> {
        let meta = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT total_clicks, last_update, data_version FROM snapshot_meta WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some((total_clicks, last_update, data_version)) = meta else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT country, clicks FROM country_clicks",
        )
        .fetch_all(&self.pool)
        .await?;

        let country_clicks: BTreeMap<String, i64> = rows.into_iter().collect();
        let last_update = DateTime::parse_from_rfc3339(&last_update)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(PersistedCounts {
            country_clicks,
            total_clicks,
            last_update,
            data_version,
        }))
    }

    async fn save(&self, counts: &PersistedCounts) -> StoreResult<()> {
        // Wholesale replace inside one transaction, so readers never see a
        // half-written snapshot and a crash rolls back to the previous one.
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM country_clicks")
            .execute(&mut *tx)
            .await?;

        for (country, clicks) in &counts.country_clicks {
            sqlx::query("INSERT INTO country_clicks (country, clicks) VALUES (?, ?)")
                .bind(country)
                .bind(clicks)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO snapshot_meta (id, total_clicks, last_update, data_version)
            VALUES (1, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                total_clicks = excluded.total_clicks,
                last_update = excluded.last_update,
                data_version = excluded.data_version
            "#,
        )
        .bind(counts.total_clicks)
        .bind(counts.last_update.to_rfc3339())
        .bind(DATA_VERSION)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        // A single connection keeps every query on the same in-memory database
        let store = SqliteStore::new("sqlite::memory:", 1).await.unwrap();
        store.init().await.unwrap();
        store
    }

    fn sample() -> PersistedCounts {
        let mut country_clicks = BTreeMap::new();
        country_clicks.insert("KR".to_string(), 3);
        country_clicks.insert("US".to_string(), 1);
        PersistedCounts {
            country_clicks,
            total_clicks: 4,
            last_update: Utc::now(),
            data_version: DATA_VERSION.to_string(),
        }
    }

    #[tokio::test]
    async fn empty_database_loads_as_none() {
        let store = memory_store().await;
        assert!(store.load().await.unwrap().is_none());
        assert!(store.ping().await);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = memory_store().await;
        store.save(&sample()).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.country_clicks, sample().country_clicks);
        assert_eq!(loaded.total_clicks, 4);
        assert_eq!(loaded.data_version, "1");
    }

    #[tokio::test]
    async fn save_replaces_stale_countries() {
        let store = memory_store().await;
        store.save(&sample()).await.unwrap();

        let mut updated = sample();
        updated.country_clicks.remove("US");
        updated.country_clicks.insert("KR".to_string(), 5);
        updated.total_clicks = 5;
        store.save(&updated).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.country_clicks.len(), 1);
        assert_eq!(loaded.country_clicks["KR"], 5);
        assert_eq!(loaded.total_clicks, 5);
    }
}
