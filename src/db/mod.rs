// Registration store: chat users linked to game nations (SQLite via sqlx).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error::BotError;

/// Links between chat users and nations, as seen by the raid and audit flows.
#[async_trait]
pub trait LinkedNations: Send + Sync {
    async fn linked_nation(&self, discord_id: u64) -> Result<Option<i64>, BotError>;
    async fn linked_user(&self, nation_id: i64) -> Result<Option<u64>, BotError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Registration {
    pub discord_id: i64,
    pub discord_name: String,
    pub nation_id: i64,
    pub registered_at: String,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        // Every connection to an in-memory database sees its own empty schema.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS registrations (
                discord_id INTEGER PRIMARY KEY,
                discord_name TEXT NOT NULL DEFAULT '',
                nation_id INTEGER NOT NULL,
                registered_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_registrations_nation ON registrations(nation_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Registrations ─────────────────────────────────────────────────

    /// Link a chat user to a nation, replacing any previous link.
    ///
    /// Discord snowflakes fit in an i64; SQLite has no unsigned integers.
    pub async fn register(
        &self,
        discord_id: u64,
        discord_name: &str,
        nation_id: i64,
    ) -> Result<Registration, sqlx::Error> {
        let row = sqlx::query_as::<_, Registration>(
            r#"
            INSERT INTO registrations (discord_id, discord_name, nation_id) VALUES (?, ?, ?)
            ON CONFLICT(discord_id) DO UPDATE SET
                discord_name = excluded.discord_name,
                nation_id = excluded.nation_id,
                registered_at = datetime('now')
            RETURNING discord_id, discord_name, nation_id, registered_at
        "#,
        )
        .bind(discord_id as i64)
        .bind(discord_name)
        .bind(nation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn nation_for(&self, discord_id: u64) -> Result<Option<i64>, sqlx::Error> {
        let nation_id: Option<i64> =
            sqlx::query_scalar("SELECT nation_id FROM registrations WHERE discord_id = ?")
                .bind(discord_id as i64)
                .fetch_optional(&self.pool)
                .await?;
        Ok(nation_id)
    }

    /// The most recent registration for a nation, if any user claimed it.
    pub async fn discord_for_nation(
        &self,
        nation_id: i64,
    ) -> Result<Option<Registration>, sqlx::Error> {
        let row = sqlx::query_as::<_, Registration>(
            r#"
            SELECT discord_id, discord_name, nation_id, registered_at
            FROM registrations WHERE nation_id = ?
            ORDER BY registered_at DESC, discord_id DESC LIMIT 1
        "#,
        )
        .bind(nation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn unregister(&self, discord_id: u64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM registrations WHERE discord_id = ?")
            .bind(discord_id as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LinkedNations for Database {
    async fn linked_nation(&self, discord_id: u64) -> Result<Option<i64>, BotError> {
        Ok(self.nation_for(discord_id).await?)
    }

    async fn linked_user(&self, nation_id: i64) -> Result<Option<u64>, BotError> {
        Ok(self
            .discord_for_nation(nation_id)
            .await?
            .map(|r| r.discord_id as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let db = test_db().await;

        let reg = db.register(1001, "raider#1", 590508).await.unwrap();
        assert_eq!(reg.discord_id, 1001);
        assert_eq!(reg.nation_id, 590508);

        assert_eq!(db.nation_for(1001).await.unwrap(), Some(590508));
        assert_eq!(db.nation_for(2002).await.unwrap(), None);

        let owner = db.discord_for_nation(590508).await.unwrap().unwrap();
        assert_eq!(owner.discord_name, "raider#1");
        assert!(db.discord_for_nation(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_replaces_previous_link() {
        let db = test_db().await;

        db.register(1001, "raider", 10).await.unwrap();
        db.register(1001, "raider-renamed", 20).await.unwrap();

        assert_eq!(db.nation_for(1001).await.unwrap(), Some(20));
        let owner = db.discord_for_nation(20).await.unwrap().unwrap();
        assert_eq!(owner.discord_name, "raider-renamed");
        assert!(db.discord_for_nation(10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unregister() {
        let db = test_db().await;

        db.register(1001, "raider", 10).await.unwrap();
        assert!(db.unregister(1001).await.unwrap());
        assert!(!db.unregister(1001).await.unwrap());
        assert_eq!(db.nation_for(1001).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_large_snowflake_round_trips() {
        let db = test_db().await;

        let snowflake: u64 = 1_180_000_000_000_000_000;
        db.register(snowflake, "big", 5).await.unwrap();
        assert_eq!(db.nation_for(snowflake).await.unwrap(), Some(5));
    }
}
