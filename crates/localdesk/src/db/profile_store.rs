//! Profile rows and their metadata blob
use crate::db::schema::*;
use crate::settings::merge_shallow;
use chrono::Utc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct ProfileStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl ProfileStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    pub fn get_profile(&self, user_id: &str) -> anyhow::Result<Option<Profile>> {
        let conn = self.get_conn()?;
        Self::select_profile(&conn, user_id)
    }

    /// Stored metadata, or `None` when the user has no profile row yet.
    pub fn get_metadata(&self, user_id: &str) -> anyhow::Result<Option<Map<String, Value>>> {
        let conn = self.get_conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT metadata FROM profiles WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.map(|json| parse_metadata(user_id, &json)))
    }

    /// Returns the user's profile, creating it first if needed. A concurrent
    /// insert for the same user is absorbed by the unique constraint.
    pub fn ensure_profile(
        &self,
        user_id: &str,
        full_name: Option<&str>,
        metadata: Option<&Map<String, Value>>,
    ) -> anyhow::Result<Profile> {
        let conn = self.get_conn()?;
        let now = timestamp(Utc::now());
        let metadata_json = match metadata {
            Some(map) => serde_json::to_string(map)?,
            None => "{}".to_string(),
        };

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO profiles (id, user_id, full_name, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![Uuid::new_v4().to_string(), user_id, full_name, metadata_json, now],
        )?;
        if inserted > 0 {
            info!("Created profile for user {}", user_id);
        }

        Self::select_profile(&conn, user_id)?
            .ok_or_else(|| anyhow::anyhow!("Profile for user {} vanished after insert", user_id))
    }

    /// Creates the row if absent, shallow-merges `patch` into the stored
    /// metadata and persists the union. Last write wins.
    pub fn merge_metadata(
        &self,
        user_id: &str,
        patch: Map<String, Value>,
    ) -> anyhow::Result<Map<String, Value>> {
        let mut conn = self.get_conn()?;
        let now = timestamp(Utc::now());
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO profiles (id, user_id, full_name, metadata, created_at, updated_at)
             VALUES (?1, ?2, NULL, '{}', ?3, ?3)",
            params![Uuid::new_v4().to_string(), user_id, now],
        )?;

        let raw: String = tx.query_row(
            "SELECT metadata FROM profiles WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        let mut merged = parse_metadata(user_id, &raw);
        merge_shallow(&mut merged, patch);

        tx.execute(
            "UPDATE profiles SET metadata = ?1, updated_at = ?2 WHERE user_id = ?3",
            params![serde_json::to_string(&merged)?, now, user_id],
        )?;
        tx.commit()?;

        debug!("Merged settings for user {} ({} keys)", user_id, merged.len());
        Ok(merged)
    }

    fn select_profile(conn: &Connection, user_id: &str) -> anyhow::Result<Option<Profile>> {
        let profile = conn
            .query_row(
                "SELECT id, user_id, full_name, metadata, created_at, updated_at
                 FROM profiles WHERE user_id = ?1",
                [user_id],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }
}

fn row_to_profile(row: &Row) -> rusqlite::Result<Profile> {
    let user_id: String = row.get(1)?;
    let metadata_json: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(Profile {
        id: row.get(0)?,
        metadata: parse_metadata(&user_id, &metadata_json),
        user_id,
        full_name: row.get(2)?,
        created_at: parse_timestamp(4, &created_at)?,
        updated_at: parse_timestamp(5, &updated_at)?,
    })
}

fn parse_metadata(user_id: &str, raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Map::new(),
        Ok(other) => {
            warn!("Profile metadata for {} is not an object ({}), treating as empty", user_id, other);
            Map::new()
        }
        Err(e) => {
            warn!("Profile metadata for {} is not valid JSON: {}", user_id, e);
            Map::new()
        }
    }
}
