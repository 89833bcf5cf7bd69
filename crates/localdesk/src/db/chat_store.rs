use crate::db::schema::*;
use chrono::Utc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct ChatStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl ChatStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    /// Appends a user/assistant pair to the user's most recent chat,
    /// starting a new chat if they have none. Returns the chat id.
    pub fn save_exchange(
        &self,
        user_id: &str,
        user_message: &str,
        assistant_message: &str,
    ) -> anyhow::Result<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let latest: Option<String> = tx
            .query_row(
                "SELECT id FROM chats WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;

        let now = Utc::now();
        let chat_id = match latest {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO chats (id, user_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                    params![id, user_id, timestamp(now)],
                )?;
                info!("Started chat {} for user {}", id, user_id);
                id
            }
        };

        for (role, content) in [(Role::User, user_message), (Role::Assistant, assistant_message)] {
            tx.execute(
                "INSERT INTO messages (id, chat_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![Uuid::new_v4().to_string(), chat_id, role.as_str(), content, timestamp(now)],
            )?;
        }
        tx.execute(
            "UPDATE chats SET updated_at = ?1 WHERE id = ?2",
            params![timestamp(now), chat_id],
        )?;
        tx.commit()?;

        debug!("Stored exchange in chat {} ({} + {} chars)",
            chat_id, user_message.len(), assistant_message.len());
        Ok(chat_id)
    }

    /// Chats for a user, newest first.
    pub fn list_chats(&self, user_id: &str) -> anyhow::Result<Vec<Chat>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, created_at, updated_at FROM chats
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )?;
        let chats = stmt
            .query_map([user_id], row_to_chat)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chats)
    }

    /// Messages of one chat in creation order. `None` if the chat does not
    /// exist or belongs to someone else.
    pub fn get_messages(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> anyhow::Result<Option<Vec<StoredMessage>>> {
        let conn = self.get_conn()?;
        let owned: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM chats WHERE id = ?1 AND user_id = ?2",
                params![chat_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        if owned.is_none() {
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            "SELECT id, chat_id, role, content, created_at FROM messages
             WHERE chat_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let messages = stmt
            .query_map([chat_id], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(messages))
    }
}

fn row_to_chat(row: &Row) -> rusqlite::Result<Chat> {
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;
    Ok(Chat {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        created_at: parse_timestamp(3, &created_at)?,
        updated_at: parse_timestamp(4, &updated_at)?,
    })
}

fn row_to_message(row: &Row) -> rusqlite::Result<StoredMessage> {
    let role: String = row.get(2)?;
    let created_at: String = row.get(4)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        role: role.parse().map_err(|e: anyhow::Error| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
        })?,
        content: row.get(3)?,
        created_at: parse_timestamp(4, &created_at)?,
    })
}
