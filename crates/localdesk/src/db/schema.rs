//! Row types for the LocalDesk database
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Tables every deployment must have; checked by `verify-schema`.
pub const REQUIRED_TABLES: &[&str] = &["profiles", "chats", "messages", "documents"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub full_name: Option<String>,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(anyhow::anyhow!("Unknown message role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub source: String,
    pub category: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// A chunk ready to be written to the `documents` table.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub id: i64,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
}

/// Similarity search hit, shaped like the rows the chat pipeline consumes.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentMatch {
    pub id: i64,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub total_profiles: i64,
    pub total_chats: i64,
    pub total_messages: i64,
    pub total_documents: i64,
    pub database_size_bytes: i64,
}

/// Fixed-width timestamps so that text ordering matches time ordering.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
