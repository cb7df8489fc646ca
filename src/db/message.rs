//! Conversation message repository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::transport::MessageKind;
use crate::{Error, Result};

/// Who authored a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One persisted conversation message
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub kind: MessageKind,
    pub role: MessageRole,
    /// Sender public key for user messages, if known
    pub sender: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregate statistics for one conversation
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
}

/// Message repository
#[derive(Clone)]
pub struct MessageRepo {
    pool: DbPool,
}

impl MessageRepo {
    /// Create a new message repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Persist one message
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn add(
        &self,
        conversation_id: &str,
        kind: MessageKind,
        role: MessageRole,
        sender: Option<&str>,
        content: &str,
    ) -> Result<StoredMessage> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let kind_str = match kind {
            MessageKind::Direct => "direct",
            MessageKind::Channel => "channel",
        };

        conn.execute(
            "INSERT INTO messages (id, conversation_id, kind, role, sender, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                &id,
                conversation_id,
                kind_str,
                role.as_str(),
                sender,
                content,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(StoredMessage {
            id,
            conversation_id: conversation_id.to_string(),
            kind,
            role,
            sender: sender.map(String::from),
            content: content.to_string(),
            created_at: now,
        })
    }

    /// Most recent messages for a conversation, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn recent(&self, conversation_id: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, conversation_id, kind, role, sender, content, created_at
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY created_at DESC LIMIT ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut messages: Vec<StoredMessage> = stmt
            .query_map(
                rusqlite::params![conversation_id, limit as i64],
                map_message_row,
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        messages.reverse();
        Ok(messages)
    }

    /// Search stored messages by keyword and/or age
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn search(
        &self,
        conversation_id: Option<&str>,
        keyword: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut sql = String::from(
            "SELECT id, conversation_id, kind, role, sender, content, created_at
             FROM messages WHERE 1=1",
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(conversation_id) = conversation_id {
            sql.push_str(" AND conversation_id = ?");
            params.push(Box::new(conversation_id.to_string()));
        }
        if let Some(keyword) = keyword {
            sql.push_str(" AND content LIKE ?");
            params.push(Box::new(format!("%{keyword}%")));
        }
        if let Some(since) = since {
            sql.push_str(" AND created_at >= ?");
            params.push(Box::new(since.to_rfc3339()));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");
        params.push(Box::new(limit as i64));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Database(e.to_string()))?;

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(std::convert::AsRef::as_ref).collect();
        let messages = stmt
            .query_map(param_refs.as_slice(), map_message_row)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(messages)
    }

    /// Statistics for one conversation
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn stats(&self, conversation_id: &str) -> Result<ConversationStats> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let (total, user, assistant): (i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(role = 'user'), 0),
                        COALESCE(SUM(role = 'assistant'), 0)
                 FROM messages WHERE conversation_id = ?1",
                [conversation_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(ConversationStats {
            total_messages: total.max(0) as usize,
            user_messages: user.max(0) as usize,
            assistant_messages: assistant.max(0) as usize,
        })
    }

    /// Total message count across all conversations
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn total(&self) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(total.max(0) as usize)
    }
}

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let kind: String = row.get(2)?;
    let role: String = row.get(3)?;
    let created_at: String = row.get(6)?;

    Ok(StoredMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        kind: if kind == "channel" {
            MessageKind::Channel
        } else {
            MessageKind::Direct
        },
        role: MessageRole::from_str(&role).unwrap_or(MessageRole::User),
        sender: row.get(4)?,
        content: row.get(5)?,
        created_at: parse_datetime(&created_at),
    })
}

/// Parse an RFC 3339 timestamp, falling back to now on malformed rows
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
