//! Mesh node registry repository

use chrono::{DateTime, Utc};

use super::DbPool;
use super::message::parse_datetime;
use crate::{Error, Result};

/// A known mesh node
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub pubkey: String,
    pub name: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_advert: Option<DateTime<Utc>>,
    pub total_adverts: u64,
    pub is_online: bool,
}

/// Node registry repository
#[derive(Clone)]
pub struct NodeRepo {
    pool: DbPool,
}

impl NodeRepo {
    /// Create a new node repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a node; a non-empty name always wins over none
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn upsert(&self, pubkey: &str, name: Option<&str>, is_online: bool) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO nodes (pubkey, name, first_seen, last_seen, is_online)
             VALUES (?1, ?2, ?3, ?3, ?4)
             ON CONFLICT(pubkey) DO UPDATE SET
                 name = COALESCE(excluded.name, nodes.name),
                 last_seen = excluded.last_seen,
                 is_online = excluded.is_online",
            rusqlite::params![pubkey, name, now, is_online],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Record an advert from a node: bump counters and last-advert time
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn touch_advert(&self, pubkey: &str) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE nodes
             SET last_advert = ?1, last_seen = ?1, total_adverts = total_adverts + 1
             WHERE pubkey = ?2",
            rusqlite::params![now, pubkey],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Look up a node by exact public key
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn get(&self, pubkey: &str) -> Result<Option<NodeRecord>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let node = conn
            .query_row(
                "SELECT pubkey, name, first_seen, last_seen, last_advert, total_adverts, is_online
                 FROM nodes WHERE pubkey = ?1",
                [pubkey],
                map_node_row,
            )
            .ok();

        Ok(node)
    }

    /// Look up a node by public key prefix (exact match wins)
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Option<NodeRecord>> {
        if let Some(node) = self.get(prefix)? {
            return Ok(Some(node));
        }

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let node = conn
            .query_row(
                "SELECT pubkey, name, first_seen, last_seen, last_advert, total_adverts, is_online
                 FROM nodes WHERE pubkey LIKE ?1 || '%'
                 ORDER BY last_seen DESC LIMIT 1",
                [prefix],
                map_node_row,
            )
            .ok();

        Ok(node)
    }

    /// List nodes, optionally filtered, most recently seen first
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn list(&self, online_only: bool, named_only: bool, limit: usize) -> Result<Vec<NodeRecord>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut sql = String::from(
            "SELECT pubkey, name, first_seen, last_seen, last_advert, total_adverts, is_online
             FROM nodes WHERE 1=1",
        );
        if online_only {
            sql.push_str(" AND is_online = 1");
        }
        if named_only {
            sql.push_str(" AND name IS NOT NULL AND name != ''");
        }
        sql.push_str(" ORDER BY last_seen DESC LIMIT ?");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Database(e.to_string()))?;

        let nodes = stmt
            .query_map([limit as i64], map_node_row)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(nodes)
    }

    /// Friendly name for a node, if one was ever advertised
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn name_of(&self, pubkey: &str) -> Result<Option<String>> {
        Ok(self.find_by_prefix(pubkey)?.and_then(|n| n.name))
    }

    /// Total number of known nodes
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn count(&self) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(count.max(0) as usize)
    }
}

fn map_node_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeRecord> {
    let first_seen: String = row.get(2)?;
    let last_seen: String = row.get(3)?;
    let last_advert: Option<String> = row.get(4)?;
    let total_adverts: i64 = row.get(5)?;

    Ok(NodeRecord {
        pubkey: row.get(0)?,
        name: row.get(1)?,
        first_seen: parse_datetime(&first_seen),
        last_seen: parse_datetime(&last_seen),
        last_advert: last_advert.as_deref().map(parse_datetime),
        total_adverts: total_adverts.max(0) as u64,
        is_online: row.get(6)?,
    })
}
