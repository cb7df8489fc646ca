//! Advertisement and network event history repository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use super::message::parse_datetime;
use crate::{Error, Result};

/// One recorded advertisement
#[derive(Debug, Clone)]
pub struct Advert {
    pub id: String,
    pub node_id: String,
    pub node_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One persisted network event
#[derive(Debug, Clone)]
pub struct StoredNetworkEvent {
    pub id: String,
    pub event_type: String,
    pub node_id: Option<String>,
    pub node_name: Option<String>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Advert and network event repository
#[derive(Clone)]
pub struct AdvertRepo {
    pool: DbPool,
}

impl AdvertRepo {
    /// Create a new advert repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record one advertisement
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn add(&self, node_id: &str, node_name: Option<&str>) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO adverts (id, node_id, node_name, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                node_id,
                node_name,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Search advert history, newest first
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn search(
        &self,
        node_id: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Advert>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut sql = String::from(
            "SELECT id, node_id, node_name, created_at FROM adverts WHERE 1=1",
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(node_id) = node_id {
            // Prefix match so short key fragments work
            sql.push_str(" AND node_id LIKE ? || '%'");
            params.push(Box::new(node_id.to_string()));
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
        let adverts = stmt
            .query_map(param_refs.as_slice(), |row| {
                let created_at: String = row.get(3)?;
                Ok(Advert {
                    id: row.get(0)?,
                    node_id: row.get(1)?,
                    node_name: row.get(2)?,
                    created_at: parse_datetime(&created_at),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(adverts)
    }

    /// Record one network event
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn add_event(
        &self,
        event_type: &str,
        node_id: Option<&str>,
        node_name: Option<&str>,
        details: Option<&str>,
    ) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO network_events (id, event_type, node_id, node_name, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                event_type,
                node_id,
                node_name,
                details,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Search network event history, newest first
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn search_events(
        &self,
        event_type: Option<&str>,
        node_id: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<StoredNetworkEvent>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut sql = String::from(
            "SELECT id, event_type, node_id, node_name, details, created_at
             FROM network_events WHERE 1=1",
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(event_type) = event_type {
            sql.push_str(" AND event_type = ?");
            params.push(Box::new(event_type.to_string()));
        }
        if let Some(node_id) = node_id {
            sql.push_str(" AND node_id LIKE ? || '%'");
            params.push(Box::new(node_id.to_string()));
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
        let events = stmt
            .query_map(param_refs.as_slice(), |row| {
                let created_at: String = row.get(5)?;
                Ok(StoredNetworkEvent {
                    id: row.get(0)?,
                    event_type: row.get(1)?,
                    node_id: row.get(2)?,
                    node_name: row.get(3)?,
                    details: row.get(4)?,
                    created_at: parse_datetime(&created_at),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::db;

    fn repo() -> AdvertRepo {
        AdvertRepo::new(db::init_memory().unwrap())
    }

    #[test]
    fn add_and_search_adverts() {
        let repo = repo();

        repo.add("abcd1234", Some("Basecamp")).unwrap();
        repo.add("ffff0000", None).unwrap();

        let all = repo.search(None, None, 50).unwrap();
        assert_eq!(all.len(), 2);

        let filtered = repo.search(Some("abcd"), None, 50).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].node_name.as_deref(), Some("Basecamp"));
    }

    #[test]
    fn since_filter_excludes_old_rows() {
        let repo = repo();
        repo.add("abcd1234", None).unwrap();

        let future = Utc::now() + Duration::hours(1);
        assert!(repo.search(None, Some(future), 50).unwrap().is_empty());

        let past = Utc::now() - Duration::hours(1);
        assert_eq!(repo.search(None, Some(past), 50).unwrap().len(), 1);
    }

    #[test]
    fn network_events_round_trip() {
        let repo = repo();

        repo.add_event("advert", Some("abcd"), Some("Basecamp"), None)
            .unwrap();
        repo.add_event("path_update", Some("abcd"), None, Some("3 hops"))
            .unwrap();

        let all = repo.search_events(None, None, None, 50).unwrap();
        assert_eq!(all.len(), 2);

        let adverts = repo
            .search_events(Some("advert"), None, None, 50)
            .unwrap();
        assert_eq!(adverts.len(), 1);
        assert_eq!(adverts[0].node_name.as_deref(), Some("Basecamp"));
    }
}
