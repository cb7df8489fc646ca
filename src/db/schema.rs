//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 3;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if a migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }
    if version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Conversation messages, one row per direction
        -- conversation_id is a channel number or a node public key
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('direct', 'channel')),
            role TEXT NOT NULL CHECK(role IN ('user', 'assistant')),
            sender TEXT,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        -- Known mesh nodes
        CREATE TABLE IF NOT EXISTS nodes (
            pubkey TEXT PRIMARY KEY,
            name TEXT,
            first_seen TEXT NOT NULL DEFAULT (datetime('now')),
            last_seen TEXT NOT NULL DEFAULT (datetime('now')),
            is_online INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Advertisement history
        CREATE TABLE IF NOT EXISTS adverts (
            id TEXT PRIMARY KEY,
            node_id TEXT NOT NULL,
            node_name TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_adverts_node ON adverts(node_id);
        CREATE INDEX IF NOT EXISTS idx_adverts_created ON adverts(created_at);

        -- Raw network event history (adverts, contacts, paths, status)
        CREATE TABLE IF NOT EXISTS network_events (
            id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            node_id TEXT,
            node_name TEXT,
            details TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_network_events_created
            ON network_events(created_at);

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2 (advert history)");
    Ok(())
}

fn migrate_v3(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Per-node advert counters for the node info tool
        ALTER TABLE nodes ADD COLUMN last_advert TEXT;
        ALTER TABLE nodes ADD COLUMN total_adverts INTEGER NOT NULL DEFAULT 0;

        PRAGMA user_version = 3;
        ",
    )?;

    tracing::info!("migrated to schema v3 (advert counters)");
    Ok(())
}
