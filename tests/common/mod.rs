//! Shared test helpers

use meshbot_gateway::db::{self, DbPool};

/// Create a fresh in-memory database with the full schema applied
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("in-memory db init")
}
