use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::core::common::DatabaseOpener;
use crate::error::{BootResult, StartupError};

/// Scheme prefix of the embedded database driver
pub const SQLITE_SCHEME: &str = "sqlite:";

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Derive the connection locator from a validated database name.
///
/// The name is used as-is; no path juggling and no escaping.
pub fn locator(database_name: &str) -> String {
    format!("{}{}", SQLITE_SCHEME, database_name)
}

/// Production opener backed by a sqlx connection pool
#[derive(Debug, Default)]
pub struct DefaultDatabaseOpener;

impl DefaultDatabaseOpener {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseOpener for DefaultDatabaseOpener {
    type Handle = SqlitePool;

    async fn open(&self, locator: &str) -> BootResult<SqlitePool> {
        // connecting acquires one connection up front, so a dead or
        // missing database is diagnosed here and not at first use
        SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(locator)
            .await
            .map_err(StartupError::DatabaseConnectionFailed)
    }
}
