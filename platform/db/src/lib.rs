//! The authoritative side of every authorization decision.
//!
//! [`procedures`] answers the questions the delegate forwards over RPC and
//! performs the only writes to facility role grants. [`directory`] backs the
//! dashboard reads and writes; [`seed`] loads demo data for local use.

pub mod directory;
pub mod procedures;
pub mod seed;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl DbError {
    /// Stable code surfaced to RPC and GraphQL callers.
    pub fn code(&self) -> &'static str {
        match self {
            DbError::NotFound(_) => "NOT_FOUND",
            DbError::Forbidden(_) => "FORBIDDEN",
            DbError::Validation(_) => "VALIDATION",
            DbError::Database(_) => "INTERNAL",
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        DbError::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DbError::Validation(message.into())
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Opens a pool for `url`. An in-memory SQLite database is pinned to one
/// connection.
pub async fn connect_url(
    url: &str,
    max_connections: u32,
    sql_logging: bool,
) -> DbResult<DatabaseConnection> {
    let mut options = ConnectOptions::new(url.to_owned());
    options
        .max_connections(max_connections)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(sql_logging);
    if url.starts_with("sqlite::memory:") {
        // Every pooled connection would otherwise open its own empty database.
        options.max_connections(1).min_connections(1);
    }
    let db = Database::connect(options).await?;
    tracing::info!(max_connections, "database connected");
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(DbError::NotFound("user").code(), "NOT_FOUND");
        assert_eq!(DbError::forbidden("no").code(), "FORBIDDEN");
        assert_eq!(DbError::validation("bad").code(), "VALIDATION");
        let down = DbError::from(DbErr::Custom("down".into()));
        assert_eq!(down.code(), "INTERNAL");
        let missing = DbError::NotFound("facility");
        assert_eq!(missing.to_string(), "facility not found");
    }
}
