//! `LifeExecutor` Module
//!
//! Provides the `LifeExecutor` trait that abstracts statement execution over `may_postgres`.
//! The Postgres fetcher renders batch queries to SQL and runs them through an executor,
//! so any executor implementation (direct client, pooled connection, transaction) can
//! back relation loading.

use crate::config::DatabaseConfig;
use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use std::fmt;

/// `LifeExecutor` error type
#[derive(Debug)]
pub enum LifeError {
    /// `PostgreSQL` error from `may_postgres`
    PostgresError(PostgresError),
    /// Query execution error
    QueryError(String),
    /// Row parsing/conversion error
    ParseError(String),
    /// Other execution errors
    Other(String),
}

impl fmt::Display for LifeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifeError::PostgresError(e) => {
                write!(f, "PostgreSQL error: {e}")
            }
            LifeError::QueryError(s) => {
                write!(f, "Query error: {s}")
            }
            LifeError::ParseError(s) => {
                write!(f, "Parse error: {s}")
            }
            LifeError::Other(s) => {
                write!(f, "Execution error: {s}")
            }
        }
    }
}

impl std::error::Error for LifeError {}

impl From<PostgresError> for LifeError {
    fn from(err: PostgresError) -> Self {
        LifeError::PostgresError(err)
    }
}

/// Trait for executing read queries
///
/// # Examples
///
/// ```no_run
/// use lifeguard_bulk::{LifeExecutor, LifeError, MayPostgresExecutor};
///
/// # fn example(executor: &MayPostgresExecutor) -> Result<(), LifeError> {
/// let rows = executor.query_all("SELECT id FROM users WHERE id = ANY($1)", &[&vec![7i64, 8]])?;
/// let user_ids: Vec<i64> = rows.iter().map(|r| r.get(0)).collect();
/// # Ok(())
/// # }
/// ```
pub trait LifeExecutor {
    /// Execute a query and return all rows
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the query execution fails.
    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError>;
}

/// Implementation of `LifeExecutor` for `may_postgres::Client`
pub struct MayPostgresExecutor {
    client: Client,
}

impl MayPostgresExecutor {
    /// Create a new executor from a `may_postgres::Client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the `database` configuration section
    ///
    /// # Errors
    ///
    /// Returns `LifeError::PostgresError` if the connection cannot be established.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lifeguard_bulk::{DatabaseConfig, MayPostgresExecutor};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = DatabaseConfig::load()?;
    /// let executor = MayPostgresExecutor::connect(&config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect(config: &DatabaseConfig) -> Result<Self, LifeError> {
        let client = may_postgres::connect(&config.url)?;
        Ok(Self::new(client))
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl LifeExecutor for MayPostgresExecutor {
    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("lifeguard_bulk.query", sql = query).entered();

        log::trace!("executing: {query}");
        self.client.query(query, params).map_err(LifeError::PostgresError)
    }
}
