//! Data store abstraction for Quest.
//!
//! Provides a trait-based interface over the relational store so the
//! pipeline can run against SQL Server in production and against a
//! scripted stand-in under test.

mod mock;
mod mssql;
mod types;

pub use mock::MockStoreClient;
pub use mssql::MssqlClient;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::StoreConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Builds a store client from the resolved configuration.
///
/// Validates the configuration eagerly; the actual connection is dialed
/// per statement, never held across calls.
pub fn create_store(config: &StoreConfig) -> Result<Box<dyn StoreClient>> {
    let client = MssqlClient::new(config)?;
    Ok(Box::new(client))
}

/// Trait defining the interface to the relational store.
///
/// Statements arriving here have already passed validation; the store
/// layer runs them verbatim and reports errors as raw text so the
/// classifier can work on the original wording.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Executes a statement and returns the result set.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<()>;
}
