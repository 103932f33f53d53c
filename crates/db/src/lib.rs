//! Database layer with `SeaORM` entities, repositories and the transaction engine.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repository abstractions for data access
//! - The transaction engine, the only writer of transactions and ledger rows
//! - Group lifecycle management
//! - Ledger recalculation and audit
//! - Database migrations

pub mod engine;
pub mod entities;
pub mod error;
pub mod migration;
pub mod repositories;

pub use engine::{GroupService, TransactionEngine};
pub use error::{RepositoryError, RepositoryResult};
pub use repositories::{BalanceRepository, GroupRepository, TransactionRepository, UserRepository};

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use splitledger_shared::config::DatabaseConfig;

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection sized by configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
