//! Postgres persistence for snapshots and their embeddings.
//!
//! The free functions in [`snapshots`] and [`embeddings`] take a `&PgPool`;
//! [`PgSnapshotStore`] wraps them behind the [`SnapshotStore`] trait shared
//! with [`InMemorySnapshotStore`].

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

pub mod embeddings;
pub mod memory;
pub mod snapshots;
pub mod store;

pub use embeddings::{nearest_embeddings, vector_literal};
pub use memory::InMemorySnapshotStore;
pub use snapshots::{
    count_embeddings, count_snapshots, get_snapshots_by_ids, list_snapshots, purge_before,
    save_snapshot_with_embedding, SnapshotRow,
};
pub use store::{PgSnapshotStore, SnapshotStore, StoredSnapshot};

// Relative to crates/sentirag-db/Cargo.toml.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Pool sizing, normally taken from [`sentirag_core::AppConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 10,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &sentirag_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("could not decode stored row: {0}")]
    Decode(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Open a Postgres pool.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if no connection can be established within the
/// acquire timeout.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Apply pending migrations and return how many were newly applied.
///
/// # Errors
///
/// Returns [`DbError::Migration`] if a migration fails, or [`DbError::Sqlx`]
/// if the migration ledger cannot be read afterwards.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, DbError> {
    let before = applied_migrations(pool).await;
    MIGRATOR.run(pool).await?;
    let after = applied_migrations(pool).await;
    Ok(usize::try_from(after.saturating_sub(before)).unwrap_or(0))
}

// `_sqlx_migrations` does not exist before the first run; count that as zero.
async fn applied_migrations(pool: &PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success")
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}

/// Reject vectors whose length differs from [`sentirag_core::EMBEDDING_DIM`].
pub(crate) fn check_dimension(vector: &[f32]) -> Result<(), DbError> {
    if vector.len() == sentirag_core::EMBEDDING_DIM {
        Ok(())
    } else {
        Err(DbError::DimensionMismatch {
            expected: sentirag_core::EMBEDDING_DIM,
            actual: vector.len(),
        })
    }
}
