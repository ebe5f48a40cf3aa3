//! Persistence collaborators.
//!
//! Every mutable record carries a `version` that the conditional update in
//! [`versioned`] checks and advances in one statement.

pub mod filters;
pub mod movies;
pub mod versioned;

use std::time::Duration;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;

pub use filters::Filters;
pub use movies::{Movie, MovieModel, Runtime, MOVIE_SORT_SAFELIST};
pub use versioned::{guard_update, Versioned};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("record not found")]
    RecordNotFound,

    #[error("edit conflict")]
    EditConflict,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub dsn: String,
    pub max_open_conns: u32,
    pub max_idle_time: Duration,
}

/// All models, sharing one pool.
#[derive(Debug, Clone)]
pub struct Models {
    pub pool: SqlitePool,
    pub movies: MovieModel,
}

impl Models {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            movies: MovieModel::new(pool.clone()),
            pool,
        }
    }

    /// Opens the pool and checks that the database answers.
    pub async fn connect(settings: &PoolSettings) -> ModelResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_open_conns)
            .idle_timeout(settings.max_idle_time)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&settings.dsn)
            .await?;

        let models = Self::new(pool);
        models.ping().await?;
        Ok(models)
    }

    pub async fn ping(&self) -> ModelResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn migrate(&self) -> ModelResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS movies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                title TEXT NOT NULL,
                year INTEGER NOT NULL,
                runtime INTEGER NOT NULL,
                genres TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) async fn test_models() -> Models {
    // A single connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let models = Models::new(pool);
    models.migrate().await.unwrap();
    models
}
