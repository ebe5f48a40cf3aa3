use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::types::Json;
use sqlx::SqlitePool;

use super::filters::Filters;
use super::versioned::{guard_update, Versioned};
use super::{ModelError, ModelResult};

/// Accepted `sort` values for movie listings.
pub const MOVIE_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Movie {
    pub id: i64,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub year: i32,
    #[serde(skip_serializing_if = "Runtime::is_zero")]
    pub runtime: Runtime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[sqlx(json)]
    pub genres: Vec<String>,
    pub version: i32,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

impl Movie {
    /// A movie that has not been inserted yet.
    pub fn draft(title: impl Into<String>, year: i32, runtime: Runtime, genres: Vec<String>) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            title: title.into(),
            year,
            runtime,
            genres,
            version: 1,
        }
    }
}

impl Versioned for Movie {
    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }
}

/// Movie length in minutes, written as `"<n> mins"` in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(transparent)]
pub struct Runtime(pub i32);

impl Runtime {
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid runtime format")]
pub struct InvalidRuntimeFormat;

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl FromStr for Runtime {
    type Err = InvalidRuntimeFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split(' ').collect::<Vec<_>>().as_slice() {
            [minutes, "mins"] => minutes
                .parse::<i32>()
                .map(Runtime)
                .map_err(|_| InvalidRuntimeFormat),
            _ => Err(InvalidRuntimeFormat),
        }
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone)]
pub struct MovieModel {
    pool: SqlitePool,
}

impl MovieModel {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts `movie` and fills in its id, creation time and version.
    pub async fn insert(&self, movie: &mut Movie) -> ModelResult<()> {
        let (id, created_at, version): (i64, DateTime<Utc>, i32) = sqlx::query_as(
            r#"
            INSERT INTO movies (created_at, title, year, runtime, genres)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, created_at, version
            "#,
        )
        .bind(Utc::now())
        .bind(&movie.title)
        .bind(movie.year)
        .bind(movie.runtime)
        .bind(Json(&movie.genres))
        .fetch_one(&self.pool)
        .await?;

        movie.id = id;
        movie.created_at = created_at;
        movie.version = version;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> ModelResult<Movie> {
        if id < 1 {
            return Err(ModelError::RecordNotFound);
        }

        sqlx::query_as::<_, Movie>(
            r#"
            SELECT id, created_at, title, year, runtime, genres, version
            FROM movies
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ModelError::RecordNotFound)
    }

    /// Movies whose title contains `title` (case-insensitive, empty matches
    /// all) and whose genres include every entry of `genres`, one page of
    /// them in `filters` order. Ties are broken by id.
    pub async fn get_all(&self, title: &str, genres: &[String], filters: &Filters) -> ModelResult<Vec<Movie>> {
        let query = format!(
            r#"
            SELECT id, created_at, title, year, runtime, genres, version
            FROM movies
            WHERE (instr(lower(title), lower(?)) > 0 OR ? = '')
            AND NOT EXISTS (
                SELECT 1 FROM json_each(?) AS wanted
                WHERE wanted.value NOT IN (SELECT value FROM json_each(movies.genres))
            )
            ORDER BY {} {}, id ASC
            LIMIT ? OFFSET ?
            "#,
            filters.sort_column(),
            filters.sort_direction()
        );

        let movies = sqlx::query_as::<_, Movie>(&query)
            .bind(title)
            .bind(title)
            .bind(Json(genres))
            .bind(filters.limit())
            .bind(filters.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(movies)
    }

    /// Writes every mutable field of `movie` if its stored version still
    /// equals `movie.version`; on success `movie.version` is advanced.
    pub async fn update(&self, movie: &mut Movie) -> ModelResult<()> {
        let new_version: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE movies
            SET title = ?, year = ?, runtime = ?, genres = ?, version = version + 1
            WHERE id = ? AND version = ?
            RETURNING version
            "#,
        )
        .bind(&movie.title)
        .bind(movie.year)
        .bind(movie.runtime)
        .bind(Json(&movie.genres))
        .bind(movie.id)
        .bind(movie.version)
        .fetch_optional(&self.pool)
        .await?;

        guard_update(movie, new_version)?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> ModelResult<()> {
        if id < 1 {
            return Err(ModelError::RecordNotFound);
        }

        let result = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ModelError::RecordNotFound);
        }
        Ok(())
    }
}
