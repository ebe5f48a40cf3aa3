use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::background::BackgroundTasks;
use crate::config::Config;
use crate::data::{Filters, Models, Movie, Runtime, MOVIE_SORT_SAFELIST};
use crate::error::{AppError, Result};
use crate::health::HealthChecker;
use crate::rate_limiter::ClientLimiter;
use crate::response::{MessageEnvelope, MovieEnvelope, MoviesEnvelope};
use crate::validation::{validate_filters, validate_movie, FieldErrors};

/// Optional header carrying the version the client last read.
pub const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub models: Models,
    pub limiter: Arc<ClientLimiter>,
    pub tasks: BackgroundTasks,
    pub health: HealthChecker,
}

impl AppState {
    pub fn new(config: Config, models: Models) -> Self {
        let limiter = Arc::new(ClientLimiter::new(config.limiter_config()));
        let health = HealthChecker::new(config.env.clone());

        Self {
            config: Arc::new(config),
            models,
            limiter,
            tasks: BackgroundTasks::new(),
            health,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreateMovieRequest {
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMovieRequest {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

/// Query string of `GET /v1/movies`. Numbers stay raw so a bad value becomes
/// a field error instead of a rejected request.
#[derive(Debug, Default, Deserialize)]
pub struct ListMoviesQuery {
    pub title: Option<String>,
    pub genres: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
}

impl ListMoviesQuery {
    /// Title, genres and filters, or every field that failed to parse or
    /// validate.
    pub fn into_parts(self) -> std::result::Result<(String, Vec<String>, Filters), FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut filters = Filters::new("id", MOVIE_SORT_SAFELIST);

        filters.page = read_int(self.page.as_deref(), "page", filters.page, &mut errors);
        filters.page_size = read_int(self.page_size.as_deref(), "page_size", filters.page_size, &mut errors);
        if let Some(sort) = self.sort.filter(|s| !s.is_empty()) {
            filters.sort = sort;
        }

        validate_filters(&filters, errors)?;

        let genres = read_csv(self.genres.as_deref());
        Ok((self.title.unwrap_or_default(), genres, filters))
    }
}

fn read_int(raw: Option<&str>, key: &str, default: i64, errors: &mut FieldErrors) -> i64 {
    match raw {
        None | Some("") => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            errors
                .entry(key.to_string())
                .or_insert_with(|| "must be an integer value".to_string());
            default
        }),
    }
}

fn read_csv(raw: Option<&str>) -> Vec<String> {
    raw.map(|csv| {
        csv.split(',')
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn read_json<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn read_id(raw: &str) -> Result<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(AppError::NotFound),
    }
}

fn expected_version(headers: &HeaderMap) -> Result<Option<i32>> {
    headers
        .get(EXPECTED_VERSION_HEADER)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<i32>().ok())
                .ok_or_else(|| AppError::BadRequest(format!("invalid {EXPECTED_VERSION_HEADER} header")))
        })
        .transpose()
}

/// GET /v1/healthcheck
pub async fn healthcheck(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.health.check_health(&state.models).await)
}

/// GET /v1/movies
pub async fn list_movies(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListMoviesQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(query) = query.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let (title, genres, filters) = query.into_parts().map_err(AppError::FailedValidation)?;

    let movies = state.models.movies.get_all(&title, &genres, &filters).await?;
    Ok(Json(MoviesEnvelope::new(movies)))
}

/// POST /v1/movies
pub async fn create_movie(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateMovieRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let input = read_json(payload)?;
    let mut movie = Movie::draft(input.title, input.year, input.runtime, input.genres);

    validate_movie(&movie).map_err(AppError::FailedValidation)?;
    state.models.movies.insert(&mut movie).await?;

    let (movie_id, title) = (movie.id, movie.title.clone());
    state.tasks.launch(async move {
        info!(movie_id, %title, "Movie added to catalogue");
    });

    let location = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id))
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(MovieEnvelope::new(movie)),
    ))
}

/// GET /v1/movies/:id
pub async fn show_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = read_id(&id)?;
    let movie = state.models.movies.get(id).await?;
    Ok(Json(MovieEnvelope::new(movie)))
}

/// PATCH /v1/movies/:id
///
/// Conflicting writers get 409 and must re-fetch; nothing is retried here.
pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: std::result::Result<Json<UpdateMovieRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let id = read_id(&id)?;
    let mut movie = state.models.movies.get(id).await?;

    if let Some(expected) = expected_version(&headers)? {
        if expected != movie.version {
            return Err(AppError::EditConflict);
        }
    }

    let input = read_json(payload)?;
    if let Some(title) = input.title {
        movie.title = title;
    }
    if let Some(year) = input.year {
        movie.year = year;
    }
    if let Some(runtime) = input.runtime {
        movie.runtime = runtime;
    }
    if let Some(genres) = input.genres {
        movie.genres = genres;
    }

    validate_movie(&movie).map_err(AppError::FailedValidation)?;
    state.models.movies.update(&mut movie).await?;

    Ok(Json(MovieEnvelope::new(movie)))
}

/// DELETE /v1/movies/:id
pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = read_id(&id)?;
    state.models.movies.delete(id).await?;
    Ok(Json(MessageEnvelope::new("movie successfully deleted")))
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}

pub async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(method.to_string())
}
