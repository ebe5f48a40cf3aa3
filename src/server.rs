use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::data::{ModelError, Models};
use crate::handlers::{
    create_movie, delete_movie, healthcheck, list_movies, method_not_allowed, not_found,
    show_movie, update_movie, AppState,
};
use crate::middleware::{logging_middleware, panic_response, rate_limit};
use crate::shutdown::{shutdown_signal, ServeError, ShutdownCoordinator};

/// Builds the router with every middleware layer applied.
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let timeout = request_timeout_layer(&state.config);
    let limiter = Arc::clone(&state.limiter);

    Router::new()
        .route("/v1/healthcheck", get(healthcheck).fallback(method_not_allowed))
        .route(
            "/v1/movies",
            get(list_movies).post(create_movie).fallback(method_not_allowed),
        )
        .route(
            "/v1/movies/:id",
            get(show_movie)
                .patch(update_movie)
                .delete(delete_movie)
                .fallback(method_not_allowed),
        )
        .fallback(not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(TraceLayer::new_for_http())
                .layer(timeout)
                .layer(cors)
                .layer(middleware::from_fn(logging_middleware))
                .layer(middleware::from_fn_with_state(limiter, rate_limit)),
        )
}

/// Answers 408 once a request has been in flight for the configured time,
/// so a stalled client cannot hold its connection (and the drain) open.
pub fn request_timeout_layer(config: &Config) -> TimeoutLayer {
    TimeoutLayer::new(config.request_timeout())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_trusted_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        return if config.is_development() {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
        };
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub struct Server {
    state: AppState,
}

impl Server {
    /// Connects to the database and prepares the schema.
    pub async fn new(config: Config) -> Result<Self, ModelError> {
        let models = Models::connect(&config.pool_settings()).await?;
        models.migrate().await?;
        info!("Database connection pool established");

        Ok(Self {
            state: AppState::new(config, models),
        })
    }

    /// Serves until SIGINT or SIGTERM, then drains.
    pub async fn run(self) -> Result<(), ServeError> {
        let config = Arc::clone(&self.state.config);
        let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;

        info!(env = %config.env, "Health check available at /v1/healthcheck");

        let coordinator = ShutdownCoordinator::new(config.drain_deadline(), self.state.tasks.clone());
        let sweeper = self.state.limiter.spawn_sweeper();

        let app = create_app(self.state.clone());
        let result = coordinator.serve(listener, app, shutdown_signal()).await;

        sweeper.abort();
        self.state.models.pool.close().await;
        result
    }
}
