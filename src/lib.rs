pub mod background;
pub mod config;
pub mod config_validator;
pub mod data;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod rate_limiter;
pub mod response;
pub mod server;
pub mod shutdown;
pub mod token_bucket;
pub mod validation;

pub use background::BackgroundTasks;
pub use config::Config;
pub use error::{AppError, Result};
pub use handlers::AppState;
pub use rate_limiter::{ClientLimiter, LimiterConfig};
pub use server::{create_app, Server};
pub use shutdown::{ServeError, ShutdownCoordinator, ShutdownState};
