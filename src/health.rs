use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::data::Models;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub system_info: SystemInfo,
    pub dependencies: DependencyStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemInfo {
    pub environment: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub database: ServiceStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HealthChecker {
    environment: String,
    started_at: Instant,
}

impl HealthChecker {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            started_at: Instant::now(),
        }
    }

    pub async fn check_health(&self, models: &Models) -> HealthStatus {
        let database = Self::check_database(models).await;

        let overall_status = if database.status == "healthy" {
            "available"
        } else {
            "degraded"
        };

        HealthStatus {
            status: overall_status.to_string(),
            system_info: SystemInfo {
                environment: self.environment.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_seconds: self.started_at.elapsed().as_secs(),
            },
            dependencies: DependencyStatus { database },
        }
    }

    async fn check_database(models: &Models) -> ServiceStatus {
        let start = Instant::now();
        let result = models.ping().await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => ServiceStatus {
                status: "healthy".to_string(),
                response_time_ms,
                error: None,
            },
            Err(err) => ServiceStatus {
                status: "unavailable".to_string(),
                response_time_ms,
                error: Some(err.to_string()),
            },
        }
    }
}
