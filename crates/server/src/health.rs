use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use pricebot_core::config::AppConfig;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    config: AppConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub llm: HealthCheck,
    pub catalog: HealthCheck,
    pub checked_at: String,
}

pub fn router(config: AppConfig) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { config })
}

/// Readiness is configuration-based: the catalog and the completion endpoint
/// are only reachable at request time, so this reports whether the server
/// could in principle serve a turn.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let llm = llm_check(&state.config);
    let catalog = catalog_check(&state.config);
    let ready = llm.status == "ready" && catalog.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        llm,
        catalog,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn llm_check(config: &AppConfig) -> HealthCheck {
    match (&config.llm.endpoint, &config.llm.api_key) {
        (Some(_), Some(_)) => HealthCheck {
            status: "ready",
            detail: format!("deployment `{}` configured", config.llm.deployment),
        },
        (None, _) => HealthCheck { status: "degraded", detail: "llm.endpoint is not set".to_string() },
        (_, None) => HealthCheck { status: "degraded", detail: "llm.api_key is not set".to_string() },
    }
}

fn catalog_check(config: &AppConfig) -> HealthCheck {
    if config.catalog.base_url.is_empty() {
        HealthCheck { status: "degraded", detail: "catalog.base_url is not set".to_string() }
    } else {
        HealthCheck { status: "ready", detail: config.catalog.base_url.clone() }
    }
}
