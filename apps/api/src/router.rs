use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;

use scheduling_cell::{scheduling_routes, SchedulingService};
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, service: Arc<SchedulingService>) -> Router {
    Router::new()
        .route("/", get(|| async { "Cita Salud scheduling API is running!" }))
        .route(
            "/health",
            get(|| async { Json(json!({ "status": "healthy", "service": "scheduling" })) }),
        )
        .merge(scheduling_routes(config, service))
}
