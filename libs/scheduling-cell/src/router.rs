// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::booking::SchedulingService;

pub fn scheduling_routes(config: Arc<AppConfig>, service: Arc<SchedulingService>) -> Router {
    // Every scheduling operation acts on behalf of an authenticated patient
    let protected_routes = Router::new()
        .route(
            "/appointments",
            post(handlers::book_appointment).get(handlers::list_appointments),
        )
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route(
            "/slots/{facility_id}/{exam_id}/{date}/{time}",
            get(handlers::get_slot_availability),
        )
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(service)
}
