// libs/doctor-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        // Schedule repository
        .route("/{doctor_id}/schedules", get(handlers::list_schedules))
        .route("/{doctor_id}/schedules", post(handlers::create_schedule))
        .route("/schedules/{schedule_id}", patch(handlers::update_schedule))
        .route("/schedules/{schedule_id}", delete(handlers::deactivate_schedule))
        .route("/{doctor_id}/exceptions", get(handlers::list_exceptions))
        .route("/{doctor_id}/exceptions", post(handlers::create_exception))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
