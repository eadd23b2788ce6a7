use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_store::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn availability_routes(state: AppState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/doctors/{doctor_id}/slots", get(handlers::get_available_slots));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        // Weekly working hours
        .route("/doctors/{doctor_id}/working-hours", get(handlers::list_working_hours))
        .route("/doctors/{doctor_id}/working-hours", post(handlers::add_working_hours))
        .route(
            "/doctors/{doctor_id}/working-hours/{working_hours_id}",
            delete(handlers::remove_working_hours),
        )
        // Ad-hoc blocked intervals
        .route("/doctors/{doctor_id}/blocked", get(handlers::list_blocked_intervals))
        .route("/doctors/{doctor_id}/blocked", post(handlers::add_blocked_interval))
        .route(
            "/doctors/{doctor_id}/blocked/{blocked_id}",
            delete(handlers::remove_blocked_interval),
        )
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
