use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_store::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: AppState) -> Router {
    // Every appointment route requires authentication
    Router::new()
        .route("/", post(handlers::reserve_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_appointments))
        // Lifecycle transitions
        .route("/{appointment_id}/accept", post(handlers::accept_appointment))
        .route("/{appointment_id}/reject", post(handlers::reject_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        // Payment gateway callbacks
        .route("/{appointment_id}/payment/confirm", post(handlers::confirm_payment))
        .route("/{appointment_id}/payment/fail", post(handlers::fail_payment))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ))
        .with_state(state)
}
