use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_store::AppState;

use crate::models::{
    BookingError, CancelAppointmentRequest, ConfirmPaymentRequest, RejectAppointmentRequest,
    ReserveAppointmentRequest,
};
use crate::services::BookingLedger;

fn map_booking_error(error: BookingError) -> AppError {
    match error {
        BookingError::InvalidSlot(msg) => AppError::BadRequest(msg),
        BookingError::SlotUnavailable(msg) => AppError::Conflict(msg),
        e @ BookingError::InvalidTransition { .. } => AppError::BadRequest(e.to_string()),
        BookingError::Forbidden(msg) => AppError::Forbidden(msg),
        BookingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
    }
}

// Token subjects are user uuids; anything else cannot act on appointments
fn actor_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

// ==============================================================================
// RESERVATION AND QUERY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn reserve_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<ReserveAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    // Patients reserve for themselves; admins may reserve on a patient's behalf
    let is_patient = request.patient_id.to_string() == user.id;
    if !is_patient && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to reserve an appointment for this patient".to_string(),
        ));
    }

    let ledger = BookingLedger::new(state.store.clone());
    let appointment = ledger.reserve(request).await.map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment reserved successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ledger = BookingLedger::new(state.store.clone());
    let appointment = ledger
        .get(appointment_id)
        .await
        .map_err(map_booking_error)?;

    // Only the participants or an admin may view
    let is_patient = appointment.patient_id.to_string() == user.id;
    let is_doctor = appointment.doctor_id.to_string() == user.id;
    if !is_patient && !is_doctor && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let is_own = patient_id.to_string() == user.id;
    if !is_own && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient's appointments".to_string(),
        ));
    }

    let ledger = BookingLedger::new(state.store.clone());
    let appointments = ledger.list_for_patient(patient_id).await;

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let is_own = doctor_id.to_string() == user.id;
    if !is_own && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this doctor's appointments".to_string(),
        ));
    }

    let ledger = BookingLedger::new(state.store.clone());
    let appointments = ledger.list_for_doctor(doctor_id).await;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn accept_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;
    let ledger = BookingLedger::new(state.store.clone());
    let appointment = ledger
        .accept(appointment_id, actor)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment accepted successfully"
    })))
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RejectAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;
    let ledger = BookingLedger::new(state.store.clone());
    let appointment = ledger
        .reject(appointment_id, actor, request.reason)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rejected successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;
    let ledger = BookingLedger::new(state.store.clone());
    let appointment = ledger
        .cancel(appointment_id, actor, request.reason)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_id(&user)?;
    let ledger = BookingLedger::new(state.store.clone());
    let appointment = ledger
        .complete(appointment_id, actor)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment completed successfully"
    })))
}

// ==============================================================================
// PAYMENT CALLBACK HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    // Payment callbacks come from the gateway's service account
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the payment service can report payment results".to_string(),
        ));
    }

    let ledger = BookingLedger::new(state.store.clone());
    let appointment = ledger
        .mark_paid(appointment_id, request.payment_reference)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Payment confirmed successfully"
    })))
}

#[axum::debug_handler]
pub async fn fail_payment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the payment service can report payment results".to_string(),
        ));
    }

    let ledger = BookingLedger::new(state.store.clone());
    let appointment = ledger
        .mark_payment_failed(appointment_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Payment failure recorded"
    })))
}
