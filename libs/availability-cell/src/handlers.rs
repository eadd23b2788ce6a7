use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_store::AppState;

use crate::models::{
    CreateBlockedIntervalRequest, CreateWorkingHoursRequest, ScheduleError, SlotsQuery,
};
use crate::services::{BlockedSlotStore, SlotGenerator, WorkingHoursRegistry};

fn map_schedule_error(error: ScheduleError) -> AppError {
    match error {
        ScheduleError::InvalidInterval(msg) => AppError::BadRequest(msg),
        ScheduleError::Validation(msg) => AppError::ValidationError(msg),
        ScheduleError::SlotInUse(msg) => AppError::Conflict(msg),
        ScheduleError::NotFound(msg) => AppError::NotFound(msg),
    }
}

// Only the doctor who owns the schedule, or an admin, may touch it
fn ensure_schedule_owner(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }
    if user.is_doctor() && user.id == doctor_id.to_string() {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "Not authorized to manage this doctor's schedule".to_string(),
    ))
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let generator = SlotGenerator::new(state.store.clone());
    let slots = generator.generate(doctor_id, query.date).await;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "available_slots": slots,
        "total_slots": slots.len()
    })))
}

// ==============================================================================
// PROTECTED WORKING HOURS HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_working_hours(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let registry = WorkingHoursRegistry::new(state.store.clone());
    let working_hours = registry.list(doctor_id).await;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "working_hours": working_hours,
        "total": working_hours.len()
    })))
}

#[axum::debug_handler]
pub async fn add_working_hours(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateWorkingHoursRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let registry = WorkingHoursRegistry::new(state.store.clone());
    let working_hours = registry
        .add(doctor_id, request, state.config.default_slot_duration_minutes)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "working_hours": working_hours
    })))
}

#[axum::debug_handler]
pub async fn remove_working_hours(
    State(state): State<AppState>,
    Path((doctor_id, working_hours_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let registry = WorkingHoursRegistry::new(state.store.clone());
    let removed = registry
        .remove(doctor_id, working_hours_id)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "removed": removed
    })))
}

// ==============================================================================
// PROTECTED BLOCKED INTERVAL HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_blocked_intervals(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let blocks = BlockedSlotStore::new(state.store.clone());
    let blocked = blocks.list(doctor_id).await;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "blocked_intervals": blocked,
        "total": blocked.len()
    })))
}

#[axum::debug_handler]
pub async fn add_blocked_interval(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBlockedIntervalRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let blocks = BlockedSlotStore::new(state.store.clone());
    let blocked = blocks
        .block(doctor_id, request)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "blocked_interval": blocked
    })))
}

#[axum::debug_handler]
pub async fn remove_blocked_interval(
    State(state): State<AppState>,
    Path((doctor_id, blocked_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_schedule_owner(&user, doctor_id)?;

    let blocks = BlockedSlotStore::new(state.store.clone());
    let removed = blocks
        .unblock(doctor_id, blocked_id)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "removed": removed
    })))
}
