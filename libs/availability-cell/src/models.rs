use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkingHoursRequest {
    pub day_of_week: i32, // 0 = Monday, 6 = Sunday
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBlockedIntervalRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: Option<String>,
    pub is_recurring: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// ERROR HANDLING
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Schedule in use: {0}")]
    SlotInUse(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
