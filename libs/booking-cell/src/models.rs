use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::scheduling::{AppointmentStatus, AppointmentType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub appointment_type: Option<AppointmentType>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_reference: String,
}

// ==============================================================================
// ERROR HANDLING
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Slot not available: {0}")]
    SlotUnavailable(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Not authorized: {0}")]
    Forbidden(String),

    #[error("Appointment not found")]
    NotFound,
}
