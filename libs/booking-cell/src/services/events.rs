use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use shared_models::scheduling::CancelledBy;

/// Facts the ledger publishes after each committed transition. Consumers
/// (notifiers, audit trails) subscribe through `EventSink`; delivery is
/// fire-and-forget and never gates the booking flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    AppointmentReserved {
        appointment_id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
    },
    AppointmentAccepted {
        appointment_id: Uuid,
        doctor_id: Uuid,
    },
    AppointmentRejected {
        appointment_id: Uuid,
        doctor_id: Uuid,
    },
    AppointmentCancelled {
        appointment_id: Uuid,
        cancelled_by: CancelledBy,
    },
    AppointmentCompleted {
        appointment_id: Uuid,
        doctor_id: Uuid,
    },
    PaymentConfirmed {
        appointment_id: Uuid,
        payment_reference: String,
    },
    PaymentFailed {
        appointment_id: Uuid,
    },
}

/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: DomainEvent);
}

/// Default sink: structured log lines, nothing else.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: DomainEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => info!("Domain event: {}", payload),
            Err(_) => info!("Domain event: {:?}", event),
        }
    }
}
