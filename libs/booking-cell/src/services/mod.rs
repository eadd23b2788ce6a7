pub mod events;
pub mod ledger;
pub mod lifecycle;

pub use events::{DomainEvent, EventSink, TracingEventSink};
pub use ledger::BookingLedger;
pub use lifecycle::AppointmentLifecycle;
