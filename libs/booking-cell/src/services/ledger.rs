use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::services::SlotGenerator;
use shared_models::scheduling::{
    weekday_index, Appointment, AppointmentStatus, CancelledBy, PaymentStatus, Slot,
};
use shared_store::memory::{SchedulingStore, StoreError};

use crate::models::{BookingError, ReserveAppointmentRequest};
use crate::services::events::{DomainEvent, EventSink, TracingEventSink};
use crate::services::lifecycle::AppointmentLifecycle;

/// Owns every appointment state change. Reservations run under the doctor-day
/// lock with the store's insert-or-fail as the last line against double
/// booking; lifecycle moves all pass through `AppointmentLifecycle`.
pub struct BookingLedger {
    store: Arc<SchedulingStore>,
    lifecycle: AppointmentLifecycle,
    events: Arc<dyn EventSink>,
}

impl BookingLedger {
    pub fn new(store: Arc<SchedulingStore>) -> Self {
        Self::with_events(store, Arc::new(TracingEventSink))
    }

    pub fn with_events(store: Arc<SchedulingStore>, events: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            lifecycle: AppointmentLifecycle::new(),
            events,
        }
    }

    // ==========================================================================
    // RESERVATION
    // ==========================================================================

    pub async fn reserve(
        &self,
        request: ReserveAppointmentRequest,
    ) -> Result<Appointment, BookingError> {
        self.reserve_at(request, Utc::now()).await
    }

    /// Atomic reservation. The admission re-check and the insert both happen
    /// while holding the (doctor, date) mutex, so two racing reservations for
    /// the same slot serialize and the loser sees it taken.
    pub async fn reserve_at(
        &self,
        request: ReserveAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, BookingError> {
        debug!(
            "Reserving {} at {} for patient {} with doctor {}",
            request.date, request.start_time, request.patient_id, request.doctor_id
        );

        let lock = self.store.day_lock(request.doctor_id, request.date);
        let _guard = lock.lock().await;

        let slot = self.admit_slot(&request, now).await?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            patient_id: request.patient_id,
            date: request.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: AppointmentStatus::Pending,
            payment_status: PaymentStatus::Pending,
            appointment_type: request.appointment_type.unwrap_or_default(),
            notes: request.notes,
            rejection_reason: None,
            cancellation_reason: None,
            cancelled_by: None,
            payment_reference: None,
            payment_time: None,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .store
            .insert_appointment(appointment)
            .await
            .map_err(|e| match e {
                StoreError::DuplicateActiveAppointment => BookingError::SlotUnavailable(
                    "An active appointment already holds this slot".to_string(),
                ),
                StoreError::NotFound => BookingError::NotFound,
            })?;

        info!(
            "Appointment {} reserved with doctor {} on {} at {}",
            created.id, created.doctor_id, created.date, created.start_time
        );
        self.events
            .emit(DomainEvent::AppointmentReserved {
                appointment_id: created.id,
                doctor_id: created.doctor_id,
                patient_id: created.patient_id,
            })
            .await;

        Ok(created)
    }

    /// Single-slot admission: the shape checks that make the request a valid
    /// slot candidate, then one pass of the generator's filters restricted to
    /// the requested start time.
    async fn admit_slot(
        &self,
        request: &ReserveAppointmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Slot, BookingError> {
        if request.date < now.date_naive() {
            return Err(BookingError::SlotUnavailable(
                "The requested date has passed".to_string(),
            ));
        }

        let day_of_week = weekday_index(request.date.weekday());
        let schedules = self
            .store
            .working_hours_for_day(request.doctor_id, day_of_week)
            .await;
        let Some(schedule) = schedules
            .iter()
            .find(|row| row.interval().contains_time(request.start_time))
        else {
            return Err(BookingError::SlotUnavailable(
                "Outside the doctor's working hours".to_string(),
            ));
        };

        // The hosting row defines the stride grid
        let offset_minutes = request
            .start_time
            .signed_duration_since(schedule.start_time)
            .num_minutes();
        if offset_minutes % schedule.slot_duration_minutes as i64 != 0 {
            return Err(BookingError::InvalidSlot(
                "Start time does not fall on a slot boundary".to_string(),
            ));
        }

        // Fit, blocks, held slots and the same-day cutoff are exactly the
        // generator's filters; reuse them rather than restating the rules.
        let generator = SlotGenerator::new(self.store.clone());
        let open_slots = generator
            .generate_at(request.doctor_id, request.date, now)
            .await;

        open_slots
            .into_iter()
            .find(|slot| slot.start_time == request.start_time)
            .ok_or_else(|| {
                warn!(
                    "Slot {} on {} for doctor {} not admissible",
                    request.start_time, request.date, request.doctor_id
                );
                BookingError::SlotUnavailable(
                    "The slot is blocked, already taken, or has passed".to_string(),
                )
            })
    }

    // ==========================================================================
    // LIFECYCLE TRANSITIONS
    // ==========================================================================

    /// Doctor accepts a pending request.
    pub async fn accept(
        &self,
        appointment_id: Uuid,
        by_doctor: Uuid,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.load(appointment_id).await?;
        self.ensure_owning_doctor(&appointment, by_doctor)?;
        self.lifecycle
            .validate_transition(&appointment.status, &AppointmentStatus::Accepted)?;

        appointment.status = AppointmentStatus::Accepted;
        appointment.updated_at = Utc::now();
        let updated = self.persist(appointment).await?;

        self.events
            .emit(DomainEvent::AppointmentAccepted {
                appointment_id: updated.id,
                doctor_id: updated.doctor_id,
            })
            .await;
        Ok(updated)
    }

    /// Doctor turns down a pending request.
    pub async fn reject(
        &self,
        appointment_id: Uuid,
        by_doctor: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.load(appointment_id).await?;
        self.ensure_owning_doctor(&appointment, by_doctor)?;
        self.lifecycle
            .validate_transition(&appointment.status, &AppointmentStatus::Rejected)?;

        appointment.status = AppointmentStatus::Rejected;
        appointment.rejection_reason = reason;
        appointment.updated_at = Utc::now();
        let updated = self.persist(appointment).await?;

        self.events
            .emit(DomainEvent::AppointmentRejected {
                appointment_id: updated.id,
                doctor_id: updated.doctor_id,
            })
            .await;
        Ok(updated)
    }

    /// Either participant backs out; which side cancelled is derived from the
    /// actor, not taken from the request.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        by_actor: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.load(appointment_id).await?;

        let cancelled_by = if by_actor == appointment.patient_id {
            CancelledBy::Patient
        } else if by_actor == appointment.doctor_id {
            CancelledBy::Doctor
        } else {
            return Err(BookingError::Forbidden(
                "Only the patient or the doctor on the appointment can cancel it".to_string(),
            ));
        };

        self.lifecycle
            .validate_transition(&appointment.status, &AppointmentStatus::Cancelled)?;

        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancellation_reason = reason;
        appointment.cancelled_by = Some(cancelled_by.clone());
        appointment.updated_at = Utc::now();
        let updated = self.persist(appointment).await?;

        info!(
            "Appointment {} cancelled by {}",
            updated.id,
            match cancelled_by {
                CancelledBy::Patient => "patient",
                CancelledBy::Doctor => "doctor",
            }
        );
        self.events
            .emit(DomainEvent::AppointmentCancelled {
                appointment_id: updated.id,
                cancelled_by,
            })
            .await;
        Ok(updated)
    }

    /// Doctor marks the visit as done.
    pub async fn complete(
        &self,
        appointment_id: Uuid,
        by_doctor: Uuid,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.load(appointment_id).await?;
        self.ensure_owning_doctor(&appointment, by_doctor)?;
        self.lifecycle
            .validate_transition(&appointment.status, &AppointmentStatus::Completed)?;

        appointment.status = AppointmentStatus::Completed;
        appointment.updated_at = Utc::now();
        let updated = self.persist(appointment).await?;

        self.events
            .emit(DomainEvent::AppointmentCompleted {
                appointment_id: updated.id,
                doctor_id: updated.doctor_id,
            })
            .await;
        Ok(updated)
    }

    // ==========================================================================
    // PAYMENT CALLBACKS
    // ==========================================================================

    /// Gateway confirmed payment: record the reference and advance
    /// accepted -> confirmed.
    pub async fn mark_paid(
        &self,
        appointment_id: Uuid,
        payment_reference: String,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.load(appointment_id).await?;
        self.lifecycle
            .validate_transition(&appointment.status, &AppointmentStatus::Confirmed)?;

        appointment.status = AppointmentStatus::Confirmed;
        appointment.payment_status = PaymentStatus::Paid;
        appointment.payment_reference = Some(payment_reference.clone());
        appointment.payment_time = Some(Utc::now());
        appointment.updated_at = Utc::now();
        let updated = self.persist(appointment).await?;

        info!(
            "Appointment {} confirmed, payment reference {}",
            updated.id, payment_reference
        );
        self.events
            .emit(DomainEvent::PaymentConfirmed {
                appointment_id: updated.id,
                payment_reference,
            })
            .await;
        Ok(updated)
    }

    /// Gateway reported a failed charge. The lifecycle stays at accepted so
    /// the patient can retry or cancel; only the payment sub-state moves.
    pub async fn mark_payment_failed(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.load(appointment_id).await?;

        // Payment callbacks only apply while the appointment awaits payment
        if appointment.status != AppointmentStatus::Accepted {
            return Err(BookingError::InvalidTransition {
                from: appointment.status,
                to: AppointmentStatus::Accepted,
            });
        }

        appointment.payment_status = PaymentStatus::Failed;
        appointment.updated_at = Utc::now();
        let updated = self.persist(appointment).await?;

        warn!("Payment failed for appointment {}", updated.id);
        self.events
            .emit(DomainEvent::PaymentFailed {
                appointment_id: updated.id,
            })
            .await;
        Ok(updated)
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.load(appointment_id).await
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> Vec<Appointment> {
        self.store.appointments_for_patient(patient_id).await
    }

    pub async fn list_for_doctor(&self, doctor_id: Uuid) -> Vec<Appointment> {
        self.store.appointments_for_doctor(doctor_id).await
    }

    // ==========================================================================
    // INTERNALS
    // ==========================================================================

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.store
            .appointment_by_id(appointment_id)
            .await
            .ok_or(BookingError::NotFound)
    }

    async fn persist(&self, appointment: Appointment) -> Result<Appointment, BookingError> {
        self.store
            .update_appointment(appointment)
            .await
            .map_err(|_| BookingError::NotFound)
    }

    fn ensure_owning_doctor(
        &self,
        appointment: &Appointment,
        by_doctor: Uuid,
    ) -> Result<(), BookingError> {
        if appointment.doctor_id != by_doctor {
            return Err(BookingError::Forbidden(
                "Only the appointment's doctor can perform this action".to_string(),
            ));
        }
        Ok(())
    }
}
