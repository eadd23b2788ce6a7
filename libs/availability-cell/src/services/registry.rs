use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::interval::TimeInterval;
use shared_models::scheduling::WorkingHours;
use shared_store::memory::SchedulingStore;

use crate::models::{CreateWorkingHoursRequest, ScheduleError};

pub struct WorkingHoursRegistry {
    store: Arc<SchedulingStore>,
}

impl WorkingHoursRegistry {
    pub fn new(store: Arc<SchedulingStore>) -> Self {
        Self { store }
    }

    /// Register a weekly working-hours interval for a doctor.
    ///
    /// Overlapping intervals on the same weekday are coalesced into a single
    /// row covering their union. The stored row keeps the slot duration of the
    /// incoming request, not of the rows it absorbed.
    pub async fn add(
        &self,
        doctor_id: Uuid,
        request: CreateWorkingHoursRequest,
        default_slot_duration_minutes: i32,
    ) -> Result<WorkingHours, ScheduleError> {
        debug!(
            "Adding working hours for doctor {} on day {}",
            doctor_id, request.day_of_week
        );

        if request.day_of_week < 0 || request.day_of_week > 6 {
            return Err(ScheduleError::Validation(
                "Day of week must be between 0 (Monday) and 6 (Sunday)".to_string(),
            ));
        }

        let duration = request
            .slot_duration_minutes
            .unwrap_or(default_slot_duration_minutes);
        let interval = TimeInterval::new(request.start_time, request.end_time);
        validate_working_interval(&interval, duration)?;

        // Serialize concurrent edits to the same doctor/weekday bucket so the
        // merge scan and the write land atomically.
        let lock = self.store.weekday_lock(doctor_id, request.day_of_week);
        let _guard = lock.lock().await;

        let existing = self
            .store
            .working_hours_for_day(doctor_id, request.day_of_week)
            .await;
        let (merged, absorbed) = absorb_overlapping(interval, &existing);

        let row = WorkingHours {
            id: Uuid::new_v4(),
            doctor_id,
            day_of_week: request.day_of_week,
            start_time: merged.start,
            end_time: merged.end,
            slot_duration_minutes: duration,
            is_active: true,
            created_at: Utc::now(),
        };

        if absorbed.is_empty() {
            self.store.insert_working_hours(row.clone()).await;
        } else {
            info!(
                "Coalesced {} overlapping working-hours rows into {} for doctor {}",
                absorbed.len(),
                merged,
                doctor_id
            );
            self.store
                .replace_working_hours(doctor_id, &absorbed, row.clone())
                .await;
        }

        Ok(row)
    }

    /// Remove a working-hours row, refusing while upcoming active appointments
    /// still sit inside it.
    pub async fn remove(&self, doctor_id: Uuid, id: Uuid) -> Result<WorkingHours, ScheduleError> {
        self.remove_at(doctor_id, id, Utc::now()).await
    }

    pub async fn remove_at(
        &self,
        doctor_id: Uuid,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<WorkingHours, ScheduleError> {
        let row = self
            .store
            .working_hours_by_id(doctor_id, id)
            .await
            .ok_or_else(|| ScheduleError::NotFound("Working hours not found".to_string()))?;

        let in_use = self
            .store
            .has_upcoming_appointment_in(
                doctor_id,
                row.day_of_week,
                row.interval(),
                now.date_naive(),
                now.time(),
            )
            .await;
        if in_use {
            warn!(
                "Refusing to remove working hours {} for doctor {}: upcoming appointments rely on them",
                id, doctor_id
            );
            return Err(ScheduleError::SlotInUse(
                "Upcoming appointments are scheduled within these working hours".to_string(),
            ));
        }

        self.store
            .remove_working_hours(doctor_id, id)
            .await
            .map_err(|_| ScheduleError::NotFound("Working hours not found".to_string()))
    }

    pub async fn list(&self, doctor_id: Uuid) -> Vec<WorkingHours> {
        self.store.working_hours_for_doctor(doctor_id).await
    }
}

fn validate_working_interval(
    interval: &TimeInterval,
    slot_duration_minutes: i32,
) -> Result<(), ScheduleError> {
    if !interval.is_well_formed() {
        return Err(ScheduleError::InvalidInterval(
            "Start time must be before end time".to_string(),
        ));
    }
    if slot_duration_minutes <= 0 {
        return Err(ScheduleError::InvalidInterval(
            "Slot duration must be positive".to_string(),
        ));
    }
    if interval.duration_minutes() < slot_duration_minutes as i64 {
        return Err(ScheduleError::InvalidInterval(
            "Interval is shorter than one slot".to_string(),
        ));
    }
    Ok(())
}

/// Expand `candidate` over every row it overlaps, returning the final hull and
/// the ids of the rows it swallowed.
///
/// Each absorption can widen the candidate into rows the scan already passed,
/// so the scan repeats until a full pass absorbs nothing.
fn absorb_overlapping(candidate: TimeInterval, rows: &[WorkingHours]) -> (TimeInterval, Vec<Uuid>) {
    let mut hull = candidate;
    let mut absorbed: Vec<Uuid> = Vec::new();

    loop {
        let mut widened = false;
        for row in rows {
            if absorbed.contains(&row.id) {
                continue;
            }
            let row_interval = row.interval();
            if hull.overlaps(&row_interval) {
                if let Some(merged) = hull.merge(&row_interval) {
                    hull = merged;
                }
                absorbed.push(row.id);
                widened = true;
            }
        }
        if !widened {
            break;
        }
    }

    (hull, absorbed)
}
