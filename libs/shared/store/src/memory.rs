use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use shared_models::interval::TimeInterval;
use shared_models::scheduling::{
    weekday_index, Appointment, BlockedInterval, WorkingHours,
};

#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    #[error("An active appointment already holds this slot")]
    DuplicateActiveAppointment,

    #[error("Record not found")]
    NotFound,
}

/// In-memory persistence for the scheduling engine.
///
/// Three tables behind async read-write locks, plus two keyed mutex
/// registries: one per (doctor, date) serializing reservations for that day
/// and one per (doctor, weekday) serializing merge scans over that
/// availability bucket. The uniqueness check inside `insert_appointment`
/// runs in the table's single write-lock section and is the final defense
/// against double booking, whatever the callers did beforehand.
pub struct SchedulingStore {
    working_hours: RwLock<Vec<WorkingHours>>,
    blocked_intervals: RwLock<Vec<BlockedInterval>>,
    appointments: RwLock<Vec<Appointment>>,
    day_locks: DashMap<(Uuid, NaiveDate), Arc<Mutex<()>>>,
    weekday_locks: DashMap<(Uuid, i32), Arc<Mutex<()>>>,
}

impl SchedulingStore {
    pub fn new() -> Self {
        Self {
            working_hours: RwLock::new(Vec::new()),
            blocked_intervals: RwLock::new(Vec::new()),
            appointments: RwLock::new(Vec::new()),
            day_locks: DashMap::new(),
            weekday_locks: DashMap::new(),
        }
    }

    // ==========================================================================
    // KEYED LOCKS
    // ==========================================================================

    /// Mutex serializing reservations for one doctor-day.
    pub fn day_lock(&self, doctor_id: Uuid, date: NaiveDate) -> Arc<Mutex<()>> {
        self.day_locks
            .entry((doctor_id, date))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Mutex serializing merge scans for one doctor-weekday bucket.
    pub fn weekday_lock(&self, doctor_id: Uuid, day_of_week: i32) -> Arc<Mutex<()>> {
        self.weekday_locks
            .entry((doctor_id, day_of_week))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ==========================================================================
    // WORKING HOURS
    // ==========================================================================

    pub async fn insert_working_hours(&self, row: WorkingHours) -> WorkingHours {
        debug!("Inserting working hours {} for doctor {}", row.id, row.doctor_id);
        let mut table = self.working_hours.write().await;
        table.push(row.clone());
        row
    }

    /// Delete the absorbed rows and insert the merged replacement in one
    /// write-lock section, so readers never observe the bucket half-rewritten.
    pub async fn replace_working_hours(
        &self,
        doctor_id: Uuid,
        absorbed_ids: &[Uuid],
        row: WorkingHours,
    ) -> WorkingHours {
        debug!(
            "Replacing {} working hours rows for doctor {} with {}",
            absorbed_ids.len(),
            doctor_id,
            row.id
        );
        let mut table = self.working_hours.write().await;
        table.retain(|existing| {
            existing.doctor_id != doctor_id || !absorbed_ids.contains(&existing.id)
        });
        table.push(row.clone());
        row
    }

    pub async fn remove_working_hours(
        &self,
        doctor_id: Uuid,
        id: Uuid,
    ) -> Result<WorkingHours, StoreError> {
        let mut table = self.working_hours.write().await;
        let position = table
            .iter()
            .position(|row| row.id == id && row.doctor_id == doctor_id)
            .ok_or(StoreError::NotFound)?;
        Ok(table.remove(position))
    }

    pub async fn working_hours_by_id(&self, doctor_id: Uuid, id: Uuid) -> Option<WorkingHours> {
        let table = self.working_hours.read().await;
        table
            .iter()
            .find(|row| row.id == id && row.doctor_id == doctor_id)
            .cloned()
    }

    /// Active rows for one doctor-weekday bucket, ascending by start time.
    pub async fn working_hours_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
    ) -> Vec<WorkingHours> {
        let table = self.working_hours.read().await;
        let mut rows: Vec<WorkingHours> = table
            .iter()
            .filter(|row| {
                row.doctor_id == doctor_id && row.day_of_week == day_of_week && row.is_active
            })
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.start_time);
        rows
    }

    pub async fn working_hours_for_doctor(&self, doctor_id: Uuid) -> Vec<WorkingHours> {
        let table = self.working_hours.read().await;
        let mut rows: Vec<WorkingHours> = table
            .iter()
            .filter(|row| row.doctor_id == doctor_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.day_of_week, row.start_time));
        rows
    }

    // ==========================================================================
    // BLOCKED INTERVALS
    // ==========================================================================

    pub async fn insert_blocked_interval(&self, row: BlockedInterval) -> BlockedInterval {
        debug!("Inserting blocked interval {} for doctor {}", row.id, row.doctor_id);
        let mut table = self.blocked_intervals.write().await;
        table.push(row.clone());
        row
    }

    pub async fn remove_blocked_interval(
        &self,
        doctor_id: Uuid,
        id: Uuid,
    ) -> Result<BlockedInterval, StoreError> {
        let mut table = self.blocked_intervals.write().await;
        let position = table
            .iter()
            .position(|row| row.id == id && row.doctor_id == doctor_id)
            .ok_or(StoreError::NotFound)?;
        Ok(table.remove(position))
    }

    pub async fn blocked_intervals_for_doctor(&self, doctor_id: Uuid) -> Vec<BlockedInterval> {
        let table = self.blocked_intervals.read().await;
        let mut rows: Vec<BlockedInterval> = table
            .iter()
            .filter(|row| row.doctor_id == doctor_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.date, row.start_time));
        rows
    }

    /// Blocks carving out time on `date`: exact-date matches plus recurring
    /// blocks anchored on the same weekday.
    pub async fn blocked_intervals_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Vec<BlockedInterval> {
        let table = self.blocked_intervals.read().await;
        let mut rows: Vec<BlockedInterval> = table
            .iter()
            .filter(|row| row.doctor_id == doctor_id && row.applies_on(date))
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.start_time);
        rows
    }

    // ==========================================================================
    // APPOINTMENTS
    // ==========================================================================

    /// Insert-or-fail. The active-status uniqueness check on
    /// (doctor, date, start_time) happens under the write lock together with
    /// the insert, so two racing callers cannot both succeed.
    pub async fn insert_appointment(
        &self,
        appointment: Appointment,
    ) -> Result<Appointment, StoreError> {
        let mut table = self.appointments.write().await;

        let taken = table.iter().any(|existing| {
            existing.doctor_id == appointment.doctor_id
                && existing.date == appointment.date
                && existing.start_time == appointment.start_time
                && existing.status.is_active()
        });
        if taken {
            debug!(
                "Rejected duplicate active appointment for doctor {} on {} at {}",
                appointment.doctor_id, appointment.date, appointment.start_time
            );
            return Err(StoreError::DuplicateActiveAppointment);
        }

        table.push(appointment.clone());
        Ok(appointment)
    }

    pub async fn appointment_by_id(&self, id: Uuid) -> Option<Appointment> {
        let table = self.appointments.read().await;
        table.iter().find(|row| row.id == id).cloned()
    }

    pub async fn update_appointment(
        &self,
        appointment: Appointment,
    ) -> Result<Appointment, StoreError> {
        let mut table = self.appointments.write().await;
        let slot = table
            .iter_mut()
            .find(|row| row.id == appointment.id)
            .ok_or(StoreError::NotFound)?;
        *slot = appointment.clone();
        Ok(appointment)
    }

    /// Slot-holding appointments for one doctor-day, ascending by start time.
    pub async fn active_appointments_for_day(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Vec<Appointment> {
        let table = self.appointments.read().await;
        let mut rows: Vec<Appointment> = table
            .iter()
            .filter(|row| row.doctor_id == doctor_id && row.date == date && row.status.is_active())
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.start_time);
        rows
    }

    pub async fn appointments_for_patient(&self, patient_id: Uuid) -> Vec<Appointment> {
        let table = self.appointments.read().await;
        let mut rows: Vec<Appointment> = table
            .iter()
            .filter(|row| row.patient_id == patient_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.date, row.start_time));
        rows
    }

    pub async fn appointments_for_doctor(&self, doctor_id: Uuid) -> Vec<Appointment> {
        let table = self.appointments.read().await;
        let mut rows: Vec<Appointment> = table
            .iter()
            .filter(|row| row.doctor_id == doctor_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.date, row.start_time));
        rows
    }

    /// Whether any active appointment on the given weekday starts inside
    /// `interval` on a date that has not yet passed. Today counts only while
    /// the appointment's start time is still ahead of `now_time`.
    pub async fn has_upcoming_appointment_in(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        interval: TimeInterval,
        today: NaiveDate,
        now_time: NaiveTime,
    ) -> bool {
        let table = self.appointments.read().await;
        table.iter().any(|row| {
            row.doctor_id == doctor_id
                && row.status.is_active()
                && weekday_index(row.date.weekday()) == day_of_week
                && interval.contains_time(row.start_time)
                && (row.date > today || (row.date == today && row.start_time >= now_time))
        })
    }
}

impl Default for SchedulingStore {
    fn default() -> Self {
        Self::new()
    }
}
