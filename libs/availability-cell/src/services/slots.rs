use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_models::interval::TimeInterval;
use shared_models::scheduling::{weekday_index, Appointment, BlockedInterval, Slot, WorkingHours};
use shared_store::memory::SchedulingStore;

/// Derives the bookable slots for a doctor-day from working hours, blocked
/// intervals and appointments already on the books. Nothing is stored; every
/// call recomputes from the current tables.
pub struct SlotGenerator {
    store: Arc<SchedulingStore>,
}

impl SlotGenerator {
    pub fn new(store: Arc<SchedulingStore>) -> Self {
        Self { store }
    }

    pub async fn generate(&self, doctor_id: Uuid, date: NaiveDate) -> Vec<Slot> {
        self.generate_at(doctor_id, date, Utc::now()).await
    }

    /// Same as `generate`, with the clock injected for same-day cutoffs.
    pub async fn generate_at(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Vec<Slot> {
        let day_of_week = weekday_index(date.weekday());
        let schedules = self.store.working_hours_for_day(doctor_id, day_of_week).await;
        if schedules.is_empty() {
            debug!("No working hours for doctor {} on {}", doctor_id, date);
            return Vec::new();
        }

        let blocks = self.store.blocked_intervals_on(doctor_id, date).await;
        let booked = self.store.active_appointments_for_day(doctor_id, date).await;

        let mut slots = Vec::new();
        for schedule in &schedules {
            collect_slots_for_schedule(schedule, date, &blocks, &booked, &mut slots);
        }

        // Same-day requests cannot see slots that have already started
        if date == now.date_naive() {
            let now_time = now.time();
            slots.retain(|slot| slot.start_time > now_time);
        }

        slots.sort_by_key(|slot| slot.start_time);

        debug!(
            "Generated {} bookable slots for doctor {} on {}",
            slots.len(),
            doctor_id,
            date
        );
        slots
    }
}

/// Walk the schedule in strides of its slot duration, keeping every stride
/// that clears the blocks and the held appointments. A trailing remainder
/// shorter than one slot is discarded.
fn collect_slots_for_schedule(
    schedule: &WorkingHours,
    date: NaiveDate,
    blocks: &[BlockedInterval],
    booked: &[Appointment],
    out: &mut Vec<Slot>,
) {
    let duration = Duration::minutes(schedule.slot_duration_minutes as i64);
    let start_datetime = date.and_time(schedule.start_time).and_utc();
    let end_datetime = date.and_time(schedule.end_time).and_utc();

    let mut current_time = start_datetime;
    while current_time + duration <= end_datetime {
        let slot_end = current_time + duration;
        let candidate = TimeInterval::new(current_time.time(), slot_end.time());

        let blocked = blocks
            .iter()
            .any(|block| candidate.overlaps(&block.interval()));
        let held = booked
            .iter()
            .any(|appointment| candidate.overlaps(&appointment.interval()));

        if !blocked && !held {
            out.push(Slot {
                doctor_id: schedule.doctor_id,
                date,
                start_time: candidate.start,
                end_time: candidate.end,
            });
        }

        current_time += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use shared_models::scheduling::{AppointmentStatus, AppointmentType, PaymentStatus};

    fn t(hour: u32, min: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, min, 0).unwrap()
    }

    // 2025-06-02 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn past_clock() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
    }

    fn working_hours(
        doctor_id: Uuid,
        day: i32,
        start: NaiveTime,
        end: NaiveTime,
        duration: i32,
    ) -> WorkingHours {
        WorkingHours {
            id: Uuid::new_v4(),
            doctor_id,
            day_of_week: day,
            start_time: start,
            end_time: end,
            slot_duration_minutes: duration,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn block(doctor_id: Uuid, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> BlockedInterval {
        BlockedInterval {
            id: Uuid::new_v4(),
            doctor_id,
            date,
            start_time: start,
            end_time: end,
            reason: None,
            is_recurring: false,
            created_at: Utc::now(),
        }
    }

    fn appointment(
        doctor_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        status: AppointmentStatus,
    ) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id: Uuid::new_v4(),
            date,
            start_time: start,
            end_time: end,
            status,
            payment_status: PaymentStatus::Pending,
            appointment_type: AppointmentType::Regular,
            notes: None,
            rejection_reason: None,
            cancellation_reason: None,
            cancelled_by: None,
            payment_reference: None,
            payment_time: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn starts(slots: &[Slot]) -> Vec<NaiveTime> {
        slots.iter().map(|slot| slot.start_time).collect()
    }

    #[tokio::test]
    async fn no_working_hours_means_no_slots() {
        let store = Arc::new(SchedulingStore::new());
        let generator = SlotGenerator::new(store);

        let slots = generator
            .generate_at(Uuid::new_v4(), monday(), past_clock())
            .await;
        assert!(slots.is_empty());
    }

    #[tokio::test]
    async fn blocked_stride_is_skipped_but_the_rest_survive() {
        let store = Arc::new(SchedulingStore::new());
        let doctor_id = Uuid::new_v4();
        store
            .insert_working_hours(working_hours(doctor_id, 0, t(9, 0), t(12, 0), 30))
            .await;
        store
            .insert_blocked_interval(block(doctor_id, monday(), t(10, 0), t(10, 30)))
            .await;

        let generator = SlotGenerator::new(store);
        let slots = generator.generate_at(doctor_id, monday(), past_clock()).await;

        assert_eq!(
            starts(&slots),
            vec![t(9, 0), t(9, 30), t(10, 30), t(11, 0), t(11, 30)]
        );
    }

    #[tokio::test]
    async fn partially_overlapping_block_removes_every_touched_stride() {
        let store = Arc::new(SchedulingStore::new());
        let doctor_id = Uuid::new_v4();
        store
            .insert_working_hours(working_hours(doctor_id, 0, t(9, 0), t(12, 0), 30))
            .await;
        // 10:15-10:45 clips both the 10:00 and the 10:30 stride
        store
            .insert_blocked_interval(block(doctor_id, monday(), t(10, 15), t(10, 45)))
            .await;

        let generator = SlotGenerator::new(store);
        let slots = generator.generate_at(doctor_id, monday(), past_clock()).await;

        assert_eq!(starts(&slots), vec![t(9, 0), t(9, 30), t(11, 0), t(11, 30)]);
    }

    #[tokio::test]
    async fn trailing_remainder_shorter_than_a_slot_is_discarded() {
        let store = Arc::new(SchedulingStore::new());
        let doctor_id = Uuid::new_v4();
        store
            .insert_working_hours(working_hours(doctor_id, 0, t(9, 0), t(10, 45), 30))
            .await;

        let generator = SlotGenerator::new(store);
        let slots = generator.generate_at(doctor_id, monday(), past_clock()).await;

        assert_eq!(starts(&slots), vec![t(9, 0), t(9, 30), t(10, 0)]);
    }

    #[tokio::test]
    async fn active_appointment_hides_its_slot_and_terminal_ones_do_not() {
        let store = Arc::new(SchedulingStore::new());
        let doctor_id = Uuid::new_v4();
        store
            .insert_working_hours(working_hours(doctor_id, 0, t(9, 0), t(11, 0), 30))
            .await;
        store
            .insert_appointment(appointment(
                doctor_id,
                monday(),
                t(9, 30),
                t(10, 0),
                AppointmentStatus::Confirmed,
            ))
            .await
            .unwrap();
        store
            .insert_appointment(appointment(
                doctor_id,
                monday(),
                t(10, 0),
                t(10, 30),
                AppointmentStatus::Cancelled,
            ))
            .await
            .unwrap();

        let generator = SlotGenerator::new(store);
        let slots = generator.generate_at(doctor_id, monday(), past_clock()).await;

        assert_eq!(starts(&slots), vec![t(9, 0), t(10, 0), t(10, 30)]);
    }

    #[tokio::test]
    async fn same_day_generation_drops_started_slots() {
        let store = Arc::new(SchedulingStore::new());
        let doctor_id = Uuid::new_v4();
        store
            .insert_working_hours(working_hours(doctor_id, 0, t(9, 0), t(12, 0), 30))
            .await;

        let generator = SlotGenerator::new(store);
        let mid_morning = monday().and_hms_opt(10, 0, 0).unwrap().and_utc();
        let slots = generator.generate_at(doctor_id, monday(), mid_morning).await;

        // The 10:00 slot has started at 10:00 sharp and is gone too
        assert_eq!(starts(&slots), vec![t(10, 30), t(11, 0), t(11, 30)]);
    }

    #[tokio::test]
    async fn future_dates_ignore_the_clock() {
        let store = Arc::new(SchedulingStore::new());
        let doctor_id = Uuid::new_v4();
        store
            .insert_working_hours(working_hours(doctor_id, 0, t(9, 0), t(10, 0), 30))
            .await;

        let generator = SlotGenerator::new(store);
        let late_sunday = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap()
            .and_utc();
        let slots = generator.generate_at(doctor_id, monday(), late_sunday).await;

        assert_eq!(starts(&slots), vec![t(9, 0), t(9, 30)]);
    }

    #[tokio::test]
    async fn split_shift_yields_sorted_slots_across_rows() {
        let store = Arc::new(SchedulingStore::new());
        let doctor_id = Uuid::new_v4();
        store
            .insert_working_hours(working_hours(doctor_id, 0, t(14, 0), t(15, 0), 30))
            .await;
        store
            .insert_working_hours(working_hours(doctor_id, 0, t(9, 0), t(10, 0), 30))
            .await;

        let generator = SlotGenerator::new(store);
        let slots = generator.generate_at(doctor_id, monday(), past_clock()).await;

        assert_eq!(starts(&slots), vec![t(9, 0), t(9, 30), t(14, 0), t(14, 30)]);
    }

    #[tokio::test]
    async fn recurring_block_carves_every_matching_weekday() {
        let store = Arc::new(SchedulingStore::new());
        let doctor_id = Uuid::new_v4();
        store
            .insert_working_hours(working_hours(doctor_id, 0, t(9, 0), t(11, 0), 60))
            .await;

        let mut lunch = block(doctor_id, monday(), t(10, 0), t(11, 0));
        lunch.is_recurring = true;
        store.insert_blocked_interval(lunch).await;

        let generator = SlotGenerator::new(store);
        let next_monday = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();
        let slots = generator
            .generate_at(doctor_id, next_monday, past_clock())
            .await;

        assert_eq!(starts(&slots), vec![t(9, 0)]);
    }

    #[tokio::test]
    async fn generated_slots_never_touch_blocks_or_active_appointments() {
        let store = Arc::new(SchedulingStore::new());
        let doctor_id = Uuid::new_v4();
        store
            .insert_working_hours(working_hours(doctor_id, 0, t(8, 0), t(18, 0), 45))
            .await;
        store
            .insert_blocked_interval(block(doctor_id, monday(), t(9, 10), t(9, 50)))
            .await;
        store
            .insert_blocked_interval(block(doctor_id, monday(), t(13, 0), t(14, 0)))
            .await;
        store
            .insert_appointment(appointment(
                doctor_id,
                monday(),
                t(11, 0),
                t(11, 45),
                AppointmentStatus::Accepted,
            ))
            .await
            .unwrap();

        let generator = SlotGenerator::new(store.clone());
        let slots = generator.generate_at(doctor_id, monday(), past_clock()).await;
        assert!(!slots.is_empty());

        let blocks = store.blocked_intervals_on(doctor_id, monday()).await;
        let held = store.active_appointments_for_day(doctor_id, monday()).await;
        for slot in &slots {
            let candidate = TimeInterval::new(slot.start_time, slot.end_time);
            assert!(blocks.iter().all(|b| !candidate.overlaps(&b.interval())));
            assert!(held.iter().all(|a| !candidate.overlaps(&a.interval())));
        }
    }
}
