use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_models::interval::TimeInterval;
use shared_models::scheduling::BlockedInterval;
use shared_store::memory::SchedulingStore;

use crate::models::{CreateBlockedIntervalRequest, ScheduleError};

const MAX_REASON_LENGTH: usize = 200;

/// Ad-hoc carve-outs from a doctor's working hours: one-off blocks pinned to a
/// date, or recurring blocks that repeat on that date's weekday.
pub struct BlockedSlotStore {
    store: Arc<SchedulingStore>,
}

impl BlockedSlotStore {
    pub fn new(store: Arc<SchedulingStore>) -> Self {
        Self { store }
    }

    pub async fn block(
        &self,
        doctor_id: Uuid,
        request: CreateBlockedIntervalRequest,
    ) -> Result<BlockedInterval, ScheduleError> {
        debug!(
            "Blocking {}-{} on {} for doctor {}",
            request.start_time, request.end_time, request.date, doctor_id
        );

        let interval = TimeInterval::new(request.start_time, request.end_time);
        if !interval.is_well_formed() {
            return Err(ScheduleError::InvalidInterval(
                "Start time must be before end time".to_string(),
            ));
        }
        if let Some(reason) = &request.reason {
            if reason.chars().count() > MAX_REASON_LENGTH {
                return Err(ScheduleError::Validation(format!(
                    "Reason must be at most {} characters",
                    MAX_REASON_LENGTH
                )));
            }
        }

        let row = BlockedInterval {
            id: Uuid::new_v4(),
            doctor_id,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            reason: request.reason,
            is_recurring: request.is_recurring.unwrap_or(false),
            created_at: Utc::now(),
        };

        Ok(self.store.insert_blocked_interval(row).await)
    }

    pub async fn unblock(
        &self,
        doctor_id: Uuid,
        id: Uuid,
    ) -> Result<BlockedInterval, ScheduleError> {
        self.store
            .remove_blocked_interval(doctor_id, id)
            .await
            .map_err(|_| ScheduleError::NotFound("Blocked interval not found".to_string()))
    }

    pub async fn list(&self, doctor_id: Uuid) -> Vec<BlockedInterval> {
        self.store.blocked_intervals_for_doctor(doctor_id).await
    }

    /// Intervals carved out of `date`, recurring blocks included. Blocks are
    /// stored as entered; overlapping entries are not merged.
    pub async fn effective_blocks_for(&self, doctor_id: Uuid, date: NaiveDate) -> Vec<TimeInterval> {
        self.store
            .blocked_intervals_on(doctor_id, date)
            .await
            .iter()
            .map(|row| row.interval())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveTime;

    fn t(hour: u32, min: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, min, 0).unwrap()
    }

    fn request(
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        recurring: bool,
    ) -> CreateBlockedIntervalRequest {
        CreateBlockedIntervalRequest {
            date,
            start_time: start,
            end_time: end,
            reason: Some("Lunch".to_string()),
            is_recurring: Some(recurring),
        }
    }

    fn blocks() -> BlockedSlotStore {
        BlockedSlotStore::new(Arc::new(SchedulingStore::new()))
    }

    #[tokio::test]
    async fn block_rejects_inverted_interval() {
        let service = blocks();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let result = service
            .block(Uuid::new_v4(), request(date, t(11, 0), t(10, 0), false))
            .await;
        assert_matches!(result, Err(ScheduleError::InvalidInterval(_)));
    }

    #[tokio::test]
    async fn block_rejects_oversized_reason() {
        let service = blocks();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let mut request = request(date, t(10, 0), t(11, 0), false);
        request.reason = Some("x".repeat(MAX_REASON_LENGTH + 1));

        let result = service.block(Uuid::new_v4(), request).await;
        assert_matches!(result, Err(ScheduleError::Validation(_)));
    }

    #[tokio::test]
    async fn reason_at_the_limit_is_accepted() {
        let service = blocks();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let mut request = request(date, t(10, 0), t(11, 0), false);
        request.reason = Some("x".repeat(MAX_REASON_LENGTH));

        assert!(service.block(Uuid::new_v4(), request).await.is_ok());
    }

    #[tokio::test]
    async fn one_off_block_applies_only_on_its_date() {
        let service = blocks();
        let doctor_id = Uuid::new_v4();
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let next_monday = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();

        service
            .block(doctor_id, request(monday, t(10, 0), t(10, 30), false))
            .await
            .unwrap();

        assert_eq!(service.effective_blocks_for(doctor_id, monday).await.len(), 1);
        assert!(service
            .effective_blocks_for(doctor_id, next_monday)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn recurring_block_applies_on_matching_weekdays() {
        let service = blocks();
        let doctor_id = Uuid::new_v4();
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let next_monday = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();

        service
            .block(doctor_id, request(monday, t(12, 0), t(13, 0), true))
            .await
            .unwrap();

        assert_eq!(service.effective_blocks_for(doctor_id, monday).await.len(), 1);
        assert_eq!(
            service
                .effective_blocks_for(doctor_id, next_monday)
                .await
                .len(),
            1
        );
        assert!(service.effective_blocks_for(doctor_id, tuesday).await.is_empty());
    }

    #[tokio::test]
    async fn overlapping_blocks_are_both_kept() {
        let service = blocks();
        let doctor_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        service
            .block(doctor_id, request(date, t(10, 0), t(11, 0), false))
            .await
            .unwrap();
        service
            .block(doctor_id, request(date, t(10, 30), t(11, 30), false))
            .await
            .unwrap();

        assert_eq!(service.list(doctor_id).await.len(), 2);
        assert_eq!(service.effective_blocks_for(doctor_id, date).await.len(), 2);
    }

    #[tokio::test]
    async fn unblock_missing_row_reports_not_found() {
        let service = blocks();
        let result = service.unblock(Uuid::new_v4(), Uuid::new_v4()).await;
        assert_matches!(result, Err(ScheduleError::NotFound(_)));
    }

    #[tokio::test]
    async fn unblock_removes_the_row() {
        let service = blocks();
        let doctor_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        let row = service
            .block(doctor_id, request(date, t(10, 0), t(11, 0), false))
            .await
            .unwrap();
        service.unblock(doctor_id, row.id).await.unwrap();

        assert!(service.list(doctor_id).await.is_empty());
    }
}
