use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::interval::TimeInterval;

// ==============================================================================
// SCHEDULE RECORDS
// ==============================================================================

/// Recurring availability row for one doctor on one weekday.
///
/// Active rows for a given (doctor, weekday) are kept pairwise non-overlapping
/// by the registry's merge-on-insert; nothing else may write them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHours {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: i32, // 0 = Monday ... 6 = Sunday
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl WorkingHours {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.start_time, self.end_time)
    }
}

/// One-off carve-out from availability on a specific date, or on every
/// occurrence of that date's weekday when recurring. Immutable after creation
/// except for deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedInterval {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: Option<String>,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
}

impl BlockedInterval {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.start_time, self.end_time)
    }

    /// Whether this block carves out time on `date`.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        if self.date == date {
            return true;
        }
        self.is_recurring && weekday_index(self.date.weekday()) == weekday_index(date.weekday())
    }
}

/// Derived bookable slot. Never persisted; recomputed per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl Slot {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.start_time, self.end_time)
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub payment_reference: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.start_time, self.end_time)
    }

    /// Whether this appointment currently holds its slot.
    pub fn holds_slot(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Accepted,
    Confirmed,
    Completed,
    Cancelled,
    Rejected,
}

impl AppointmentStatus {
    /// Statuses that hold their slot against other bookings.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Pending | AppointmentStatus::Accepted | AppointmentStatus::Confirmed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Rejected
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Accepted => write!(f, "accepted"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Payment progress, orthogonal to the lifecycle status. Set through the
/// payment collaborator's callback, never directly by patients or doctors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    Regular,
    FollowUp,
    Consultation,
    Emergency,
    Video,
    Specialist,
}

impl Default for AppointmentType {
    fn default() -> Self {
        AppointmentType::Regular
    }
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Regular => write!(f, "regular"),
            AppointmentType::FollowUp => write!(f, "follow_up"),
            AppointmentType::Consultation => write!(f, "consultation"),
            AppointmentType::Emergency => write!(f, "emergency"),
            AppointmentType::Video => write!(f, "video"),
            AppointmentType::Specialist => write!(f, "specialist"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Doctor,
}

// ==============================================================================
// WEEKDAY MAPPING
// ==============================================================================

/// Schedule weekday index: 0 = Monday through 6 = Sunday.
pub fn weekday_index(weekday: Weekday) -> i32 {
    match weekday {
        Weekday::Mon => 0,
        Weekday::Tue => 1,
        Weekday::Wed => 2,
        Weekday::Thu => 3,
        Weekday::Fri => 4,
        Weekday::Sat => 5,
        Weekday::Sun => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn weekday_index_starts_monday() {
        // 2025-06-02 is a Monday
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(weekday_index(monday.weekday()), 0);
        assert_eq!(weekday_index(monday.succ_opt().unwrap().weekday()), 1);
    }

    #[test]
    fn active_statuses_hold_slots() {
        assert!(AppointmentStatus::Pending.is_active());
        assert!(AppointmentStatus::Accepted.is_active());
        assert!(AppointmentStatus::Confirmed.is_active());
        assert!(!AppointmentStatus::Cancelled.is_active());
        assert!(!AppointmentStatus::Rejected.is_active());
        assert!(!AppointmentStatus::Completed.is_active());
    }

    #[test]
    fn recurring_block_applies_on_same_weekday() {
        let anchor = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(); // Monday
        let block = BlockedInterval {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: anchor,
            start_time: t(12, 0),
            end_time: t(13, 0),
            reason: Some("lunch".to_string()),
            is_recurring: true,
            created_at: Utc::now(),
        };

        let next_monday = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        assert!(block.applies_on(anchor));
        assert!(block.applies_on(next_monday));
        assert!(!block.applies_on(tuesday));
    }

    #[test]
    fn one_off_block_applies_on_its_date_only() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let block = BlockedInterval {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date,
            start_time: t(9, 0),
            end_time: t(17, 0),
            reason: None,
            is_recurring: false,
            created_at: Utc::now(),
        };

        assert!(block.applies_on(date));
        assert!(!block.applies_on(NaiveDate::from_ymd_opt(2025, 6, 9).unwrap()));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&AppointmentStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let back: AppointmentStatus = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(back, AppointmentStatus::Confirmed);
    }
}
