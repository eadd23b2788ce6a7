use tracing::{debug, warn};

use shared_models::scheduling::AppointmentStatus;

use crate::models::BookingError;

/// The appointment state machine. Transitions not listed here do not exist;
/// every status change in the ledger goes through `validate_transition`.
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_transition(
        &self,
        current: &AppointmentStatus,
        next: &AppointmentStatus,
    ) -> Result<(), BookingError> {
        debug!("Validating status transition {} -> {}", current, next);

        if !self.valid_transitions(current).contains(next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(BookingError::InvalidTransition {
                from: current.clone(),
                to: next.clone(),
            });
        }

        Ok(())
    }

    /// All statuses reachable in one step from `current`.
    pub fn valid_transitions(&self, current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Accepted,
                AppointmentStatus::Rejected,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Accepted => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
            AppointmentStatus::Rejected => vec![],
        }
    }
}

impl Default for AppointmentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn pending_can_be_accepted_rejected_or_cancelled() {
        let lifecycle = AppointmentLifecycle::new();
        for next in [
            AppointmentStatus::Accepted,
            AppointmentStatus::Rejected,
            AppointmentStatus::Cancelled,
        ] {
            assert!(lifecycle
                .validate_transition(&AppointmentStatus::Pending, &next)
                .is_ok());
        }
        assert_matches!(
            lifecycle.validate_transition(&AppointmentStatus::Pending, &AppointmentStatus::Completed),
            Err(BookingError::InvalidTransition { .. })
        );
    }

    #[test]
    fn accepted_confirms_on_payment_or_completes_directly() {
        let lifecycle = AppointmentLifecycle::new();
        assert!(lifecycle
            .validate_transition(&AppointmentStatus::Accepted, &AppointmentStatus::Confirmed)
            .is_ok());
        assert!(lifecycle
            .validate_transition(&AppointmentStatus::Accepted, &AppointmentStatus::Completed)
            .is_ok());
        assert_matches!(
            lifecycle.validate_transition(&AppointmentStatus::Accepted, &AppointmentStatus::Rejected),
            Err(BookingError::InvalidTransition { .. })
        );
    }

    #[test]
    fn terminal_states_allow_nothing() {
        let lifecycle = AppointmentLifecycle::new();
        for terminal in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::Rejected,
        ] {
            assert!(lifecycle.valid_transitions(&terminal).is_empty());
            assert_matches!(
                lifecycle.validate_transition(&terminal, &AppointmentStatus::Cancelled),
                Err(BookingError::InvalidTransition { .. })
            );
        }
    }

    #[test]
    fn transition_error_names_both_states() {
        let lifecycle = AppointmentLifecycle::new();
        let error = lifecycle
            .validate_transition(&AppointmentStatus::Completed, &AppointmentStatus::Cancelled)
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid status transition from completed to cancelled"
        );
    }
}
