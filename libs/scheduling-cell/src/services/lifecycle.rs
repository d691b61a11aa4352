// libs/scheduling-cell/src/services/lifecycle.rs
use chrono::Utc;
use tracing::{debug, warn};

use shared_models::{Appointment, AppointmentStatus};

use crate::models::SchedulingError;

/// Status rules for appointments.
///
/// Booking and cancellation are the only edges this crate drives itself
/// (`(none) -> CONFIRMADO` and `CONFIRMADO -> CANCELADO`). The remaining
/// edges belong to the front-desk and document workflows and are listed so
/// that every status has a defined set of successors.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentStateMachine;

impl AppointmentStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Status of a freshly booked appointment.
    pub fn initial_status(&self) -> AppointmentStatus {
        AppointmentStatus::Confirmado
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), SchedulingError> {
        if !self.get_valid_transitions(current_status).contains(&new_status) {
            if self.is_terminal(current_status) {
                warn!("Appointment already {} (terminal), refusing move to {}", current_status, new_status);
            } else {
                warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            }
            return Err(SchedulingError::InvalidState(current_status));
        }

        debug!("Status transition validated: {} -> {}", current_status, new_status);
        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current_status {
            AppointmentStatus::Agendada => &[
                AppointmentStatus::Confirmado,
                AppointmentStatus::RequiereDocumentos,
            ],
            AppointmentStatus::RequiereDocumentos => &[AppointmentStatus::Confirmado],
            AppointmentStatus::Confirmado => &[
                AppointmentStatus::Cancelado,
                AppointmentStatus::RegistradoEnSede,
                AppointmentStatus::NoSePresento,
            ],
            AppointmentStatus::RegistradoEnSede => &[AppointmentStatus::Completado],
            // Terminal states
            AppointmentStatus::Cancelado => &[],
            AppointmentStatus::Completado => &[],
            AppointmentStatus::NoSePresento => &[],
        }
    }

    pub fn is_terminal(&self, status: AppointmentStatus) -> bool {
        self.get_valid_transitions(status).is_empty()
    }

    pub fn can_cancel(&self, status: AppointmentStatus) -> bool {
        self.get_valid_transitions(status).contains(&AppointmentStatus::Cancelado)
    }

    /// Whether an appointment in this status still accounts for one unit of
    /// its slot's occupied count.
    pub fn holds_capacity(&self, status: AppointmentStatus) -> bool {
        status != AppointmentStatus::Cancelado
    }

    /// Moves a confirmed appointment to CANCELADO and records the reason.
    /// Anything else is refused with `InvalidState` and left untouched.
    pub fn cancel(&self, appointment: &mut Appointment, reason: &str) -> Result<(), SchedulingError> {
        self.validate_status_transition(appointment.status, AppointmentStatus::Cancelado)?;

        appointment.status = AppointmentStatus::Cancelado;
        appointment.cancellation_reason = Some(reason.to_string());
        appointment.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use shared_models::SlotKey;

    fn appointment(status: AppointmentStatus) -> Appointment {
        let key = SlotKey::new(
            10,
            20,
            NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
        );
        Appointment {
            id: 99,
            patient_id: 1,
            scheduled_at: key.date_time(),
            slot: key,
            status,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn only_confirmed_can_be_cancelled() {
        let machine = AppointmentStateMachine::new();
        for status in AppointmentStatus::ALL {
            assert_eq!(
                machine.can_cancel(status),
                status == AppointmentStatus::Confirmado,
                "{status}"
            );
        }
    }

    #[test]
    fn cancel_sets_status_and_reason() {
        let machine = AppointmentStateMachine::new();
        let mut appt = appointment(AppointmentStatus::Confirmado);

        machine.cancel(&mut appt, "x").unwrap();

        assert_eq!(appt.status, AppointmentStatus::Cancelado);
        assert_eq!(appt.cancellation_reason.as_deref(), Some("x"));
    }

    #[test]
    fn cancel_refuses_completed_and_cancelled() {
        let machine = AppointmentStateMachine::new();
        for status in [AppointmentStatus::Completado, AppointmentStatus::Cancelado] {
            let mut appt = appointment(status);
            let before = appt.clone();

            assert_eq!(machine.cancel(&mut appt, "x"), Err(SchedulingError::InvalidState(status)));
            assert_eq!(appt, before);
        }
    }

    #[test]
    fn terminal_states_have_no_successors() {
        let machine = AppointmentStateMachine::new();
        assert!(machine.is_terminal(AppointmentStatus::Cancelado));
        assert!(machine.is_terminal(AppointmentStatus::Completado));
        assert!(machine.is_terminal(AppointmentStatus::NoSePresento));
        assert!(!machine.is_terminal(AppointmentStatus::Confirmado));
        assert!(!machine.is_terminal(AppointmentStatus::RegistradoEnSede));
    }

    #[test]
    fn workflow_edges() {
        let machine = AppointmentStateMachine::new();
        assert!(machine
            .validate_status_transition(AppointmentStatus::Agendada, AppointmentStatus::RequiereDocumentos)
            .is_ok());
        assert!(machine
            .validate_status_transition(AppointmentStatus::RegistradoEnSede, AppointmentStatus::Completado)
            .is_ok());
        assert_eq!(
            machine.validate_status_transition(AppointmentStatus::Completado, AppointmentStatus::Confirmado),
            Err(SchedulingError::InvalidState(AppointmentStatus::Completado))
        );
        assert_eq!(machine.initial_status(), AppointmentStatus::Confirmado);
    }

    #[test]
    fn cancelled_appointments_free_their_unit() {
        let machine = AppointmentStateMachine::new();
        assert!(machine.holds_capacity(AppointmentStatus::Confirmado));
        assert!(machine.holds_capacity(AppointmentStatus::Completado));
        assert!(!machine.holds_capacity(AppointmentStatus::Cancelado));
    }
}
