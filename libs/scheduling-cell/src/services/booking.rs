// libs/scheduling-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info, instrument, warn};

use shared_database::{SchedulingStore, StoreTransaction};
use shared_models::{
    Appointment, AppointmentId, ExamId, FacilityId, NewAppointment, PatientId, SlotKey,
};

use crate::models::{SchedulingError, SlotAvailability};
use crate::services::ledger::{LedgerError, SlotLedger};
use crate::services::lifecycle::AppointmentStateMachine;

/// Books and cancels appointments against slot capacity.
///
/// Each write operation runs in a single store transaction that holds the
/// lock of exactly one slot. Returning early drops the transaction, which
/// rolls back every write made so far and releases the lock.
#[derive(Clone)]
pub struct SchedulingService {
    store: Arc<dyn SchedulingStore>,
    ledger: SlotLedger,
    state_machine: AppointmentStateMachine,
}

impl SchedulingService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self {
            store,
            ledger: SlotLedger::new(),
            state_machine: AppointmentStateMachine::new(),
        }
    }

    #[instrument(skip(self))]
    pub async fn book_appointment(
        &self,
        patient_id: PatientId,
        facility_id: FacilityId,
        exam_id: ExamId,
        date_time: NaiveDateTime,
    ) -> Result<Appointment, SchedulingError> {
        let key = SlotKey::from_date_time(facility_id, exam_id, date_time);
        let mut tx = self.store.begin().await?;
        let tx_id = tx.id();

        let patient = match tx.find_patient(patient_id).await? {
            Some(patient) => patient,
            None => {
                debug!("Patient {} not found", patient_id);
                return Err(SchedulingError::PatientNotFound);
            }
        };
        debug!("Booking {} for {}", key, patient.full_name());

        let mut slot = self.ledger.find_and_lock(tx.as_mut(), &key).await?;

        if let Err(e) = self.ledger.occupy(&mut slot) {
            warn!("Booking refused for patient {}: {}", patient_id, e);
            return Err(e.into());
        }
        self.ledger.save(tx.as_mut(), &slot).await?;

        let appointment = tx
            .insert_appointment(NewAppointment {
                patient_id,
                slot: key.clone(),
                status: self.state_machine.initial_status(),
                scheduled_at: key.date_time(),
            })
            .await?;

        tx.commit().await?;

        info!(
            "Appointment {} booked for patient {} on {} ({}/{} occupied, tx {})",
            appointment.id, patient_id, key, slot.occupied, slot.total, tx_id
        );
        Ok(appointment)
    }

    #[instrument(skip(self, reason))]
    pub async fn cancel_appointment(
        &self,
        patient_id: PatientId,
        appointment_id: AppointmentId,
        reason: &str,
    ) -> Result<Appointment, SchedulingError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SchedulingError::Validation("Cancellation reason is required".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let tx_id = tx.id();

        let loaded = Self::load_owned(tx.as_mut(), patient_id, appointment_id).await?;

        // The slot key comes from the stored appointment, never from the request.
        let mut slot = match self.ledger.find_and_lock(tx.as_mut(), &loaded.slot).await {
            Ok(slot) => slot,
            Err(LedgerError::SlotNotFound(key)) => {
                return Err(SchedulingError::InvariantViolation(format!(
                    "appointment {} references missing slot {}",
                    appointment_id, key
                )));
            }
            Err(e) => return Err(e.into()),
        };

        // Status is re-read under the slot lock; the copy loaded above may
        // predate a concurrent cancellation that has since committed.
        let mut appointment = tx
            .find_appointment(appointment_id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)?;

        self.state_machine.cancel(&mut appointment, reason)?;
        self.ledger.release(&mut slot)?;

        self.ledger.save(tx.as_mut(), &slot).await?;
        tx.save_appointment(&appointment).await?;
        tx.commit().await?;

        info!(
            "Appointment {} cancelled by patient {} ({}/{} occupied on {}, tx {})",
            appointment_id, patient_id, slot.occupied, slot.total, slot.key, tx_id
        );
        Ok(appointment)
    }

    /// Fetches one of the caller's own appointments.
    pub async fn get_appointment(
        &self,
        patient_id: PatientId,
        appointment_id: AppointmentId,
    ) -> Result<Appointment, SchedulingError> {
        match self.store.find_appointment(appointment_id).await? {
            Some(appointment) if appointment.patient_id == patient_id => Ok(appointment),
            _ => Err(SchedulingError::AppointmentNotFound),
        }
    }

    pub async fn list_appointments(&self, patient_id: PatientId) -> Result<Vec<Appointment>, SchedulingError> {
        Ok(self.store.list_appointments_for_patient(patient_id).await?)
    }

    pub async fn slot_availability(&self, key: &SlotKey) -> Result<SlotAvailability, SchedulingError> {
        self.store
            .find_slot(key)
            .await?
            .map(SlotAvailability::from)
            .ok_or(SchedulingError::NoAvailability)
    }

    pub fn state_machine(&self) -> &AppointmentStateMachine {
        &self.state_machine
    }

    async fn load_owned(
        tx: &mut dyn StoreTransaction,
        patient_id: PatientId,
        appointment_id: AppointmentId,
    ) -> Result<Appointment, SchedulingError> {
        match tx.find_appointment(appointment_id).await? {
            Some(appointment) if appointment.patient_id == patient_id => Ok(appointment),
            Some(_) => {
                // Reported exactly like a missing appointment.
                debug!(
                    "Patient {} asked for appointment {} owned by someone else",
                    patient_id, appointment_id
                );
                Err(SchedulingError::AppointmentNotFound)
            }
            None => Err(SchedulingError::AppointmentNotFound),
        }
    }
}
