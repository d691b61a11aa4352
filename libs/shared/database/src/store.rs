use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentId, NewAppointment, Patient, PatientId, Slot, SlotKey,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Timed out after {waited_ms}ms waiting for slot lock")]
    Busy { waited_ms: u64 },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Slot {0} is not locked by this transaction")]
    SlotNotLocked(String),

    #[error("Appointment {0} does not exist")]
    UnknownAppointment(AppointmentId),

    #[error("Invalid slot {key}: occupied {occupied} exceeds total {total}")]
    InvalidSlot { key: String, occupied: u32, total: u32 },
}

/// Durable storage for the scheduling core.
///
/// Writes only happen through a [`StoreTransaction`]; the read methods here
/// see the last committed state and never take row locks.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    async fn find_slot(&self, key: &SlotKey) -> Result<Option<Slot>, StoreError>;

    async fn find_appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, StoreError>;

    /// Newest first.
    async fn list_appointments_for_patient(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<Appointment>, StoreError>;
}

/// A unit of work. Dropping it without calling [`StoreTransaction::commit`]
/// discards every buffered write and releases every row lock it holds.
#[async_trait]
pub trait StoreTransaction: Send {
    fn id(&self) -> Uuid;

    async fn find_patient(&mut self, id: PatientId) -> Result<Option<Patient>, StoreError>;

    async fn find_patient_by_email(&mut self, email: &str) -> Result<Option<Patient>, StoreError>;

    /// Looks up a slot and holds an exclusive lock on it until the transaction
    /// ends. Callers on other slots are never blocked. Waiting longer than the
    /// store's lock timeout fails with [`StoreError::Busy`].
    async fn find_and_lock_slot(&mut self, key: &SlotKey) -> Result<Option<Slot>, StoreError>;

    /// The slot must have been locked by this transaction.
    async fn save_slot(&mut self, slot: &Slot) -> Result<(), StoreError>;

    async fn find_appointment(&mut self, id: AppointmentId) -> Result<Option<Appointment>, StoreError>;

    async fn insert_appointment(&mut self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

    async fn save_appointment(&mut self, appointment: &Appointment) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
