// libs/scheduling-cell/src/models.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use shared_database::StoreError;
use shared_models::{AppointmentStatus, ExamId, FacilityId, Slot, SlotKey};

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub facility_id: FacilityId,
    pub exam_id: ExamId,
    pub date_time: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    #[serde(flatten)]
    pub key: SlotKey,
    pub total: u32,
    pub occupied: u32,
    pub remaining: u32,
}

impl From<Slot> for SlotAvailability {
    fn from(slot: Slot) -> Self {
        let remaining = slot.remaining();
        Self {
            key: slot.key,
            total: slot.total,
            occupied: slot.occupied,
            remaining,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Failures surfaced by the scheduling core.
///
/// A missing appointment and another patient's appointment both produce
/// `AppointmentNotFound`; callers must not be able to tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingError {
    #[error("Patient not found")]
    PatientNotFound,

    #[error("No availability for the requested facility, exam and time")]
    NoAvailability,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("No slots left for the requested facility, exam and time")]
    SlotsExhausted,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidState(AppointmentStatus),

    #[error("Scheduling invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Slot is locked by another request, retry later")]
    Busy,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SchedulingError {
    /// Only lock-wait timeouts may be retried with the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedulingError::Busy)
    }
}

impl From<StoreError> for SchedulingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Busy { .. } => SchedulingError::Busy,
            other => SchedulingError::Storage(other.to_string()),
        }
    }
}
