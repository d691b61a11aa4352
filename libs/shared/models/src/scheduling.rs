use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type FacilityId = i64;
pub type ExamId = i64;
pub type PatientId = i64;
pub type AppointmentId = i64;

// ==============================================================================
// SLOTS
// ==============================================================================

/// Identity of a bookable slot. Two keys are the same slot only if every
/// component matches, including the time down to the second.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub facility_id: FacilityId,
    pub exam_id: ExamId,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl SlotKey {
    pub fn new(facility_id: FacilityId, exam_id: ExamId, date: NaiveDate, time: NaiveTime) -> Self {
        Self { facility_id, exam_id, date, time }
    }

    /// Splits a requested date-time into the date and time components of the key.
    pub fn from_date_time(facility_id: FacilityId, exam_id: ExamId, date_time: NaiveDateTime) -> Self {
        Self::new(facility_id, exam_id, date_time.date(), date_time.time())
    }

    pub fn date_time(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "facility={} exam={} at {} {}",
            self.facility_id,
            self.exam_id,
            self.date,
            self.time.format("%H:%M:%S")
        )
    }
}

/// Availability record for one slot. `occupied` never exceeds `total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub key: SlotKey,
    pub total: u32,
    pub occupied: u32,
}

impl Slot {
    pub fn new(key: SlotKey, total: u32) -> Self {
        Self { key, total, occupied: 0 }
    }

    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.occupied)
    }

    pub fn is_full(&self) -> bool {
        self.occupied >= self.total
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Agendada,
    Confirmado,
    #[serde(alias = "CANCELADA")]
    Cancelado,
    RequiereDocumentos,
    RegistradoEnSede,
    Completado,
    NoSePresento,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 7] = [
        AppointmentStatus::Agendada,
        AppointmentStatus::Confirmado,
        AppointmentStatus::Cancelado,
        AppointmentStatus::RequiereDocumentos,
        AppointmentStatus::RegistradoEnSede,
        AppointmentStatus::Completado,
        AppointmentStatus::NoSePresento,
    ];
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Agendada => write!(f, "AGENDADA"),
            AppointmentStatus::Confirmado => write!(f, "CONFIRMADO"),
            AppointmentStatus::Cancelado => write!(f, "CANCELADO"),
            AppointmentStatus::RequiereDocumentos => write!(f, "REQUIERE_DOCUMENTOS"),
            AppointmentStatus::RegistradoEnSede => write!(f, "REGISTRADO_EN_SEDE"),
            AppointmentStatus::Completado => write!(f, "COMPLETADO"),
            AppointmentStatus::NoSePresento => write!(f, "NO_SE_PRESENTO"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_id: PatientId,
    pub slot: SlotKey,
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    /// Copy of the slot's date-time at booking, kept for audit.
    pub scheduled_at: NaiveDateTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Appointment row before the store has assigned it an id.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: PatientId,
    pub slot: SlotKey,
    pub status: AppointmentStatus,
    pub scheduled_at: NaiveDateTime,
}

// ==============================================================================
// PATIENTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
