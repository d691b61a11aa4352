use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use shared_models::{ExamId, FacilityId, Patient, Slot, SlotKey};

/// Initial rows for an embedded store, as produced by capacity tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub slots: Vec<SeedSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSlot {
    pub facility_id: FacilityId,
    pub exam_id: ExamId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub total: u32,
    #[serde(default)]
    pub occupied: u32,
}

impl SeedSlot {
    pub fn to_slot(&self) -> Slot {
        Slot {
            key: SlotKey::new(self.facility_id, self.exam_id, self.date, self.time),
            total: self.total,
            occupied: self.occupied,
        }
    }
}

impl SeedData {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
