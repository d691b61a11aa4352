// libs/scheduling-cell/src/services/ledger.rs
use thiserror::Error;
use tracing::{debug, error};

use shared_database::{StoreError, StoreTransaction};
use shared_models::{Slot, SlotKey};

use crate::models::SchedulingError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("No slot exists for {0}")]
    SlotNotFound(SlotKey),

    #[error("Slot {key} is at capacity ({total})")]
    CapacityExhausted { key: SlotKey, total: u32 },

    #[error("{0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LedgerError> for SchedulingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::SlotNotFound(_) => SchedulingError::NoAvailability,
            LedgerError::CapacityExhausted { .. } => SchedulingError::SlotsExhausted,
            LedgerError::InvariantViolation(msg) => SchedulingError::InvariantViolation(msg),
            LedgerError::Store(e) => e.into(),
        }
    }
}

/// Capacity bookkeeping for slots. Counters are only changed on a slot that
/// the calling transaction has locked through [`SlotLedger::find_and_lock`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SlotLedger;

impl SlotLedger {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_and_lock(
        &self,
        tx: &mut dyn StoreTransaction,
        key: &SlotKey,
    ) -> Result<Slot, LedgerError> {
        let slot = tx
            .find_and_lock_slot(key)
            .await?
            .ok_or_else(|| LedgerError::SlotNotFound(key.clone()))?;

        debug!("Locked slot {} ({}/{} occupied)", key, slot.occupied, slot.total);
        Ok(slot)
    }

    pub fn occupy(&self, slot: &mut Slot) -> Result<(), LedgerError> {
        if slot.is_full() {
            return Err(LedgerError::CapacityExhausted {
                key: slot.key.clone(),
                total: slot.total,
            });
        }
        slot.occupied += 1;
        Ok(())
    }

    pub fn release(&self, slot: &mut Slot) -> Result<(), LedgerError> {
        if slot.occupied == 0 {
            error!("Release requested on slot {} with nothing occupied", slot.key);
            return Err(LedgerError::InvariantViolation(format!(
                "release on slot {} with zero occupied",
                slot.key
            )));
        }
        slot.occupied -= 1;
        Ok(())
    }

    pub async fn save(&self, tx: &mut dyn StoreTransaction, slot: &Slot) -> Result<(), LedgerError> {
        tx.save_slot(slot).await?;
        Ok(())
    }
}
