use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{
    Appointment, AppointmentId, NewAppointment, Patient, PatientId, Slot, SlotKey,
};

use crate::seed::SeedData;
use crate::store::{SchedulingStore, StoreError, StoreTransaction};

#[derive(Debug)]
struct SlotRow {
    slot: Slot,
    lock: Arc<Mutex<()>>,
}

#[derive(Debug, Default)]
struct Tables {
    slots: HashMap<SlotKey, SlotRow>,
    appointments: BTreeMap<AppointmentId, Appointment>,
    patients: HashMap<PatientId, Patient>,
}

#[derive(Debug)]
struct StoreInner {
    tables: RwLock<Tables>,
    next_appointment_id: AtomicI64,
}

impl StoreInner {
    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn committed_slot(&self, key: &SlotKey) -> Result<Option<Slot>, StoreError> {
        Ok(self.read()?.slots.get(key).map(|row| row.slot.clone()))
    }

    fn row_lock(&self, key: &SlotKey) -> Result<Option<Arc<Mutex<()>>>, StoreError> {
        Ok(self.read()?.slots.get(key).map(|row| Arc::clone(&row.lock)))
    }

    fn committed_appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, StoreError> {
        Ok(self.read()?.appointments.get(&id).cloned())
    }
}

/// Embedded store. Every slot row carries its own async mutex which plays the
/// part of a `SELECT ... FOR UPDATE` row lock; the table maps themselves are
/// only ever locked briefly and never across an await.
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    inner: Arc<StoreInner>,
    lock_timeout: Duration,
}

impl InMemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tables: RwLock::new(Tables::default()),
                next_appointment_id: AtomicI64::new(1),
            }),
            lock_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.slot_lock_timeout())
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn insert_patient(&self, patient: Patient) -> Result<(), StoreError> {
        let mut tables = self.inner.write()?;
        tables.patients.insert(patient.id, patient);
        Ok(())
    }

    /// Creates a slot or resets the counters of an existing one. Meant for
    /// capacity tooling and seeding, not for use while bookings are in flight.
    pub fn insert_slot(&self, slot: Slot) -> Result<(), StoreError> {
        if slot.occupied > slot.total {
            return Err(StoreError::InvalidSlot {
                key: slot.key.to_string(),
                occupied: slot.occupied,
                total: slot.total,
            });
        }

        let mut tables = self.inner.write()?;
        match tables.slots.get_mut(&slot.key) {
            Some(row) => row.slot = slot,
            None => {
                tables.slots.insert(
                    slot.key.clone(),
                    SlotRow {
                        slot,
                        lock: Arc::new(Mutex::new(())),
                    },
                );
            }
        }
        Ok(())
    }

    pub fn load_seed(&self, seed: &SeedData) -> Result<(), StoreError> {
        for patient in &seed.patients {
            self.insert_patient(patient.clone())?;
        }
        for slot in &seed.slots {
            self.insert_slot(slot.to_slot())?;
        }
        info!(
            "Seeded store with {} patients and {} slots",
            seed.patients.len(),
            seed.slots.len()
        );
        Ok(())
    }
}

#[async_trait]
impl SchedulingStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = MemoryTransaction {
            id: Uuid::new_v4(),
            inner: Arc::clone(&self.inner),
            lock_timeout: self.lock_timeout,
            held_locks: HashMap::new(),
            pending_slots: HashMap::new(),
            pending_appointments: BTreeMap::new(),
        };
        debug!("Transaction {} started", tx.id);
        Ok(Box::new(tx))
    }

    async fn find_slot(&self, key: &SlotKey) -> Result<Option<Slot>, StoreError> {
        self.inner.committed_slot(key)
    }

    async fn find_appointment(&self, id: AppointmentId) -> Result<Option<Appointment>, StoreError> {
        self.inner.committed_appointment(id)
    }

    async fn list_appointments_for_patient(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.inner.read()?;
        Ok(tables
            .appointments
            .values()
            .rev()
            .filter(|appointment| appointment.patient_id == patient_id)
            .cloned()
            .collect())
    }
}

pub struct MemoryTransaction {
    id: Uuid,
    inner: Arc<StoreInner>,
    lock_timeout: Duration,
    held_locks: HashMap<SlotKey, OwnedMutexGuard<()>>,
    pending_slots: HashMap<SlotKey, Slot>,
    pending_appointments: BTreeMap<AppointmentId, Appointment>,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.pending_slots.is_empty() || !self.pending_appointments.is_empty() {
            debug!(
                "Transaction {} rolled back ({} slot writes, {} appointment writes discarded)",
                self.id,
                self.pending_slots.len(),
                self.pending_appointments.len()
            );
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn find_patient(&mut self, id: PatientId) -> Result<Option<Patient>, StoreError> {
        Ok(self.inner.read()?.patients.get(&id).cloned())
    }

    async fn find_patient_by_email(&mut self, email: &str) -> Result<Option<Patient>, StoreError> {
        let tables = self.inner.read()?;
        Ok(tables
            .patients
            .values()
            .find(|patient| patient.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_and_lock_slot(&mut self, key: &SlotKey) -> Result<Option<Slot>, StoreError> {
        if self.held_locks.contains_key(key) {
            if let Some(slot) = self.pending_slots.get(key) {
                return Ok(Some(slot.clone()));
            }
            return self.inner.committed_slot(key);
        }

        let lock = match self.inner.row_lock(key)? {
            Some(lock) => lock,
            None => {
                debug!("Transaction {}: no slot row for {}", self.id, key);
                return Ok(None);
            }
        };

        let guard = match tokio::time::timeout(self.lock_timeout, lock.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                let waited_ms = u64::try_from(self.lock_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    "Transaction {}: lock wait on {} exceeded {}ms",
                    self.id, key, waited_ms
                );
                return Err(StoreError::Busy { waited_ms });
            }
        };
        self.held_locks.insert(key.clone(), guard);
        debug!("Transaction {}: locked slot {}", self.id, key);

        // Read only after the lock is held so the caller never sees counters
        // from before the previous holder committed.
        self.inner.committed_slot(key)
    }

    async fn save_slot(&mut self, slot: &Slot) -> Result<(), StoreError> {
        if !self.held_locks.contains_key(&slot.key) {
            return Err(StoreError::SlotNotLocked(slot.key.to_string()));
        }
        if slot.occupied > slot.total {
            return Err(StoreError::InvalidSlot {
                key: slot.key.to_string(),
                occupied: slot.occupied,
                total: slot.total,
            });
        }
        self.pending_slots.insert(slot.key.clone(), slot.clone());
        Ok(())
    }

    async fn find_appointment(&mut self, id: AppointmentId) -> Result<Option<Appointment>, StoreError> {
        if let Some(appointment) = self.pending_appointments.get(&id) {
            return Ok(Some(appointment.clone()));
        }
        self.inner.committed_appointment(id)
    }

    async fn insert_appointment(&mut self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let id = self.inner.next_appointment_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let row = Appointment {
            id,
            patient_id: appointment.patient_id,
            slot: appointment.slot,
            status: appointment.status,
            cancellation_reason: None,
            scheduled_at: appointment.scheduled_at,
            created_at: now,
            updated_at: now,
        };
        self.pending_appointments.insert(id, row.clone());
        Ok(row)
    }

    async fn save_appointment(&mut self, appointment: &Appointment) -> Result<(), StoreError> {
        let known = self.pending_appointments.contains_key(&appointment.id)
            || self.inner.committed_appointment(appointment.id)?.is_some();
        if !known {
            return Err(StoreError::UnknownAppointment(appointment.id));
        }
        self.pending_appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tx = self;
        let inner = Arc::clone(&tx.inner);
        let slot_writes = tx.pending_slots.len();
        let appointment_writes = tx.pending_appointments.len();
        {
            let mut tables = inner.write()?;
            for (key, slot) in tx.pending_slots.drain() {
                if let Some(row) = tables.slots.get_mut(&key) {
                    row.slot = slot;
                }
            }
            tables.appointments.append(&mut tx.pending_appointments);
        }
        debug!(
            "Transaction {} committed ({} slot writes, {} appointment writes)",
            tx.id, slot_writes, appointment_writes
        );
        // Row locks are released when `tx` drops here, after the writes are visible.
        Ok(())
    }
}
