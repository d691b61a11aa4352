use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use scheduling_cell::{SchedulingError, SchedulingService};
use shared_database::{InMemoryStore, SchedulingStore, StoreTransaction};
use shared_models::{AppointmentStatus, Slot, SlotKey};
use shared_utils::test_utils::TestPatients;

const FACILITY: i64 = 10;
const EXAM: i64 = 20;

fn slot_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 12, 1)
        .unwrap()
        .and_time(NaiveTime::from_hms_opt(10, 30, 0).unwrap())
}

fn slot_key() -> SlotKey {
    SlotKey::from_date_time(FACILITY, EXAM, slot_time())
}

fn setup(total: u32, patients: i64) -> (InMemoryStore, SchedulingService) {
    setup_with_timeout(total, patients, Duration::from_secs(5))
}

fn setup_with_timeout(total: u32, patients: i64, timeout: Duration) -> (InMemoryStore, SchedulingService) {
    let store = InMemoryStore::new(timeout);
    for id in 1..=patients {
        store.insert_patient(TestPatients::patient(id)).unwrap();
    }
    store.insert_slot(Slot::new(slot_key(), total)).unwrap();
    let service = SchedulingService::new(Arc::new(store.clone()));
    (store, service)
}

async fn occupied(store: &InMemoryStore) -> u32 {
    store.find_slot(&slot_key()).await.unwrap().unwrap().occupied
}

#[tokio::test]
async fn test_book_confirms_and_occupies() {
    let (store, service) = setup(1, 2);

    let appointment = service
        .book_appointment(1, FACILITY, EXAM, slot_time())
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Confirmado);
    assert_eq!(appointment.patient_id, 1);
    assert_eq!(appointment.slot, slot_key());
    assert_eq!(appointment.scheduled_at, slot_time());
    assert_eq!(occupied(&store).await, 1);
}

#[tokio::test]
async fn test_book_full_slot_is_refused_without_side_effects() {
    let (store, service) = setup(1, 2);
    service.book_appointment(1, FACILITY, EXAM, slot_time()).await.unwrap();

    let err = service
        .book_appointment(2, FACILITY, EXAM, slot_time())
        .await
        .unwrap_err();

    assert_eq!(err, SchedulingError::SlotsExhausted);
    assert_eq!(occupied(&store).await, 1);
    assert!(service.list_appointments(2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_book_unknown_patient() {
    let (store, service) = setup(1, 1);

    let err = service
        .book_appointment(42, FACILITY, EXAM, slot_time())
        .await
        .unwrap_err();

    assert_eq!(err, SchedulingError::PatientNotFound);
    assert_eq!(occupied(&store).await, 0);
}

#[tokio::test]
async fn test_book_without_slot_row() {
    let (_store, service) = setup(1, 1);
    let other_time = slot_time() + chrono::Duration::hours(1);

    let err = service
        .book_appointment(1, FACILITY, EXAM, other_time)
        .await
        .unwrap_err();

    assert_eq!(err, SchedulingError::NoAvailability);
}

#[tokio::test]
async fn test_book_zero_capacity_slot() {
    let (store, service) = setup(0, 1);

    let err = service
        .book_appointment(1, FACILITY, EXAM, slot_time())
        .await
        .unwrap_err();

    assert_eq!(err, SchedulingError::SlotsExhausted);
    assert_eq!(occupied(&store).await, 0);
}

#[tokio::test]
async fn test_cancel_releases_capacity_and_records_reason() {
    let (store, service) = setup(1, 2);
    let booked = service.book_appointment(1, FACILITY, EXAM, slot_time()).await.unwrap();

    let cancelled = service.cancel_appointment(1, booked.id, "x").await.unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelado);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("x"));
    assert_eq!(occupied(&store).await, 0);

    let stored = service.get_appointment(1, booked.id).await.unwrap();
    assert_eq!(stored, cancelled);

    // The freed unit is bookable again
    service.book_appointment(2, FACILITY, EXAM, slot_time()).await.unwrap();
    assert_eq!(occupied(&store).await, 1);
}

#[tokio::test]
async fn test_cancel_twice_is_invalid_state() {
    let (store, service) = setup(1, 1);
    let booked = service.book_appointment(1, FACILITY, EXAM, slot_time()).await.unwrap();
    service.cancel_appointment(1, booked.id, "x").await.unwrap();

    let err = service.cancel_appointment(1, booked.id, "again").await.unwrap_err();

    assert_eq!(err, SchedulingError::InvalidState(AppointmentStatus::Cancelado));
    assert_eq!(occupied(&store).await, 0);
    let stored = service.get_appointment(1, booked.id).await.unwrap();
    assert_eq!(stored.cancellation_reason.as_deref(), Some("x"));
}

#[tokio::test]
async fn test_cancel_foreign_appointment_looks_missing() {
    let (store, service) = setup(2, 2);
    let booked = service.book_appointment(1, FACILITY, EXAM, slot_time()).await.unwrap();

    let foreign = service.cancel_appointment(2, booked.id, "x").await.unwrap_err();
    let missing = service.cancel_appointment(2, 9_999, "x").await.unwrap_err();

    assert_eq!(foreign, SchedulingError::AppointmentNotFound);
    assert_eq!(foreign, missing);
    assert_eq!(foreign.to_string(), missing.to_string());

    assert_eq!(occupied(&store).await, 1);
    let stored = service.get_appointment(1, booked.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::Confirmado);
}

#[tokio::test]
async fn test_cancel_completed_appointment_is_refused() {
    let (store, service) = setup(1, 1);
    let booked = service.book_appointment(1, FACILITY, EXAM, slot_time()).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let mut completed = booked.clone();
    completed.status = AppointmentStatus::Completado;
    tx.save_appointment(&completed).await.unwrap();
    tx.commit().await.unwrap();

    let err = service.cancel_appointment(1, booked.id, "x").await.unwrap_err();

    assert_eq!(err, SchedulingError::InvalidState(AppointmentStatus::Completado));
    assert_eq!(occupied(&store).await, 1);
    let stored = service.get_appointment(1, booked.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::Completado);
    assert_eq!(stored.cancellation_reason, None);
}

#[tokio::test]
async fn test_cancel_requires_reason() {
    let (store, service) = setup(1, 1);
    let booked = service.book_appointment(1, FACILITY, EXAM, slot_time()).await.unwrap();

    let err = service.cancel_appointment(1, booked.id, "   ").await.unwrap_err();

    assert_matches!(err, SchedulingError::Validation(_));
    assert_eq!(occupied(&store).await, 1);
}

#[tokio::test]
async fn test_get_and_list_hide_other_patients() {
    let (_store, service) = setup(3, 2);
    let first = service.book_appointment(1, FACILITY, EXAM, slot_time()).await.unwrap();
    let second = service.book_appointment(1, FACILITY, EXAM, slot_time()).await.unwrap();
    service.book_appointment(2, FACILITY, EXAM, slot_time()).await.unwrap();

    let mine = service.list_appointments(1).await.unwrap();
    assert_eq!(mine.iter().map(|a| a.id).collect::<Vec<_>>(), vec![second.id, first.id]);

    assert_eq!(
        service.get_appointment(2, first.id).await.unwrap_err(),
        SchedulingError::AppointmentNotFound
    );
}

#[tokio::test]
async fn test_slot_availability() {
    let (_store, service) = setup(3, 1);
    service.book_appointment(1, FACILITY, EXAM, slot_time()).await.unwrap();

    let availability = service.slot_availability(&slot_key()).await.unwrap();
    assert_eq!(availability.total, 3);
    assert_eq!(availability.occupied, 1);
    assert_eq!(availability.remaining, 2);

    let missing = SlotKey::from_date_time(FACILITY, EXAM + 1, slot_time());
    assert_eq!(
        service.slot_availability(&missing).await.unwrap_err(),
        SchedulingError::NoAvailability
    );
}

#[tokio::test]
async fn test_lock_timeout_surfaces_as_busy() {
    let (store, service) = setup_with_timeout(1, 1, Duration::from_millis(50));

    // Another transaction is holding the slot row.
    let mut holder = store.begin().await.unwrap();
    holder.find_and_lock_slot(&slot_key()).await.unwrap().unwrap();

    let err = service
        .book_appointment(1, FACILITY, EXAM, slot_time())
        .await
        .unwrap_err();

    assert_eq!(err, SchedulingError::Busy);
    assert!(err.is_retryable());
    assert_eq!(occupied(&store).await, 0);

    drop(holder);
    service.book_appointment(1, FACILITY, EXAM, slot_time()).await.unwrap();
    assert_eq!(occupied(&store).await, 1);
}

#[tokio::test]
async fn test_cancel_release_on_empty_slot_is_invariant_violation() {
    let (store, service) = setup(1, 1);
    let booked = service.book_appointment(1, FACILITY, EXAM, slot_time()).await.unwrap();

    // Counters reset underneath a confirmed appointment.
    store.insert_slot(Slot::new(slot_key(), 1)).unwrap();

    let err = service.cancel_appointment(1, booked.id, "x").await.unwrap_err();

    assert_matches!(err, SchedulingError::InvariantViolation(_));
    assert!(!err.is_retryable());
    assert_eq!(occupied(&store).await, 0);
    let stored = service.get_appointment(1, booked.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::Confirmado);
    assert_eq!(stored.cancellation_reason, None);
}

#[tokio::test]
async fn test_cancel_lock_timeout_is_busy() {
    let (store, service) = setup_with_timeout(1, 1, Duration::from_millis(50));
    let booked = service.book_appointment(1, FACILITY, EXAM, slot_time()).await.unwrap();

    let mut holder = store.begin().await.unwrap();
    holder.find_and_lock_slot(&slot_key()).await.unwrap().unwrap();

    let err = service.cancel_appointment(1, booked.id, "x").await.unwrap_err();

    assert_eq!(err, SchedulingError::Busy);
    assert!(err.is_retryable());
    assert_eq!(occupied(&store).await, 1);
    let stored = service.get_appointment(1, booked.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::Confirmado);

    drop(holder);
    let cancelled = service.cancel_appointment(1, booked.id, "x").await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelado);
    assert_eq!(occupied(&store).await, 0);
}
