// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};

use shared_models::error::AppError;
use shared_models::{AppointmentId, ExamId, FacilityId, SlotKey};
use shared_utils::AuthenticatedPatient;

use crate::models::{BookAppointmentRequest, CancelAppointmentRequest, SchedulingError};
use crate::services::booking::SchedulingService;

/// Maps core failures onto HTTP errors. Every not-found case reuses the
/// error's own message, so a foreign appointment reads exactly like a missing one.
fn into_app_error(err: SchedulingError) -> AppError {
    match err {
        SchedulingError::PatientNotFound
        | SchedulingError::NoAvailability
        | SchedulingError::AppointmentNotFound => AppError::NotFound(err.to_string()),
        SchedulingError::SlotsExhausted | SchedulingError::InvalidState(_) => {
            AppError::Conflict(err.to_string())
        }
        SchedulingError::Validation(msg) => AppError::ValidationError(msg),
        SchedulingError::Busy => AppError::Busy(err.to_string()),
        SchedulingError::InvariantViolation(_) | SchedulingError::Storage(_) => {
            AppError::Internal(err.to_string())
        }
    }
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(service): State<Arc<SchedulingService>>,
    AuthenticatedPatient(patient_id): AuthenticatedPatient,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(request) = payload?;
    let appointment = service
        .book_appointment(patient_id, request.facility_id, request.exam_id, request.date_time)
        .await
        .map_err(into_app_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(service): State<Arc<SchedulingService>>,
    AuthenticatedPatient(patient_id): AuthenticatedPatient,
    Path(appointment_id): Path<AppointmentId>,
    payload: Result<Json<CancelAppointmentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload?;
    let appointment = service
        .cancel_appointment(patient_id, appointment_id, &request.reason)
        .await
        .map_err(into_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

// ==============================================================================
// QUERY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(service): State<Arc<SchedulingService>>,
    AuthenticatedPatient(patient_id): AuthenticatedPatient,
    Path(appointment_id): Path<AppointmentId>,
) -> Result<Json<Value>, AppError> {
    let appointment = service
        .get_appointment(patient_id, appointment_id)
        .await
        .map_err(into_app_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(service): State<Arc<SchedulingService>>,
    AuthenticatedPatient(patient_id): AuthenticatedPatient,
) -> Result<Json<Value>, AppError> {
    let appointments = service
        .list_appointments(patient_id)
        .await
        .map_err(into_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_slot_availability(
    State(service): State<Arc<SchedulingService>>,
    _patient: AuthenticatedPatient,
    Path((facility_id, exam_id, date, time)): Path<(FacilityId, ExamId, NaiveDate, NaiveTime)>,
) -> Result<Json<Value>, AppError> {
    let key = SlotKey::new(facility_id, exam_id, date, time);
    let availability = service
        .slot_availability(&key)
        .await
        .map_err(into_app_error)?;

    Ok(Json(json!(availability)))
}
