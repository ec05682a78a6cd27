// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, AppointmentFilter, AppointmentListQuery, CancelAppointmentRequest,
    ReserveAppointmentRequest, SlotQuery,
};
use crate::services::BookingService;

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::InvalidSlot(msg) => AppError::InvalidSlot(msg),
        AppointmentError::SlotTaken => AppError::SlotTaken(
            "Este horario acaba de ser reservado por otro paciente".to_string(),
        ),
        AppointmentError::PromotionRejected(msg) => AppError::ValidationError(msg),
        AppointmentError::NotCancellable(status) => {
            AppError::BadRequest(format!("Appointment in status {} cannot be cancelled", status))
        }
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn patient_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))
}

/// The slot grid for one doctor and one date. Callers should only ask for
/// today or later; a past date simply generates against an empty ledger.
#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);
    let slots = service
        .available_slots(query.doctor_id, query.date, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(slots)))
}

#[axum::debug_handler]
pub async fn reserve_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ReserveAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_uuid(&user)?;

    let service = BookingService::new(&state);
    let appointment = service
        .reserve(patient_id, request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_uuid(&user)?;
    let filter = query.filter.unwrap_or(AppointmentFilter::Upcoming);

    let service = BookingService::new(&state);
    let appointments = service
        .list_appointments(patient_id, filter, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn next_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_uuid(&user)?;

    let service = BookingService::new(&state);
    let appointment = service
        .next_appointment(patient_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_uuid(&user)?;

    let service = BookingService::new(&state);
    let appointment = service
        .cancel(patient_id, appointment_id, request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}
