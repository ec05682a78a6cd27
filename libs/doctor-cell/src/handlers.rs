// libs/doctor-cell/src/handlers.rs
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
    CreateExceptionRequest, CreateScheduleRequest, DoctorError, DoctorListQuery,
    ExceptionRangeQuery, UpdateScheduleRequest,
};
use crate::services::{DoctorService, ScheduleService};

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::ScheduleNotFound => AppError::NotFound("Schedule not found".to_string()),
        DoctorError::InvalidSchedule(msg) => AppError::ValidationError(msg),
        DoctorError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// Schedule writes belong to clinic staff, not patients.
fn require_staff(user: &User) -> Result<(), AppError> {
    if user.is_admin() || user.is_doctor() {
        Ok(())
    } else {
        Err(AppError::Auth(
            "Not authorized to manage schedules".to_string(),
        ))
    }
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let doctors = service
        .list_doctors(query.specialty_id, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctors)))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let doctor = service
        .get_doctor(doctor_id, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn list_schedules(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);
    let windows = service
        .list_windows(doctor_id, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(windows)))
}

#[axum::debug_handler]
pub async fn create_schedule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = ScheduleService::new(&state);
    let window = service
        .create_window(doctor_id, request, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn update_schedule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = ScheduleService::new(&state);
    let window = service
        .update_window(schedule_id, request, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn deactivate_schedule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = ScheduleService::new(&state);
    let window = service
        .deactivate_window(schedule_id, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn list_exceptions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
    Query(range): Query<ExceptionRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);
    let exceptions = service
        .list_exceptions(doctor_id, range.from, range.to, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(exceptions)))
}

#[axum::debug_handler]
pub async fn create_exception(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<CreateExceptionRequest>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = ScheduleService::new(&state);
    let exception = service
        .create_exception(doctor_id, request, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(exception)))
}
