use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreateExceptionRequest, CreateScheduleRequest, DoctorError, DoctorScheduleWindow,
    ScheduleException, UpdateScheduleRequest,
};

pub struct ScheduleService {
    supabase: SupabaseClient,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// All of a doctor's recurring windows, active and inactive, in
    /// declaration order within each weekday.
    pub async fn list_windows(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<DoctorScheduleWindow>, DoctorError> {
        debug!("Fetching schedule windows for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        parse_rows(result)
    }

    pub async fn create_window(
        &self,
        doctor_id: Uuid,
        request: CreateScheduleRequest,
        auth_token: &str,
    ) -> Result<DoctorScheduleWindow, DoctorError> {
        debug!("Creating schedule window for doctor: {}", doctor_id);

        validate_window_shape(request.day_of_week, request.start_time, request.end_time, request.slot_duration)?;

        let row = json!({
            "doctor_id": doctor_id,
            "center_id": request.center_id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "slot_duration": request.slot_duration,
            "is_active": true,
            "created_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self
            .supabase
            .insert("/rest/v1/doctor_schedules", row, Some(auth_token))
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        first_row(result)
    }

    pub async fn update_window(
        &self,
        schedule_id: Uuid,
        request: UpdateScheduleRequest,
        auth_token: &str,
    ) -> Result<DoctorScheduleWindow, DoctorError> {
        debug!("Updating schedule window: {}", schedule_id);

        let current = self.get_window(schedule_id, auth_token).await?;

        let start = request.start_time.unwrap_or(current.start_time);
        let end = request.end_time.unwrap_or(current.end_time);
        let duration = request.slot_duration.unwrap_or(current.slot_duration);
        validate_window_shape(current.day_of_week, start, end, duration)?;

        let mut update = serde_json::Map::new();
        if let Some(start_time) = request.start_time {
            update.insert(
                "start_time".to_string(),
                json!(start_time.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(end_time) = request.end_time {
            update.insert(
                "end_time".to_string(),
                json!(end_time.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(slot_duration) = request.slot_duration {
            update.insert("slot_duration".to_string(), json!(slot_duration));
        }
        if let Some(is_active) = request.is_active {
            update.insert("is_active".to_string(), json!(is_active));
        }

        let path = format!("/rest/v1/doctor_schedules?id=eq.{}", schedule_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update)),
                Some(headers),
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        first_row(result)
    }

    /// Windows referenced by historical appointments are never deleted,
    /// only switched off.
    pub async fn deactivate_window(
        &self,
        schedule_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorScheduleWindow, DoctorError> {
        self.update_window(
            schedule_id,
            UpdateScheduleRequest {
                start_time: None,
                end_time: None,
                slot_duration: None,
                is_active: Some(false),
            },
            auth_token,
        )
        .await
    }

    pub async fn list_exceptions(
        &self,
        doctor_id: Uuid,
        from: Option<chrono::NaiveDate>,
        to: Option<chrono::NaiveDate>,
        auth_token: &str,
    ) -> Result<Vec<ScheduleException>, DoctorError> {
        let mut path = format!(
            "/rest/v1/schedule_exceptions?doctor_id=eq.{}&order=start_date.asc",
            doctor_id
        );
        // A range overlaps [from, to] when it starts before the end and
        // ends after the start.
        if let Some(to) = to {
            path.push_str(&format!("&start_date=lte.{}", to));
        }
        if let Some(from) = from {
            path.push_str(&format!("&end_date=gte.{}", from));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        parse_rows(result)
    }

    pub async fn create_exception(
        &self,
        doctor_id: Uuid,
        request: CreateExceptionRequest,
        auth_token: &str,
    ) -> Result<ScheduleException, DoctorError> {
        if request.start_date > request.end_date {
            return Err(DoctorError::InvalidSchedule(
                "Exception start date must not be after end date".to_string(),
            ));
        }

        let row = json!({
            "doctor_id": doctor_id,
            "start_date": request.start_date,
            "end_date": request.end_date,
            "reason": request.reason,
            "created_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self
            .supabase
            .insert("/rest/v1/schedule_exceptions", row, Some(auth_token))
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        first_row(result)
    }

    async fn get_window(
        &self,
        schedule_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorScheduleWindow, DoctorError> {
        let path = format!("/rest/v1/doctor_schedules?id=eq.{}", schedule_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(DoctorError::ScheduleNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse schedule: {}", e)))
    }
}

/// Shape invariants shared by create and update paths.
fn validate_window_shape(
    day_of_week: i32,
    start_time: chrono::NaiveTime,
    end_time: chrono::NaiveTime,
    slot_duration: i32,
) -> Result<(), DoctorError> {
    if !(0..=6).contains(&day_of_week) {
        return Err(DoctorError::InvalidSchedule(
            "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }
    if start_time >= end_time {
        return Err(DoctorError::InvalidSchedule(
            "Start time must be before end time".to_string(),
        ));
    }
    if slot_duration <= 0 {
        return Err(DoctorError::InvalidSchedule(
            "Slot duration must be positive".to_string(),
        ));
    }
    Ok(())
}

fn parse_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, DoctorError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse rows: {}", e)))
}

fn first_row<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<T, DoctorError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| DoctorError::DatabaseError("Empty representation returned".to_string()))?;
    serde_json::from_value(row)
        .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse row: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn rejects_inverted_time_range() {
        let err = validate_window_shape(1, t(12, 0), t(9, 0), 30).unwrap_err();
        assert!(matches!(err, DoctorError::InvalidSchedule(_)));
    }

    #[test]
    fn rejects_zero_length_window() {
        assert!(validate_window_shape(1, t(9, 0), t(9, 0), 30).is_err());
    }

    #[test]
    fn rejects_out_of_range_weekday() {
        assert!(validate_window_shape(7, t(9, 0), t(12, 0), 30).is_err());
        assert!(validate_window_shape(-1, t(9, 0), t(12, 0), 30).is_err());
    }

    #[test]
    fn rejects_non_positive_slot_duration() {
        assert!(validate_window_shape(1, t(9, 0), t(12, 0), 0).is_err());
        assert!(validate_window_shape(1, t(9, 0), t(12, 0), -15).is_err());
    }

    #[test]
    fn accepts_window_with_trailing_partial_slot() {
        // 50-minute window with 30-minute slots is valid; the generator
        // drops the partial tail.
        assert!(validate_window_shape(1, t(8, 0), t(8, 50), 30).is_ok());
    }
}
