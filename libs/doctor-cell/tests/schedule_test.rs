// libs/doctor-cell/tests/schedule_test.rs
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::{
    CreateExceptionRequest, CreateScheduleRequest, DoctorError,
};
use doctor_cell::services::{DoctorService, ScheduleService};
use shared_utils::test_utils::TestConfig;

const TOKEN: &str = "test_token";

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn schedule_row(doctor_id: Uuid, day_of_week: i32, start: &str, end: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "doctor_id": doctor_id,
        "center_id": Uuid::new_v4(),
        "day_of_week": day_of_week,
        "start_time": start,
        "end_time": end,
        "slot_duration": 30,
        "is_active": true,
        "created_at": "2025-01-10T09:00:00Z"
    })
}

async fn schedule_service(server: &MockServer) -> ScheduleService {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    ScheduleService::new(&config)
}

#[tokio::test]
async fn list_windows_returns_parsed_rows() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            schedule_row(doctor_id, 1, "09:00:00", "12:00:00"),
            schedule_row(doctor_id, 3, "14:00:00", "18:00:00"),
        ]))
        .mount(&server)
        .await;

    let service = schedule_service(&server).await;
    let windows = service.list_windows(doctor_id, TOKEN).await.unwrap();

    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0].day_of_week, 1);
    assert_eq!(windows[0].start_time, t(9, 0));
    assert_eq!(windows[1].end_time, t(18, 0));
}

#[tokio::test]
async fn create_window_persists_and_returns_representation() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(vec![schedule_row(doctor_id, 1, "09:00:00", "12:00:00")]),
        )
        .mount(&server)
        .await;

    let service = schedule_service(&server).await;
    let window = service
        .create_window(
            doctor_id,
            CreateScheduleRequest {
                center_id: Uuid::new_v4(),
                day_of_week: 1,
                start_time: t(9, 0),
                end_time: t(12, 0),
                slot_duration: 30,
            },
            TOKEN,
        )
        .await
        .unwrap();

    assert_eq!(window.doctor_id, doctor_id);
    assert!(window.is_active);
}

#[tokio::test]
async fn create_window_rejects_inverted_range_before_any_write() {
    // No mock mounted: a request against the server would 404 and surface
    // as a database error instead of the validation error we expect.
    let server = MockServer::start().await;
    let service = schedule_service(&server).await;

    let err = service
        .create_window(
            Uuid::new_v4(),
            CreateScheduleRequest {
                center_id: Uuid::new_v4(),
                day_of_week: 1,
                start_time: t(12, 0),
                end_time: t(9, 0),
                slot_duration: 30,
            },
            TOKEN,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DoctorError::InvalidSchedule(_)));
}

#[tokio::test]
async fn create_exception_rejects_inverted_date_range() {
    let server = MockServer::start().await;
    let service = schedule_service(&server).await;

    let err = service
        .create_exception(
            Uuid::new_v4(),
            CreateExceptionRequest {
                start_date: d(2026, 9, 10),
                end_date: d(2026, 9, 1),
                reason: Some("vacaciones".to_string()),
            },
            TOKEN,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DoctorError::InvalidSchedule(_)));
}

#[tokio::test]
async fn list_exceptions_parses_blackout_ranges() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_exceptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "start_date": "2026-09-01",
            "end_date": "2026-09-07",
            "reason": "feriado",
            "created_at": "2025-01-10T09:00:00Z"
        })]))
        .mount(&server)
        .await;

    let service = schedule_service(&server).await;
    let exceptions = service
        .list_exceptions(doctor_id, Some(d(2026, 9, 3)), Some(d(2026, 9, 30)), TOKEN)
        .await
        .unwrap();

    assert_eq!(exceptions.len(), 1);
    assert!(exceptions[0].covers(d(2026, 9, 3)));
    assert!(!exceptions[0].covers(d(2026, 9, 8)));
}

#[tokio::test]
async fn get_doctor_treats_inactive_as_missing() {
    let server = MockServer::start().await;

    // is_active=eq.true filter means the backend answers with no rows.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    let service = DoctorService::new(&config);

    let err = service.get_doctor(Uuid::new_v4(), TOKEN).await.unwrap_err();
    assert!(matches!(err, DoctorError::NotFound));
}
