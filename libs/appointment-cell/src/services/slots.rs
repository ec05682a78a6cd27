//! Slot generation: the availability view the whole booking flow hangs off.
//!
//! The algorithm itself is a pure function over plain data; the service
//! around it only fetches that data. Keeping the split makes the boundary
//! cases (partial slots, blackouts, overlapping windows) testable without a
//! database in the loop.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::{DoctorScheduleWindow, ScheduleException};
use doctor_cell::services::DoctorService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, TimeSlot};

/// 0=Sunday..6=Saturday, matching the schedule table convention.
pub fn weekday_index(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_sunday() as i32
}

/// Candidate start times of one window, in order. A candidate whose end
/// would pass the window's end time is dropped, not truncated.
pub fn window_candidates(window: &DoctorScheduleWindow) -> Vec<NaiveTime> {
    let mut candidates = Vec::new();
    // A non-positive duration would loop forever; rows are validated at
    // write time but the generator must not trust that.
    if window.slot_duration <= 0 {
        return candidates;
    }

    let step = Duration::minutes(window.slot_duration as i64);
    let mut start = window.start_time;
    loop {
        let (end, wrapped) = start.overflowing_add_signed(step);
        if wrapped != 0 || end > window.end_time {
            break;
        }
        candidates.push(start);
        start = end;
    }
    candidates
}

/// Merge a date's active windows, knock out blackout dates and flag
/// occupied start times.
pub fn generate_day_slots(
    date: NaiveDate,
    windows: &[DoctorScheduleWindow],
    exceptions: &[ScheduleException],
    occupied: &HashSet<NaiveTime>,
) -> Vec<TimeSlot> {
    if exceptions.iter().any(|e| e.covers(date)) {
        return Vec::new();
    }

    let day_of_week = weekday_index(date);
    let mut starts = BTreeSet::new();
    for window in windows
        .iter()
        .filter(|w| w.is_active && w.day_of_week == day_of_week)
    {
        starts.extend(window_candidates(window));
    }

    starts
        .into_iter()
        .map(|slot_time| TimeSlot {
            is_available: !occupied.contains(&slot_time),
            slot_time,
        })
        .collect()
}

/// The window that produces `start_time` as a candidate on `date`, or None
/// when the time is not on the schedule. Windows are checked in declaration
/// order, so when two centers overlap the earlier-declared one wins.
pub fn window_for_slot<'a>(
    date: NaiveDate,
    windows: &'a [DoctorScheduleWindow],
    exceptions: &[ScheduleException],
    start_time: NaiveTime,
) -> Option<&'a DoctorScheduleWindow> {
    if exceptions.iter().any(|e| e.covers(date)) {
        return None;
    }

    let day_of_week = weekday_index(date);
    windows
        .iter()
        .filter(|w| w.is_active && w.day_of_week == day_of_week)
        .find(|w| window_candidates(w).contains(&start_time))
}

// ==============================================================================
// SERVICE
// ==============================================================================

/// Everything the generator needs to know about one (doctor, date).
pub struct DayContext {
    pub windows: Vec<DoctorScheduleWindow>,
    pub exceptions: Vec<ScheduleException>,
    pub occupied: HashSet<NaiveTime>,
}

#[derive(Debug, Deserialize)]
struct OccupiedRow {
    start_time: NaiveTime,
}

pub struct SlotService {
    supabase: Arc<SupabaseClient>,
    doctors: DoctorService,
}

impl SlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            doctors: DoctorService::new(config),
        }
    }

    /// The ordered slot list for one doctor on one date. Pure read; safe to
    /// retry on transient failures.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, AppointmentError> {
        debug!("Generating slots for doctor {} on {}", doctor_id, date);

        self.doctors
            .get_doctor(doctor_id, auth_token)
            .await
            .map_err(|e| match e {
                doctor_cell::models::DoctorError::NotFound => AppointmentError::DoctorNotFound,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        let context = self.day_context(doctor_id, date, auth_token).await?;
        let slots = generate_day_slots(date, &context.windows, &context.exceptions, &context.occupied);

        debug!("Generated {} slots ({} occupied)", slots.len(), context.occupied.len());
        Ok(slots)
    }

    /// Fetch windows, blackout ranges and occupied start times for one
    /// (doctor, date). Shared with the booking path, which re-derives slot
    /// membership at commit time.
    pub(crate) async fn day_context(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<DayContext, AppointmentError> {
        let windows_path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&day_of_week=eq.{}&is_active=eq.true&order=created_at.asc",
            doctor_id,
            weekday_index(date)
        );
        let windows: Vec<DoctorScheduleWindow> = self.fetch(&windows_path, auth_token).await?;

        let exceptions_path = format!(
            "/rest/v1/schedule_exceptions?doctor_id=eq.{}&start_date=lte.{}&end_date=gte.{}",
            doctor_id, date, date
        );
        let exceptions: Vec<ScheduleException> = self.fetch(&exceptions_path, auth_token).await?;

        let occupied_path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&status=in.(pending,confirmed)&select=start_time",
            doctor_id, date
        );
        let occupied_rows: Vec<OccupiedRow> = self.fetch(&occupied_path, auth_token).await?;
        let occupied = occupied_rows.into_iter().map(|r| r.start_time).collect();

        Ok(DayContext {
            windows,
            exceptions,
            occupied,
        })
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<T>, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse rows: {}", e)))
    }
}

// ==============================================================================
// TESTS
// ==============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn window(day_of_week: i32, start: NaiveTime, end: NaiveTime, slot_duration: i32) -> DoctorScheduleWindow {
        DoctorScheduleWindow {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            center_id: Uuid::new_v4(),
            day_of_week,
            start_time: start,
            end_time: end,
            slot_duration,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn exception(from: NaiveDate, to: NaiveDate) -> ScheduleException {
        ScheduleException {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            start_date: from,
            end_date: to,
            reason: None,
            created_at: Utc::now(),
        }
    }

    // 2026-03-02 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn monday_window_yields_six_half_hour_slots() {
        let windows = vec![window(1, t(9, 0), t(12, 0), 30)];
        let slots = generate_day_slots(monday(), &windows, &[], &HashSet::new());

        assert_eq!(slots.len(), 6);
        assert_eq!(slots[0].slot_time, t(9, 0));
        assert_eq!(slots[5].slot_time, t(11, 30));
        assert!(slots.iter().all(|s| s.is_available));
    }

    #[test]
    fn occupied_start_times_are_flagged_and_nothing_else() {
        let windows = vec![window(1, t(9, 0), t(12, 0), 30)];
        let occupied: HashSet<NaiveTime> = [t(10, 0)].into_iter().collect();

        let slots = generate_day_slots(monday(), &windows, &[], &occupied);

        assert_eq!(slots.len(), 6);
        for slot in &slots {
            assert_eq!(slot.is_available, slot.slot_time != t(10, 0));
        }
    }

    #[test]
    fn trailing_partial_slot_is_dropped() {
        // 08:00-08:50 with 30-minute slots: 08:30 would end 09:00 > 08:50.
        let windows = vec![window(1, t(8, 0), t(8, 50), 30)];
        let slots = generate_day_slots(monday(), &windows, &[], &HashSet::new());

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].slot_time, t(8, 0));
    }

    #[test]
    fn fully_booked_day_still_returns_every_slot() {
        let windows = vec![window(1, t(9, 0), t(10, 0), 30)];
        let occupied: HashSet<NaiveTime> = [t(9, 0), t(9, 30)].into_iter().collect();

        let slots = generate_day_slots(monday(), &windows, &[], &occupied);

        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| !s.is_available));
    }

    #[test]
    fn no_window_for_that_weekday_means_no_slots() {
        let windows = vec![window(3, t(9, 0), t(12, 0), 30)]; // Wednesday only
        assert!(generate_day_slots(monday(), &windows, &[], &HashSet::new()).is_empty());
    }

    #[test]
    fn inactive_windows_are_ignored() {
        let mut w = window(1, t(9, 0), t(12, 0), 30);
        w.is_active = false;
        assert!(generate_day_slots(monday(), &[w], &[], &HashSet::new()).is_empty());
    }

    #[test]
    fn blackout_date_yields_empty_list() {
        let windows = vec![window(1, t(9, 0), t(12, 0), 30)];
        let exceptions = vec![exception(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(),
        )];

        assert!(generate_day_slots(monday(), &windows, &exceptions, &HashSet::new()).is_empty());
    }

    #[test]
    fn blackout_outside_the_date_does_not_apply() {
        let windows = vec![window(1, t(9, 0), t(12, 0), 30)];
        let exceptions = vec![exception(
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
        )];

        assert_eq!(
            generate_day_slots(monday(), &windows, &exceptions, &HashSet::new()).len(),
            6
        );
    }

    #[test]
    fn overlapping_windows_collapse_duplicate_start_times() {
        // Two centers, same morning: 09:00-11:00 and 10:00-12:00, both 30 min.
        let windows = vec![
            window(1, t(9, 0), t(11, 0), 30),
            window(1, t(10, 0), t(12, 0), 30),
        ];
        let slots = generate_day_slots(monday(), &windows, &[], &HashSet::new());

        let times: Vec<NaiveTime> = slots.iter().map(|s| s.slot_time).collect();
        assert_eq!(
            times,
            vec![t(9, 0), t(9, 30), t(10, 0), t(10, 30), t(11, 0), t(11, 30)]
        );
    }

    #[test]
    fn window_ending_at_midnight_terminates() {
        let windows = vec![window(1, t(23, 0), t(23, 59), 30)];
        let slots = generate_day_slots(monday(), &windows, &[], &HashSet::new());

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].slot_time, t(23, 0));
    }

    #[test]
    fn corrupt_zero_duration_window_is_skipped() {
        let mut w = window(1, t(9, 0), t(12, 0), 30);
        w.slot_duration = 0;
        assert!(generate_day_slots(monday(), &[w], &[], &HashSet::new()).is_empty());
    }

    #[test]
    fn window_for_slot_finds_the_producing_window() {
        let windows = vec![
            window(1, t(9, 0), t(11, 0), 30),
            window(1, t(10, 0), t(12, 0), 20),
        ];

        // 10:00 is produced by both; the earlier-declared window wins.
        let w = window_for_slot(monday(), &windows, &[], t(10, 0)).unwrap();
        assert_eq!(w.slot_duration, 30);

        // 11:40 only exists in the second window's grid.
        let w = window_for_slot(monday(), &windows, &[], t(11, 40)).unwrap();
        assert_eq!(w.slot_duration, 20);

        // 10:10 is on nobody's grid.
        assert!(window_for_slot(monday(), &windows, &[], t(10, 10)).is_none());
    }

    #[test]
    fn window_for_slot_respects_blackouts() {
        let windows = vec![window(1, t(9, 0), t(12, 0), 30)];
        let exceptions = vec![exception(monday(), monday())];

        assert!(window_for_slot(monday(), &windows, &exceptions, t(9, 0)).is_none());
    }

    #[test]
    fn weekday_index_uses_sunday_zero() {
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()), 0); // Sunday
        assert_eq!(weekday_index(monday()), 1);
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()), 6); // Saturday
    }
}
