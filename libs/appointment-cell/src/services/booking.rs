// libs/appointment-cell/src/services/booking.rs
use chrono::{Duration, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::{Doctor, DoctorError};
use doctor_cell::services::DoctorService;
use promotion_cell::models::PromotionError;
use promotion_cell::services::{pricing, CouponService};
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentStatus,
    CancelAppointmentRequest, ReserveAppointmentRequest,
};
use crate::services::slots::{self, SlotService};

pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    slots: SlotService,
    doctors: DoctorService,
    coupons: CouponService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            slots: SlotService::new(config),
            doctors: DoctorService::new(config),
            coupons: CouponService::new(config),
        }
    }

    /// Reserve one slot for one patient.
    ///
    /// Double-booking protection is NOT a read-then-write check: the
    /// appointments table carries a partial unique index over
    /// (doctor_id, date, start_time) for active statuses, and of N
    /// concurrent inserts the database lets exactly one through. Losing
    /// that race is reported as `SlotTaken`, a final outcome the UI turns
    /// into "refresh and pick another time".
    pub async fn reserve(
        &self,
        patient_id: Uuid,
        request: ReserveAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Reserving {} {} for patient {} with doctor {}",
            request.date, request.start_time, patient_id, request.doctor_id
        );

        let doctor = self.fetch_doctor(request.doctor_id, auth_token).await?;

        // Re-derive the slot from the schedule instead of trusting the
        // client's wizard state; this also yields the window whose
        // duration defines end_time.
        let context = self
            .slots
            .day_context(request.doctor_id, request.date, auth_token)
            .await?;
        let window = slots::window_for_slot(
            request.date,
            &context.windows,
            &context.exceptions,
            request.start_time,
        )
        .ok_or_else(|| {
            AppointmentError::InvalidSlot(
                "El horario solicitado no pertenece a la agenda del doctor".to_string(),
            )
        })?;

        // Advisory fast-path; the unique index remains the actual guard.
        if context.occupied.contains(&request.start_time) {
            return Err(AppointmentError::SlotTaken);
        }

        let end_time = request
            .start_time
            .overflowing_add_signed(Duration::minutes(window.slot_duration as i64))
            .0;

        // Price is always the doctor's current fee; a coupon is re-checked
        // against the full rule chain at commit time.
        let price = doctor.consultation_price;
        let (discount_amount, final_price) = match request.promotion_id {
            Some(promotion_id) => {
                let promotion = self
                    .coupons
                    .validate_promotion_id(promotion_id, Some(doctor.specialty_id), auth_token)
                    .await
                    .map_err(|e| match e {
                        PromotionError::NotFound => {
                            AppointmentError::PromotionRejected("Cupon no encontrado".to_string())
                        }
                        PromotionError::Rejected(msg) => AppointmentError::PromotionRejected(msg),
                        PromotionError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
                    })?;
                let discount = pricing::compute_discount(
                    promotion.promotion_type,
                    promotion.discount_value,
                    price,
                );
                (discount, pricing::final_price(price, discount))
            }
            None => (0.0, price),
        };

        let now = Utc::now();
        let row = json!({
            "patient_id": patient_id,
            "doctor_id": request.doctor_id,
            "center_id": request.center_id,
            "type": request.appointment_type,
            "date": request.date.format("%Y-%m-%d").to_string(),
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": end_time.format("%H:%M:%S").to_string(),
            "status": AppointmentStatus::Confirmed.to_string(),
            "price": price,
            "discount_amount": discount_amount,
            "final_price": final_price,
            "promotion_id": request.promotion_id,
            "payment_status": "completed",
            "notes": request.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let result: Vec<Value> = self
            .supabase
            .insert("/rest/v1/appointments", row, Some(auth_token))
            .await
            .map_err(|e| match e {
                SupabaseError::UniqueViolation(_) => AppointmentError::SlotTaken,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        let appointment: Appointment = parse_first(result)?;

        // The booking is committed; an uncounted coupon redemption is a
        // recoverable inconsistency, a vanished paid appointment is not.
        if let Some(promotion_id) = request.promotion_id {
            if let Err(e) = self.coupons.increment_usage(promotion_id, auth_token).await {
                warn!(
                    "Coupon usage increment failed for promotion {} after appointment {}: {}",
                    promotion_id, appointment.id, e
                );
            }
        }

        info!(
            "Appointment {} confirmed for doctor {} on {} at {}",
            appointment.id, appointment.doctor_id, appointment.date, appointment.start_time
        );
        Ok(appointment)
    }

    pub async fn list_appointments(
        &self,
        patient_id: Uuid,
        filter: AppointmentFilter,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let today = Utc::now().date_naive();
        let path = match filter {
            AppointmentFilter::Upcoming => format!(
                "/rest/v1/appointments?patient_id=eq.{}&date=gte.{}&status=in.(pending,confirmed)&order=date.asc,start_time.asc",
                patient_id, today
            ),
            AppointmentFilter::Past => format!(
                "/rest/v1/appointments?patient_id=eq.{}&or=(date.lt.{},status.in.(completed,cancelled,no_show))&order=date.desc,start_time.desc",
                patient_id, today
            ),
        };

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }

    pub async fn next_appointment(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let today = Utc::now().date_naive();
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&date=gte.{}&status=in.(pending,confirmed)&order=date.asc,start_time.asc&limit=1",
            patient_id, today
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row).map(Some).map_err(|e| {
                AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))
            }),
            None => Ok(None),
        }
    }

    /// Patient-initiated cancellation. Cancelling drops the row out of the
    /// active-status unique index, which is what frees the slot.
    pub async fn cancel(
        &self,
        patient_id: Uuid,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {} for patient {}", appointment_id, patient_id);

        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        if appointment.patient_id != patient_id {
            // Do not reveal other patients' appointments.
            return Err(AppointmentError::NotFound);
        }
        if !appointment.status.occupies_slot() {
            return Err(AppointmentError::NotCancellable(appointment.status));
        }

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
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
                Some(json!({
                    "status": AppointmentStatus::Cancelled.to_string(),
                    "cancellation_reason": request.reason,
                    "updated_at": Utc::now().to_rfc3339(),
                })),
                Some(headers),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let cancelled: Appointment = parse_first(result)?;
        info!("Appointment {} cancelled", cancelled.id);
        Ok(cancelled)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    /// Slot listing passthrough so handlers only need one service.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<crate::models::TimeSlot>, AppointmentError> {
        self.slots.available_slots(doctor_id, date, auth_token).await
    }

    async fn fetch_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Doctor, AppointmentError> {
        self.doctors
            .get_doctor(doctor_id, auth_token)
            .await
            .map_err(|e| match e {
                DoctorError::NotFound => AppointmentError::DoctorNotFound,
                other => AppointmentError::DatabaseError(other.to_string()),
            })
    }
}

fn parse_first(rows: Vec<Value>) -> Result<Appointment, AppointmentError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| AppointmentError::DatabaseError("Empty representation returned".to_string()))?;
    serde_json::from_value(row)
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
}
