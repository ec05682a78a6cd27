// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// BOOKING LEDGER MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    /// None for virtual consultations.
    pub center_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub price: f64,
    pub discount_amount: f64,
    pub final_price: Option<f64>,
    pub promotion_id: Option<Uuid>,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    Presencial,
    Virtual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Active statuses hold their slot; everything else frees it.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// One bookable start time, recomputed on every query. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSlot {
    pub slot_time: NaiveTime,
    pub is_available: bool,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// What a client may ask for. Price, end time and discount are derived
/// server-side at commit; a stale browser cannot under-pay or overrun a
/// window by sending its own numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveAppointmentRequest {
    pub doctor_id: Uuid,
    pub center_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub notes: Option<String>,
    pub promotion_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentFilter {
    Upcoming,
    Past,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    pub filter: Option<AppointmentFilter>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Appointment not found")]
    NotFound,

    /// The requested start time is not one the doctor's schedule produces
    /// for that date.
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    /// A concurrent booking holds the slot. Final outcome; never retried.
    #[error("Slot already taken")]
    SlotTaken,

    #[error("Promotion rejected: {0}")]
    PromotionRejected(String),

    #[error("Appointment in status {0} cannot be cancelled")]
    NotCancellable(AppointmentStatus),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
