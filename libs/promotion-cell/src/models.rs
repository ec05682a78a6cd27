// libs/promotion-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// PROMOTION MODELS
// ==============================================================================

/// Each variant carries its own discount formula; see `services::pricing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromotionType {
    Percentage,
    Fixed,
    Bundle,
    FirstVisit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub promotion_type: PromotionType,
    pub title: String,
    pub description: Option<String>,
    pub discount_value: f64,
    /// None applies the promotion to every specialty.
    pub specialty_id: Option<Uuid>,
    /// Stored upper-cased; lookups upper-case the input before matching.
    pub coupon_code: Option<String>,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    /// None means unlimited redemptions.
    pub max_uses: Option<i32>,
    pub current_uses: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateCouponRequest {
    pub coupon_code: String,
    pub specialty_id: Option<Uuid>,
}

/// Mirror of what the booking UI consumes; invalid coupons answer with a
/// patient-facing message instead of an HTTP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponValidation {
    pub promotion_id: Option<Uuid>,
    pub promotion_type: Option<PromotionType>,
    pub title: Option<String>,
    pub discount_value: Option<f64>,
    pub is_valid: bool,
    pub error_message: Option<String>,
}

impl CouponValidation {
    pub fn valid(promotion: &Promotion) -> Self {
        Self {
            promotion_id: Some(promotion.id),
            promotion_type: Some(promotion.promotion_type),
            title: Some(promotion.title.clone()),
            discount_value: Some(promotion.discount_value),
            is_valid: true,
            error_message: None,
        }
    }

    pub fn invalid(message: &str) -> Self {
        Self {
            promotion_id: None,
            promotion_type: None,
            title: None,
            discount_value: None,
            is_valid: false,
            error_message: Some(message.to_string()),
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum PromotionError {
    #[error("Promotion not found")]
    NotFound,

    /// The promotion exists but failed a redemption rule; the message is
    /// already patient-facing.
    #[error("{0}")]
    Rejected(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
