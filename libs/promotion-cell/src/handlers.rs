// libs/promotion-cell/src/handlers.rs
use std::sync::Arc;

use axum::{extract::State, Json};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{PromotionError, ValidateCouponRequest};
use crate::services::CouponService;

fn map_promotion_error(e: PromotionError) -> AppError {
    match e {
        PromotionError::NotFound => AppError::NotFound("Promotion not found".to_string()),
        PromotionError::Rejected(msg) => AppError::ValidationError(msg),
        PromotionError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// Coupon validation for the booking wizard. Invalid coupons return 200
/// with `is_valid=false` so the UI can show the message inline.
#[axum::debug_handler]
pub async fn validate_coupon(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Json<Value>, AppError> {
    if request.coupon_code.trim().is_empty() {
        return Err(AppError::BadRequest("Coupon code is required".to_string()));
    }

    let service = CouponService::new(&state);
    let validation = service
        .validate_coupon(&request.coupon_code, request.specialty_id, auth.token())
        .await
        .map_err(map_promotion_error)?;

    Ok(Json(json!(validation)))
}

#[axum::debug_handler]
pub async fn list_promotions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = CouponService::new(&state);
    let promotions = service
        .list_active(auth.token())
        .await
        .map_err(map_promotion_error)?;

    Ok(Json(json!(promotions)))
}
