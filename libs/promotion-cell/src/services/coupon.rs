use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CouponValidation, Promotion, PromotionError};

pub struct CouponService {
    supabase: Arc<SupabaseClient>,
}

/// Redemption rule chain. First failing rule wins; messages are the
/// patient-facing strings the booking screen shows verbatim.
pub fn check_promotion(
    promotion: &Promotion,
    specialty_id: Option<Uuid>,
    today: NaiveDate,
) -> Result<(), &'static str> {
    if !promotion.is_active {
        return Err("Este cupon ya no esta disponible");
    }
    if today < promotion.valid_from || today > promotion.valid_to {
        return Err("Cupon expirado");
    }
    if let Some(max_uses) = promotion.max_uses {
        if promotion.current_uses >= max_uses {
            return Err("Este cupon alcanzo su limite de usos");
        }
    }
    if let Some(promo_specialty) = promotion.specialty_id {
        if specialty_id != Some(promo_specialty) {
            return Err("Este cupon no aplica a esta especialidad");
        }
    }
    Ok(())
}

impl CouponService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    /// Validate a coupon code for the booking screen. An unknown or
    /// rejected coupon is a normal answer, not an error.
    pub async fn validate_coupon(
        &self,
        coupon_code: &str,
        specialty_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<CouponValidation, PromotionError> {
        let code = coupon_code.trim().to_uppercase();
        debug!("Validating coupon: {}", code);

        let promotion = match self.find_by_code(&code, auth_token).await? {
            Some(promotion) => promotion,
            None => return Ok(CouponValidation::invalid("Cupon no encontrado")),
        };

        match check_promotion(&promotion, specialty_id, Utc::now().date_naive()) {
            Ok(()) => Ok(CouponValidation::valid(&promotion)),
            Err(message) => Ok(CouponValidation::invalid(message)),
        }
    }

    /// Re-validate a promotion at booking-commit time. Unlike
    /// `validate_coupon` this is strict: a failing rule aborts the caller.
    pub async fn validate_promotion_id(
        &self,
        promotion_id: Uuid,
        specialty_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Promotion, PromotionError> {
        let path = format!("/rest/v1/promotions?id=eq.{}", promotion_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PromotionError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(PromotionError::NotFound)?;
        let promotion: Promotion = serde_json::from_value(row)
            .map_err(|e| PromotionError::DatabaseError(format!("Failed to parse promotion: {}", e)))?;

        check_promotion(&promotion, specialty_id, Utc::now().date_naive())
            .map_err(|message| PromotionError::Rejected(message.to_string()))?;

        Ok(promotion)
    }

    /// Count one redemption. The increment lives in a stored procedure so
    /// concurrent redemptions cannot lose updates; if the procedure is
    /// missing we fall back to read-then-write, which can undercount under
    /// concurrency. That trade-off is accepted: usage counts are
    /// best-effort, bookings are not.
    pub async fn increment_usage(
        &self,
        promotion_id: Uuid,
        auth_token: &str,
    ) -> Result<(), PromotionError> {
        let rpc_result = self
            .supabase
            .rpc(
                "increment_coupon_usage",
                json!({ "p_promotion_id": promotion_id }),
                Some(auth_token),
            )
            .await;

        if let Err(e) = rpc_result {
            warn!(
                "increment_coupon_usage rpc unavailable ({}), falling back to read-then-write",
                e
            );
            return self.increment_usage_fallback(promotion_id, auth_token).await;
        }

        Ok(())
    }

    pub async fn list_active(&self, auth_token: &str) -> Result<Vec<Promotion>, PromotionError> {
        let path = "/rest/v1/promotions?is_active=eq.true&order=created_at.desc";
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| PromotionError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Promotion>, _>>()
            .map_err(|e| PromotionError::DatabaseError(format!("Failed to parse promotions: {}", e)))
    }

    async fn find_by_code(
        &self,
        code: &str,
        auth_token: &str,
    ) -> Result<Option<Promotion>, PromotionError> {
        let path = format!("/rest/v1/promotions?coupon_code=eq.{}&limit=1", code);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PromotionError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| PromotionError::DatabaseError(format!("Failed to parse promotion: {}", e))),
            None => Ok(None),
        }
    }

    async fn increment_usage_fallback(
        &self,
        promotion_id: Uuid,
        auth_token: &str,
    ) -> Result<(), PromotionError> {
        let path = format!(
            "/rest/v1/promotions?id=eq.{}&select=current_uses",
            promotion_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PromotionError::DatabaseError(e.to_string()))?;

        let current = result
            .first()
            .and_then(|row| row["current_uses"].as_i64())
            .ok_or(PromotionError::NotFound)?;

        let patch_path = format!("/rest/v1/promotions?id=eq.{}", promotion_id);
        let _: Vec<Value> = self
            .supabase
            .request(
                Method::PATCH,
                &patch_path,
                Some(auth_token),
                Some(json!({ "current_uses": current + 1 })),
            )
            .await
            .map_err(|e| PromotionError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PromotionType;
    use chrono::Duration;

    fn promotion() -> Promotion {
        let today = Utc::now().date_naive();
        Promotion {
            id: Uuid::new_v4(),
            promotion_type: PromotionType::Percentage,
            title: "Descuento de prueba".to_string(),
            description: None,
            discount_value: 20.0,
            specialty_id: None,
            coupon_code: Some("PRUEBA20".to_string()),
            valid_from: today - Duration::days(7),
            valid_to: today + Duration::days(7),
            max_uses: Some(100),
            current_uses: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    #[test]
    fn a_healthy_promotion_passes() {
        assert!(check_promotion(&promotion(), None, today()).is_ok());
    }

    #[test]
    fn inactive_wins_over_every_other_rule() {
        let mut promo = promotion();
        promo.is_active = false;
        promo.valid_to = today() - Duration::days(1); // also expired
        assert_eq!(
            check_promotion(&promo, None, today()).unwrap_err(),
            "Este cupon ya no esta disponible"
        );
    }

    #[test]
    fn expired_yesterday_is_rejected() {
        let mut promo = promotion();
        promo.valid_to = today() - Duration::days(1);
        assert_eq!(
            check_promotion(&promo, None, today()).unwrap_err(),
            "Cupon expirado"
        );
    }

    #[test]
    fn not_yet_valid_is_rejected() {
        let mut promo = promotion();
        promo.valid_from = today() + Duration::days(1);
        assert!(check_promotion(&promo, None, today()).is_err());
    }

    #[test]
    fn exhausted_usage_cap_is_rejected() {
        let mut promo = promotion();
        promo.max_uses = Some(1);
        promo.current_uses = 1;
        assert_eq!(
            check_promotion(&promo, None, today()).unwrap_err(),
            "Este cupon alcanzo su limite de usos"
        );
    }

    #[test]
    fn unlimited_promotion_ignores_usage_count() {
        let mut promo = promotion();
        promo.max_uses = None;
        promo.current_uses = 10_000;
        assert!(check_promotion(&promo, None, today()).is_ok());
    }

    #[test]
    fn specialty_restriction_requires_a_match() {
        let specialty = Uuid::new_v4();
        let mut promo = promotion();
        promo.specialty_id = Some(specialty);

        assert!(check_promotion(&promo, Some(specialty), today()).is_ok());
        assert!(check_promotion(&promo, Some(Uuid::new_v4()), today()).is_err());
        assert!(check_promotion(&promo, None, today()).is_err());
    }
}
