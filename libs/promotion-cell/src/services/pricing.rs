//! Discount arithmetic for the four promotion variants.
//!
//! All amounts are rounded to 2 decimals and a discount can never push the
//! final price below zero.

use crate::models::PromotionType;

pub fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Discount amount for a promotion applied to a base price.
///
/// `Bundle` intentionally shares the percentage formula: that is what the
/// production system does today, and until real bundle pricing is defined
/// matching it is the safer behavior.
pub fn compute_discount(
    promotion_type: PromotionType,
    discount_value: f64,
    base_price: f64,
) -> f64 {
    let discount = match promotion_type {
        PromotionType::Percentage => base_price * discount_value / 100.0,
        PromotionType::Fixed => discount_value.min(base_price),
        PromotionType::FirstVisit => base_price,
        PromotionType::Bundle => base_price * discount_value / 100.0,
    };
    round2(discount)
}

pub fn final_price(base_price: f64, discount_amount: f64) -> f64 {
    round2((base_price - discount_amount).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_discount_on_round_price() {
        let discount = compute_discount(PromotionType::Percentage, 20.0, 50.0);
        assert_eq!(discount, 10.0);
        assert_eq!(final_price(50.0, discount), 40.0);
    }

    #[test]
    fn fixed_discount_is_capped_at_base_price() {
        let discount = compute_discount(PromotionType::Fixed, 1000.0, 50.0);
        assert_eq!(discount, 50.0);
        assert_eq!(final_price(50.0, discount), 0.0);
    }

    #[test]
    fn fixed_discount_below_base_price_applies_as_is() {
        let discount = compute_discount(PromotionType::Fixed, 15.0, 50.0);
        assert_eq!(discount, 15.0);
        assert_eq!(final_price(50.0, discount), 35.0);
    }

    #[test]
    fn first_visit_waives_the_full_price() {
        let discount = compute_discount(PromotionType::FirstVisit, 0.0, 75.5);
        assert_eq!(discount, 75.5);
        assert_eq!(final_price(75.5, discount), 0.0);
    }

    #[test]
    fn bundle_mirrors_percentage_behavior() {
        let bundle = compute_discount(PromotionType::Bundle, 25.0, 80.0);
        let percentage = compute_discount(PromotionType::Percentage, 25.0, 80.0);
        assert_eq!(bundle, percentage);
    }

    #[test]
    fn discounts_round_to_two_decimals() {
        // 33% of 49.99 = 16.4967
        let discount = compute_discount(PromotionType::Percentage, 33.0, 49.99);
        assert_eq!(discount, 16.50);
        assert_eq!(final_price(49.99, discount), 33.49);
    }
}
