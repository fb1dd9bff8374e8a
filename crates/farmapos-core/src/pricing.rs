//! # Price Calculation
//!
//! Applies a resolved promotion to a base price. Pure, and deliberately
//! fussy about WHERE rounding happens: historical tickets rounded to
//! centavos after every pass, so this module does too — numeric parity
//! with years of persisted sales beats algebraic elegance.
//!
//! ## The Passes
//! ```text
//! base price
//!    │
//!    ▼  pass 1: day/seasonal (or senior-only 5%) ── round to centavos
//! unit price
//!    │
//!    ▼  pass 2: senior stack ×0.95 (only if pct < 25%) ── round again
//! final unit price
//!    │
//!    ▼  wallet accrual 2% of FINAL price ── round once more
//! accrual per unit
//! ```
//!
//! The two discount passes are never collapsed into one combined
//! percentage: `round(round(p·0.90)·0.95)` and `round(p·0.855)` disagree
//! by a centavo on some prices, and the ledger remembers.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{DiscountRate, Money};
use crate::promotion::EffectivePromotion;
use crate::{SENIOR_DISCOUNT_BPS, WALLET_ACCRUAL_BPS};

/// Result of pricing one unit of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedUnit {
    pub unit_price_final: Money,
    pub wallet_accrual_per_unit: Money,
}

/// Prices one unit under a resolved promotion.
///
/// - No promotion: the base price stands, no accrual.
/// - Quantity promo: paid units stay at base price (the benefit is the
///   free unit, injected by the cart), no accrual.
/// - Percentage promo: one rounded pass; senior stacks as a second rounded
///   ×0.95 pass; accrual is 2% of the final price, rounded, computed after
///   all passes.
pub fn price_unit(base: Money, promo: Option<&EffectivePromotion>) -> PricedUnit {
    let Some(promo) = promo else {
        return PricedUnit { unit_price_final: base, wallet_accrual_per_unit: Money::zero() };
    };

    if promo.is_quantity_promo() {
        return PricedUnit { unit_price_final: base, wallet_accrual_per_unit: Money::zero() };
    }

    let mut unit = base.apply_discount(promo.rate);
    if promo.senior_stacked {
        unit = unit.apply_discount(DiscountRate::from_bps(SENIOR_DISCOUNT_BPS));
    }

    let accrual = if promo.wallet_eligible {
        unit.take_rate(DiscountRate::from_bps(WALLET_ACCRUAL_BPS))
    } else {
        Money::zero()
    };

    PricedUnit { unit_price_final: unit, wallet_accrual_per_unit: accrual }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn promo(rate_bps: u32, wallet: bool, senior: bool) -> EffectivePromotion {
        EffectivePromotion {
            rate: DiscountRate::from_bps(rate_bps),
            label: "test".into(),
            wallet_eligible: wallet,
            senior_stacked: senior,
            required_count: None,
        }
    }

    #[test]
    fn test_no_promotion_keeps_base_price() {
        let out = price_unit(Money::from_cents(4500), None);
        assert_eq!(out.unit_price_final.cents(), 4500);
        assert!(out.wallet_accrual_per_unit.is_zero());
    }

    #[test]
    fn test_plain_percentage_pass() {
        let out = price_unit(Money::from_cents(10000), Some(&promo(1000, false, false)));
        assert_eq!(out.unit_price_final.cents(), 9000);
        assert!(out.wallet_accrual_per_unit.is_zero());
    }

    #[test]
    fn test_senior_stacks_as_second_pass() {
        // base 100.00, day 10% → 90.00; senior ×0.95 → 85.50
        let out = price_unit(Money::from_cents(10000), Some(&promo(1000, false, true)));
        assert_eq!(out.unit_price_final.cents(), 8550);
    }

    #[test]
    fn test_senior_only_flat_five_percent() {
        // Senior-only arrives as a plain 5% promotion from the resolver.
        let out = price_unit(Money::from_cents(10000), Some(&promo(500, true, false)));
        assert_eq!(out.unit_price_final.cents(), 9500);
        // Accrual 2% of 95.00 = 1.90
        assert_eq!(out.wallet_accrual_per_unit.cents(), 190);
    }

    #[test]
    fn test_accrual_computed_after_all_passes() {
        // 2% of the STACKED price (85.50 → 1.71), not of 90.00 (1.80).
        let out = price_unit(Money::from_cents(10000), Some(&promo(1000, true, true)));
        assert_eq!(out.unit_price_final.cents(), 8550);
        assert_eq!(out.wallet_accrual_per_unit.cents(), 171);
    }

    #[test]
    fn test_quantity_promo_prices_at_base_without_accrual() {
        let qty_promo = EffectivePromotion {
            rate: DiscountRate::zero(),
            label: "3x2-Gratis".into(),
            wallet_eligible: false,
            senior_stacked: false,
            required_count: Some(3),
        };
        let out = price_unit(Money::from_cents(4500), Some(&qty_promo));
        assert_eq!(out.unit_price_final.cents(), 4500);
        assert!(out.wallet_accrual_per_unit.is_zero());
    }

    #[test]
    fn test_price_never_exceeds_base_nor_goes_negative() {
        for bps in [0u32, 100, 2400, 2500, 5000, 9900, 10000] {
            for senior in [false, true] {
                let out = price_unit(Money::from_cents(9999), Some(&promo(bps, true, senior)));
                assert!(out.unit_price_final.cents() >= 0);
                assert!(out.unit_price_final.cents() <= 9999);
            }
        }
    }
}
