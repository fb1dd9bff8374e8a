//! # Promotion Resolution
//!
//! Selects WHICH promotion governs a cart line. Pure and stateless: the
//! same `(context, date, profile)` always resolves to the same promotion,
//! which is what lets the cashier UI preview with the exact function the
//! server settles with.
//!
//! ## Fixed Precedence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  resolve(context, date, profile)                                    │
//! │                                                                     │
//! │  1. Excluded category (Recargas / Servicio Médico)?  → None         │
//! │                                                                     │
//! │  2. Quantity rule active, required_count >= 2?                      │
//! │     → N-for-(N-1) governs the SHAPE; wallet accrual disabled        │
//! │       for the line regardless of any other flag                     │
//! │                                                                     │
//! │  3. Day-of-week vs seasonal, both judged on `date`:                 │
//! │     greater percentage wins; seasonal wins exact ties               │
//! │                                                                     │
//! │  4. Senior (INAPAM) discount:                                       │
//! │     • stacks on step 3 only while its percentage is < 25%           │
//! │     • with no step-3 promotion, becomes the promotion itself        │
//! │       at a flat 5% and forces wallet eligibility                    │
//! │                                                                     │
//! │  Wallet eligibility is ALWAYS additionally gated on the customer    │
//! │  being known: an anonymous sale cannot accrue credit.               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The precedence decides the promotion's shape, never its magnitude: a 3x2
//! rule beats a 40% seasonal discount because it is evaluated first, not
//! because it is worth more.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use chrono::NaiveDate;

use crate::money::DiscountRate;
use crate::types::ProductPriceContext;
use crate::{SENIOR_DISCOUNT_BPS, SENIOR_STACK_LIMIT_BPS};

// =============================================================================
// Checkout Profile
// =============================================================================

/// Per-checkout facts about the customer, fixed for the cart's lifetime.
///
/// `senior_confirmed` is asked ONCE per checkout when the first senior-
/// eligible product is scanned and cached here for the rest of the cart.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutProfile {
    /// A customer record is attached to the sale. Anonymous sales can
    /// neither accrue nor spend wallet credit.
    pub customer_known: bool,

    /// The customer showed an INAPAM credential at scan time.
    pub senior_confirmed: bool,
}

impl CheckoutProfile {
    /// Profile for an anonymous walk-in sale.
    pub const fn anonymous() -> Self {
        CheckoutProfile { customer_known: false, senior_confirmed: false }
    }

    /// Profile for a registered customer.
    pub const fn known(senior_confirmed: bool) -> Self {
        CheckoutProfile { customer_known: true, senior_confirmed }
    }
}

// =============================================================================
// Effective Promotion
// =============================================================================

/// The promotion resolved for one cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EffectivePromotion {
    /// Percentage for the first discount pass. Zero for quantity promos
    /// (their benefit is the free unit, not a price cut).
    pub rate: DiscountRate,

    /// Ticket label, e.g. `"Promo martes 10% + INAPAM"` or `"3x2-Gratis"`.
    pub label: String,

    /// The line accrues 2% wallet credit on its final price.
    pub wallet_eligible: bool,

    /// The senior pass stacks as a second multiplicative 5% pass on top of
    /// `rate`. Never true together with a quantity promo.
    pub senior_stacked: bool,

    /// `Some(N)` when an N-for-(N-1) quantity rule governs the line.
    pub required_count: Option<u32>,
}

impl EffectivePromotion {
    /// Whether an N-for-(N-1) rule governs the line.
    #[inline]
    pub fn is_quantity_promo(&self) -> bool {
        self.required_count.is_some()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves the promotion governing one product on one date.
///
/// Returns `None` when nothing applies: excluded category, no rule with a
/// window containing `date`, or a senior-ineligible product with no other
/// active rule.
pub fn resolve(
    ctx: &ProductPriceContext,
    date: NaiveDate,
    profile: CheckoutProfile,
) -> Option<EffectivePromotion> {
    // 1. Excluded categories never price-promote and never accrue.
    if !ctx.category.promotions_allowed() {
        return None;
    }

    // 2. An active quantity rule governs the shape outright.
    if let Some(required_count) = ctx.quantity_rule_for(date).filter(|n| *n >= 2) {
        return Some(EffectivePromotion {
            rate: DiscountRate::zero(),
            label: format!("{}x{}-Gratis", required_count, required_count - 1),
            wallet_eligible: false,
            senior_stacked: false,
            required_count: Some(required_count),
        });
    }

    // 3. Day-of-week vs seasonal: greater percentage wins, seasonal wins
    //    ties (it is evaluated after day-of-week and overwrites on >=).
    let day = ctx.day_rule_for(date);
    let seasonal = ctx.seasonal_rule_for(date);
    let mut winner: Option<(DiscountRate, bool, String)> = None;
    if let Some((rate, wallet)) = day {
        winner = Some((rate, wallet, format!("Promo día {}", fmt_pct(rate))));
    }
    if let Some((rate, wallet)) = seasonal {
        let overwrite = match &winner {
            Some((day_rate, _, _)) => rate >= *day_rate,
            None => true,
        };
        if overwrite {
            winner = Some((rate, wallet, format!("Promo temporada {}", fmt_pct(rate))));
        }
    }
    // A zero-percent rule resolves like no rule at all.
    let winner = winner.filter(|(rate, _, _)| !rate.is_zero());

    // 4. Senior (INAPAM): needs the product flag AND the scan-time
    //    confirmation. Stacks below the 25% threshold; stands alone at a
    //    flat 5% when step 3 produced nothing.
    let senior_applies = profile.senior_confirmed && ctx.senior_eligible;

    match winner {
        Some((rate, wallet_flag, label)) => {
            let stack_senior = senior_applies && rate.bps() < SENIOR_STACK_LIMIT_BPS;
            Some(EffectivePromotion {
                rate,
                label: if stack_senior { format!("{label} + INAPAM") } else { label },
                wallet_eligible: wallet_flag && profile.customer_known,
                senior_stacked: stack_senior,
                required_count: None,
            })
        }
        None if senior_applies => Some(EffectivePromotion {
            rate: DiscountRate::from_bps(SENIOR_DISCOUNT_BPS),
            label: "INAPAM".to_string(),
            // Senior-only forces wallet eligibility, still gated on a
            // known customer.
            wallet_eligible: profile.customer_known,
            senior_stacked: false,
            required_count: None,
        }),
        None => None,
    }
}

/// Formats a rate for ticket labels: `10%`, `12.5%`.
fn fmt_pct(rate: DiscountRate) -> String {
    if rate.bps() % 100 == 0 {
        format!("{}%", rate.bps() / 100)
    } else {
        format!("{}%", rate.percentage())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
