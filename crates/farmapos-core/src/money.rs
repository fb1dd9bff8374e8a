//! # Money Module
//!
//! Monetary values and discount rates for the pricing engine.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                         │
//! │                                                                     │
//! │  In floating point:                                                 │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                       │
//! │                                                                     │
//! │  OUR SOLUTION: Integer Centavos                                     │
//! │    All amounts are i64 centavos. Every rounding point is a single   │
//! │    explicit `(x * bps + 5000) / 10000` pass, half away from zero.   │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Discipline
//! Historical tickets were produced by rounding to centavos after EVERY
//! discount pass, not once at the end. [`Money::apply_discount`] reproduces
//! exactly one such pass; callers chain passes in the documented order and
//! must not collapse them into a combined percentage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in centavos (the smallest currency unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds and ledger debits are negative deltas
/// - **Single field tuple struct**: zero-cost abstraction over i64
///
/// Every price, tender, accrual, and ledger delta in the engine flows
/// through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from centavos.
    ///
    /// ## Example
    /// ```rust
    /// use farmapos_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in centavos.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-peso portion.
    #[inline]
    pub const fn pesos(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the centavo portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use farmapos_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Applies one percentage-discount pass and returns the DISCOUNTED PRICE,
    /// rounded half away from zero.
    ///
    /// This rounds the resulting price, not the discount amount:
    /// `round(amount × (1 − rate))`. The two differ by a centavo on exact
    /// halves, and historical tickets rounded the price.
    ///
    /// ## Example
    /// ```rust
    /// use farmapos_core::money::{DiscountRate, Money};
    ///
    /// let base = Money::from_cents(10000); // $100.00
    /// let day = base.apply_discount(DiscountRate::from_bps(1000)); // 10% off
    /// assert_eq!(day.cents(), 9000); // $90.00
    ///
    /// // Senior pass stacks as a SECOND rounded pass, never combined:
    /// let stacked = day.apply_discount(DiscountRate::from_bps(500));
    /// assert_eq!(stacked.cents(), 8550); // $85.50
    /// ```
    pub fn apply_discount(&self, rate: DiscountRate) -> Money {
        // i128 to prevent overflow on large amounts
        let keep_bps = (10_000 - rate.bps()) as i128;
        let cents = (self.0 as i128 * keep_bps + 5_000) / 10_000;
        Money::from_cents(cents as i64)
    }

    /// Returns the rounded fraction of this amount at `rate`.
    ///
    /// Used for wallet accrual (2% of the final unit price).
    ///
    /// ## Example
    /// ```rust
    /// use farmapos_core::money::{DiscountRate, Money};
    ///
    /// let price = Money::from_cents(8550);
    /// assert_eq!(price.take_rate(DiscountRate::from_bps(200)).cents(), 171);
    /// ```
    pub fn take_rate(&self, rate: DiscountRate) -> Money {
        let cents = (self.0 as i128 * rate.bps() as i128 + 5_000) / 10_000;
        Money::from_cents(cents as i64)
    }

    /// Allocates the share of this amount given by `numerator / denominator`,
    /// rounded half up.
    ///
    /// Used for the refund split: a return pays back wallet and cash in the
    /// same proportion they funded the original sale.
    ///
    /// Returns zero when the denominator is zero or not positive.
    pub fn prorate(&self, numerator: Money, denominator: Money) -> Money {
        if denominator.cents() <= 0 {
            return Money::zero();
        }
        let num = numerator.cents() as i128;
        let den = denominator.cents() as i128;
        let cents = (self.0 as i128 * num + den / 2) / den;
        Money::from_cents(cents as i64)
    }
}

// =============================================================================
// Discount Rate
// =============================================================================

/// A discount (or accrual) rate in basis points.
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000. `1000` bps = 10%. Integer bps keep every
/// rate exactly representable; `f64` percentages exist only at the catalog
/// boundary and for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Creates a rate from a percentage (catalog boundary convenience).
    pub fn from_percentage(pct: f64) -> Self {
        DiscountRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for DiscountRate {
    fn default() -> Self {
        DiscountRate::zero()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
/// Debug/log output only; the UI formats for locale itself.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.pesos().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.pesos(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
    }

    #[test]
    fn test_apply_discount_rounds_price_not_discount() {
        // $1.05 at 50%: price rounds 52.5 → 53, NOT 105 - round(52.5) = 52
        let base = Money::from_cents(105);
        assert_eq!(base.apply_discount(DiscountRate::from_bps(5000)).cents(), 53);
    }

    #[test]
    fn test_apply_discount_bounds() {
        let base = Money::from_cents(9999);
        for bps in [0u32, 1, 500, 2500, 9999, 10_000] {
            let out = base.apply_discount(DiscountRate::from_bps(bps));
            assert!(out.cents() >= 0, "price went negative at {bps} bps");
            assert!(out <= base, "price exceeded base at {bps} bps");
        }
        assert_eq!(base.apply_discount(DiscountRate::from_bps(10_000)).cents(), 0);
    }

    #[test]
    fn test_two_pass_stacking_differs_from_combined() {
        // 10% then 5% as two rounded passes must match historical tickets.
        let base = Money::from_cents(10000);
        let first = base.apply_discount(DiscountRate::from_bps(1000));
        let second = first.apply_discount(DiscountRate::from_bps(500));
        assert_eq!(first.cents(), 9000);
        assert_eq!(second.cents(), 8550);

        // Intermediate rounding: $11.10 → $9.99 → 949.05 → $9.49
        let odd = Money::from_cents(1110);
        let two_pass = odd
            .apply_discount(DiscountRate::from_bps(1000))
            .apply_discount(DiscountRate::from_bps(500));
        assert_eq!(two_pass.cents(), 949); // 999 → 949.05 → 949
    }

    #[test]
    fn test_take_rate() {
        assert_eq!(Money::from_cents(8550).take_rate(DiscountRate::from_bps(200)).cents(), 171);
        // Rounds half away from zero: 2% of $1.25 = 2.5 centavos → 3
        assert_eq!(Money::from_cents(125).take_rate(DiscountRate::from_bps(200)).cents(), 3);
    }

    #[test]
    fn test_prorate() {
        // 60% wallet / 40% cash split of a $20.00 refund
        let refund = Money::from_cents(2000);
        let wallet = refund.prorate(Money::from_cents(6000), Money::from_cents(10000));
        assert_eq!(wallet.cents(), 1200);
        assert_eq!((refund - wallet).cents(), 800);
    }

    #[test]
    fn test_prorate_zero_denominator() {
        let refund = Money::from_cents(2000);
        assert!(refund.prorate(Money::zero(), Money::zero()).is_zero());
    }

    #[test]
    fn test_discount_rate_conversions() {
        let rate = DiscountRate::from_percentage(12.5);
        assert_eq!(rate.bps(), 1250);
        assert!((rate.percentage() - 12.5).abs() < 0.001);
        assert!(DiscountRate::zero().is_zero());
    }
}
