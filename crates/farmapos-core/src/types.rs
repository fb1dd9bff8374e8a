//! # Domain Types
//!
//! Core domain types for the pharmacy pricing & settlement engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌──────────────────────┐   ┌─────────────────┐  ┌──────────────┐  │
//! │  │ ProductPriceContext  │   │ SaleTransaction │  │ WalletEntry  │  │
//! │  │  ──────────────────  │   │  ─────────────  │  │  ──────────  │  │
//! │  │  base_price_cents    │   │  id (UUID)      │  │  delta_cents │  │
//! │  │  category            │   │  folio          │  │  motive      │  │
//! │  │  senior_eligible     │   │  lines, tenders │  │  pharmacy_id │  │
//! │  │  rules: [Promotion]  │   │  totals, change │  └──────────────┘  │
//! │  └──────────────────────┘   └─────────────────┘                    │
//! │                                                                     │
//! │  PromotionRule is a CLOSED tagged enum: day-of-week %, seasonal %,  │
//! │  quantity N-for-(N-1), senior-citizen flag. No plugin mechanism.    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every transaction has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - `folio`: human-readable business id embedding the date (printed on the
//!   ticket and quoted by customers for returns)
//!
//! Promotion configuration arrives as loosely-shaped per-day objects from
//! the catalog; it is validated into [`PromotionRule`] at that boundary so
//! everything downstream pattern-matches exhaustively instead of probing
//! optional fields.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{DiscountRate, Money};

// =============================================================================
// Product Category
// =============================================================================

/// Product category as carried on the price context.
///
/// `Recargas` (airtime top-ups) and `ServicioMedico` resell third-party
/// services at fixed margins: they are never discounted and never accrue
/// wallet credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    /// Medicines and pharmacy goods.
    Farmacia,
    /// Health & beauty.
    Perfumeria,
    /// General store goods.
    Abarrotes,
    /// Airtime top-ups. Excluded from all promotions and wallet accrual.
    Recargas,
    /// In-store medical consultation fees. Excluded likewise.
    ServicioMedico,
}

impl ProductCategory {
    /// Whether promotions (and wallet accrual) may apply to this category.
    #[inline]
    pub const fn promotions_allowed(&self) -> bool {
        !matches!(self, ProductCategory::Recargas | ProductCategory::ServicioMedico)
    }
}

// =============================================================================
// Day of Week
// =============================================================================

/// Day of the week a day-slot promotion is configured for.
///
/// Own enum rather than `chrono::Weekday` so it derives the same serde /
/// sqlx / ts-rs surface as every other domain enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<chrono::Weekday> for DayOfWeek {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => DayOfWeek::Monday,
            chrono::Weekday::Tue => DayOfWeek::Tuesday,
            chrono::Weekday::Wed => DayOfWeek::Wednesday,
            chrono::Weekday::Thu => DayOfWeek::Thursday,
            chrono::Weekday::Fri => DayOfWeek::Friday,
            chrono::Weekday::Sat => DayOfWeek::Saturday,
            chrono::Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl DayOfWeek {
    /// The day-slot for a calendar date.
    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }
}

// =============================================================================
// Date Window
// =============================================================================

/// Inclusive validity window of a promotion rule.
///
/// Invariant (validated at the catalog boundary): `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateWindow {
    #[ts(as = "String")]
    pub start: NaiveDate,
    #[ts(as = "String")]
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateWindow { start, end }
    }

    /// Whether `date` falls inside the window (inclusive on both ends).
    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

// =============================================================================
// Promotion Rules
// =============================================================================

/// One validated promotion rule attached to a product.
///
/// A product carries at most one `DayOfWeek` rule per day-slot, plus
/// optionally one `Seasonal` and one `Quantity` rule concurrently. Which
/// one governs a given sale is decided by the resolver's fixed precedence,
/// never by configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromotionRule {
    /// Percentage discount on one weekday, inside a validity window.
    DayOfWeek {
        day: DayOfWeek,
        rate: DiscountRate,
        window: DateWindow,
        wallet_eligible: bool,
    },

    /// Percentage discount on every day inside a validity window.
    Seasonal {
        rate: DiscountRate,
        window: DateWindow,
        wallet_eligible: bool,
    },

    /// N-for-(N-1): every `required_count - 1` paid units earn one free unit.
    /// Wallet accrual is disabled for the whole line while this governs.
    Quantity {
        required_count: u32,
        window: DateWindow,
    },

    /// Whether the flat senior-citizen (INAPAM) discount may apply to this
    /// product. Eligibility of the CUSTOMER is confirmed at scan time and
    /// travels separately on the checkout profile.
    SeniorCitizen { eligible: bool },
}

// =============================================================================
// Product Price Context
// =============================================================================

/// Everything the engine needs to price one product, read once from the
/// catalog collaborator and immutable for the duration of a pricing call.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductPriceContext {
    /// Product identifier (UUID v4).
    pub product_id: String,

    /// Display name, frozen onto cart lines and tickets.
    pub name: String,

    /// List price in centavos before any promotion.
    pub base_price_cents: i64,

    pub category: ProductCategory,

    /// Product-side half of the INAPAM eligibility check.
    pub senior_eligible: bool,

    /// Validated promotion rules (see [`PromotionRule`]).
    pub rules: Vec<PromotionRule>,
}

impl ProductPriceContext {
    /// Returns the base price as Money.
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_cents(self.base_price_cents)
    }

    /// The day-of-week rule configured for `date`'s day-slot, if its window
    /// contains `date`.
    pub fn day_rule_for(&self, date: NaiveDate) -> Option<(DiscountRate, bool)> {
        let slot = DayOfWeek::of(date);
        self.rules.iter().find_map(|rule| match rule {
            PromotionRule::DayOfWeek { day, rate, window, wallet_eligible }
                if *day == slot && window.contains(date) =>
            {
                Some((*rate, *wallet_eligible))
            }
            _ => None,
        })
    }

    /// The seasonal rule, if active on `date`.
    pub fn seasonal_rule_for(&self, date: NaiveDate) -> Option<(DiscountRate, bool)> {
        self.rules.iter().find_map(|rule| match rule {
            PromotionRule::Seasonal { rate, window, wallet_eligible }
                if window.contains(date) =>
            {
                Some((*rate, *wallet_eligible))
            }
            _ => None,
        })
    }

    /// The quantity rule, if active on `date`.
    pub fn quantity_rule_for(&self, date: NaiveDate) -> Option<u32> {
        self.rules.iter().find_map(|rule| match rule {
            PromotionRule::Quantity { required_count, window } if window.contains(date) => {
                Some(*required_count)
            }
            _ => None,
        })
    }
}

// =============================================================================
// Tenders
// =============================================================================

/// How a (part of a) sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TenderMethod {
    Cash,
    Card,
    Transfer,
    /// Store-credit wallet (monedero).
    Wallet,
}

/// One tender on a sale. A sale holds at most one tender per method;
/// their sum equals the sale total (cash is recorded net of change).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tender {
    pub method: TenderMethod,
    pub amount_cents: i64,
}

impl Tender {
    pub fn new(method: TenderMethod, amount: Money) -> Self {
        Tender { method, amount_cents: amount.cents() }
    }

    /// Returns the tender amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Sale Transaction
// =============================================================================

/// One priced, persisted line of a sale.
/// Snapshot pattern: pricing data is frozen at sale time and never re-read
/// from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub quantity: u32,
    /// Final unit price in centavos, all discount passes applied.
    pub unit_price_final_cents: i64,
    /// List unit price at time of sale (frozen).
    pub unit_price_original_cents: i64,
    /// Human-readable promotion label, empty when no promotion applied.
    pub discount_label: String,
    /// Wallet credit earned per paid unit, 0 when not wallet-eligible.
    pub wallet_accrual_per_unit_cents: i64,
    /// Synthetic line injected by a quantity promotion.
    pub is_free_unit: bool,
    /// `Some(N)` when an N-for-(N-1) rule governed this line.
    pub required_count_for_free: Option<u32>,
}

impl SaleLine {
    /// Returns the final unit price as Money.
    #[inline]
    pub fn unit_price_final(&self) -> Money {
        Money::from_cents(self.unit_price_final_cents)
    }

    /// Line total at the final unit price.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price_final().multiply_quantity(self.quantity as i64)
    }

    /// Wallet credit earned by the whole line.
    #[inline]
    pub fn wallet_accrual_total(&self) -> Money {
        Money::from_cents(self.wallet_accrual_per_unit_cents)
            .multiply_quantity(self.quantity as i64)
    }
}

/// A completed sale. Immutable once persisted: corrections happen through
/// [`ReturnTransaction`] / [`CancellationTransaction`], never mutation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTransaction {
    pub id: String,
    /// Business id, format `V{YYYYMMDD}-{6 alnum}`.
    pub folio: String,
    pub pharmacy_id: String,
    /// None for an anonymous sale. Anonymous sales never touch the wallet.
    pub customer_id: Option<String>,
    pub lines: Vec<SaleLine>,
    pub tenders: Vec<Tender>,
    pub total_cents: i64,
    pub discount_total_cents: i64,
    pub wallet_accrual_total_cents: i64,
    pub change_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleTransaction {
    /// Returns the sale total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Amount paid with the given tender method (0 if absent).
    pub fn tender_amount(&self, method: TenderMethod) -> Money {
        self.tenders
            .iter()
            .find(|t| t.method == method)
            .map(Tender::amount)
            .unwrap_or_else(Money::zero)
    }

    /// The paid (non-free) line for a product, if present.
    pub fn paid_line(&self, product_id: &str) -> Option<&SaleLine> {
        self.lines.iter().find(|l| l.product_id == product_id && !l.is_free_unit)
    }

    /// The synthetic free line for a product, if present.
    pub fn free_line(&self, product_id: &str) -> Option<&SaleLine> {
        self.lines.iter().find(|l| l.product_id == product_id && l.is_free_unit)
    }
}

// =============================================================================
// Return / Cancellation
// =============================================================================

/// One returned line: which product and how many paid units come back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnedLine {
    pub product_id: String,
    pub quantity: u32,
}

/// A return against a completed sale. Created once, never mutated.
///
/// `wallet_reversal_cents` is the CLAMPED amount the ledger actually
/// debited, which is what the ticket shows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnTransaction {
    pub id: String,
    /// Business id, format `D{YYYYMMDD}-{6 alnum}`.
    pub folio: String,
    pub sale_id: String,
    pub pharmacy_id: String,
    pub customer_id: Option<String>,
    pub lines: Vec<ReturnedLine>,
    pub refund_cash_cents: i64,
    pub refund_wallet_cents: i64,
    pub wallet_reversal_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A cancellation of a whole sale (or of a pending order that never took
/// tenders). Created once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CancellationTransaction {
    pub id: String,
    /// Business id, format `C{YYYYMMDD}-{6 alnum}`.
    pub folio: String,
    pub sale_id: String,
    pub pharmacy_id: String,
    pub customer_id: Option<String>,
    pub refund_cash_cents: i64,
    pub refund_wallet_cents: i64,
    pub wallet_reversal_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Wallet
// =============================================================================

/// Why a wallet entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum WalletMotive {
    /// Cashback accrued on a sale (credit).
    SaleAccrual,
    /// Wallet used as a tender on a sale (debit).
    SalePayment,
    /// Wallet share of a refund (credit).
    ReturnRefund,
    /// Accrued cashback taken back on a return (debit, clamped).
    AccrualReversal,
}

/// One immutable entry of the per-customer wallet ledger.
/// The ledger is append-only and is the source of truth for the balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WalletEntry {
    pub id: String,
    pub customer_id: String,
    /// Signed centavos: positive credit, negative debit.
    pub delta_cents: i64,
    pub motive: WalletMotive,
    pub pharmacy_id: String,
    /// Folio of the sale/return that caused this entry.
    pub folio: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_category_exclusions() {
        assert!(ProductCategory::Farmacia.promotions_allowed());
        assert!(ProductCategory::Abarrotes.promotions_allowed());
        assert!(!ProductCategory::Recargas.promotions_allowed());
        assert!(!ProductCategory::ServicioMedico.promotions_allowed());
    }

    #[test]
    fn test_date_window_contains() {
        let window = DateWindow::new(d(2026, 3, 1), d(2026, 3, 31));
        assert!(window.contains(d(2026, 3, 1)));
        assert!(window.contains(d(2026, 3, 31)));
        assert!(!window.contains(d(2026, 2, 28)));
        assert!(!window.contains(d(2026, 4, 1)));
    }

    #[test]
    fn test_day_rule_matches_slot_and_window() {
        let ctx = ProductPriceContext {
            product_id: "p1".into(),
            name: "Paracetamol 500mg".into(),
            base_price_cents: 4500,
            category: ProductCategory::Farmacia,
            senior_eligible: true,
            rules: vec![PromotionRule::DayOfWeek {
                day: DayOfWeek::Tuesday,
                rate: DiscountRate::from_bps(1000),
                window: DateWindow::new(d(2026, 1, 1), d(2026, 12, 31)),
                wallet_eligible: true,
            }],
        };

        // 2026-03-03 is a Tuesday, 2026-03-04 a Wednesday
        assert!(ctx.day_rule_for(d(2026, 3, 3)).is_some());
        assert!(ctx.day_rule_for(d(2026, 3, 4)).is_none());
        // Tuesday outside the window
        assert!(ctx.day_rule_for(d(2027, 3, 2)).is_none());
    }

    #[test]
    fn test_tender_amount_lookup() {
        let sale = SaleTransaction {
            id: "s1".into(),
            folio: "V20260303-A1B2C3".into(),
            pharmacy_id: "f1".into(),
            customer_id: Some("c1".into()),
            lines: vec![],
            tenders: vec![
                Tender { method: TenderMethod::Wallet, amount_cents: 6000 },
                Tender { method: TenderMethod::Cash, amount_cents: 4000 },
            ],
            total_cents: 10000,
            discount_total_cents: 0,
            wallet_accrual_total_cents: 0,
            change_cents: 0,
            created_at: Utc::now(),
        };
        assert_eq!(sale.tender_amount(TenderMethod::Wallet).cents(), 6000);
        assert_eq!(sale.tender_amount(TenderMethod::Card).cents(), 0);
    }
}
