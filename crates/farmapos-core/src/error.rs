//! # Error Types
//!
//! Domain-specific error types for farmapos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  farmapos-core errors (this file)                                   │
//! │  ├── CoreError        - Business rule violations                    │
//! │  ├── PaymentMismatch  - Tender-split rejections                     │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  farmapos-db errors (separate crate)                                │
//! │  └── DbError          - Persistence / atomic-commit failures        │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → DbError → caller               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, amounts, folio)
//! 3. Errors are enum variants, never String
//! 4. Money-moving rejections spell out the EXACT reason: the operator
//!    reconciles cash drawers against these messages, so a generic
//!    "internal error" is itself a defect

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Insufficient stock to cover a cart change.
    ///
    /// Raised BEFORE any cart mutation: the paid quantity plus the free
    /// units it would earn must fit in the available stock, or the whole
    /// change is rejected with the cart unchanged.
    #[error("insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Wallet tender exceeds the customer's wallet balance.
    #[error("insufficient wallet balance: requested {requested_cents} centavos, balance {balance_cents} centavos")]
    InsufficientWalletBalance {
        requested_cents: i64,
        balance_cents: i64,
    },

    /// The proposed tender split was rejected (see [`PaymentMismatch`]).
    #[error("payment mismatch: {0}")]
    Payment(#[from] PaymentMismatch),

    /// A wallet-touching reversal needs a customer on record.
    ///
    /// Business policy, not a technical limit: when the refund computation
    /// produces a wallet component for an anonymous sale, the operator must
    /// attach a customer before the reversal can commit.
    #[error("a customer record is required: {reason}")]
    CustomerRequired { reason: String },

    /// The referenced line does not exist on the sale (or is a free line,
    /// which is never individually refundable).
    #[error("line {product_id} is not returnable on this sale: {reason}")]
    LineNotReturnable { product_id: String, reason: String },

    /// More units returned than were sold.
    #[error("returned quantity {returned} exceeds sold quantity {sold} for {product_id}")]
    ReturnExceedsSold {
        product_id: String,
        sold: u32,
        returned: u32,
    },

    /// The sale can no longer be reversed (e.g. already cancelled).
    #[error("sale {folio} cannot be reversed: {reason}")]
    SaleNotReversible { folio: String, reason: String },

    /// The product has no paid line in the cart.
    #[error("product {product_id} is not in the cart")]
    LineNotInCart { product_id: String },

    /// Cart has exceeded maximum allowed distinct lines.
    #[error("cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: u32, max: u32 },

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Payment Mismatch
// =============================================================================

/// Rejections produced by payment settlement, checked in a fixed order
/// before any mutation is attempted. Cheap to correct and retry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentMismatch {
    /// Card + transfer + wallet must never exceed the total: digital
    /// tenders cannot produce change.
    #[error("digital payment ({digital_cents} centavos) exceeds total ({total_cents} centavos)")]
    DigitalExceedsTotal { digital_cents: i64, total_cents: i64 },

    /// Digital tenders already cover the total and cash was still offered.
    /// Deliberate strictness to catch operator error at the drawer.
    #[error("cash offered ({cash_cents} centavos) while digital tenders already cover the total")]
    CashOverpayOnCoveredTotal { cash_cents: i64 },

    /// All tenders together fall short of the total.
    #[error("insufficient payment: offered {offered_cents} centavos of {total_cents} centavos")]
    InsufficientPayment { offered_cents: i64, total_cents: i64 },

    /// A tender amount was negative.
    #[error("tender amounts must not be negative")]
    NegativeTender,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised at the catalog boundary and on operator
/// input before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Promotion percentage outside 0..=100.
    #[error("promotion percentage {bps} bps is outside 0..=10000")]
    PercentageOutOfRange { bps: i64 },

    /// Promotion window with `start` after `end`.
    #[error("promotion window is inverted: {start} > {end}")]
    InvertedWindow { start: String, end: String },

    /// Quantity rule with `required_count < 2`.
    #[error("quantity promotion requires required_count >= 2, got {required_count}")]
    RequiredCountTooSmall { required_count: u32 },

    /// Invalid format (e.g., invalid UUID, malformed folio).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
