//! # farmapos-core: Pure Pricing & Settlement Logic
//!
//! This crate is the **heart** of farmapos. It contains the whole pricing
//! and settlement engine as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      farmapos Architecture                          │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                 Cashier UI (live preview)                     │ │
//! │  │        scans ──► price preview ──► tender entry               │ │
//! │  └───────────────────────────────┬───────────────────────────────┘ │
//! │                                  │  SAME functions, not a copy      │
//! │  ┌───────────────────────────────▼───────────────────────────────┐ │
//! │  │              ★ farmapos-core (THIS CRATE) ★                   │ │
//! │  │                                                               │ │
//! │  │  promotion ──► pricing ──► cart ──► settlement ──► reversal   │ │
//! │  │  (resolve)    (passes)   (free     (tender        (refund     │ │
//! │  │               (round)     units)    split)         split)     │ │
//! │  │                                                               │ │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │ │
//! │  └───────────────────────────────┬───────────────────────────────┘ │
//! │                                  │                                  │
//! │  ┌───────────────────────────────▼───────────────────────────────┐ │
//! │  │              farmapos-db (persistence layer)                  │ │
//! │  │   wallet ledger, stock depletion, atomic checkout/reversal    │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (promotion rules, sales, tenders, wallet)
//! - [`money`] - Integer-centavo money and basis-point rates
//! - [`promotion`] - Promotion resolution (fixed precedence)
//! - [`pricing`] - Discount passes and wallet accrual
//! - [`cart`] - Live cart with quantity-promotion free units
//! - [`settlement`] - Tender-split validation and change
//! - [`reversal`] - Return/cancellation arithmetic
//! - [`folio`] - Business-id generation
//! - [`validation`] - Boundary validators
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output, every time; pricing a
//!    line twice is free and identical
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: centavos in i64, bps rates, one explicit rounding
//!    per discount pass
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod folio;
pub mod money;
pub mod pricing;
pub mod promotion;
pub mod reversal;
pub mod settlement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{price_cart_line, Cart, CartLine};
pub use error::{CoreError, CoreResult, PaymentMismatch, ValidationError};
pub use folio::{generate_folio, FolioKind};
pub use money::{DiscountRate, Money};
pub use promotion::{resolve, CheckoutProfile, EffectivePromotion};
pub use reversal::{compute_cancellation, compute_reversal, ReversalComputation};
pub use settlement::{settle_payment, Settlement, TenderProposal};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Flat senior-citizen (INAPAM) discount, in basis points.
pub const SENIOR_DISCOUNT_BPS: u32 = 500;

/// The senior discount stacks only while the resolved day/seasonal
/// percentage is strictly below this threshold (25%).
pub const SENIOR_STACK_LIMIT_BPS: u32 = 2500;

/// Wallet cashback accrued on the final unit price, in basis points (2%).
pub const WALLET_ACCRUAL_BPS: u32 = 200;

/// Upper bound for any configured promotion percentage (100%).
pub const MAX_PROMOTION_BPS: u32 = 10_000;

/// Maximum distinct lines in a single cart.
///
/// Prevents runaway carts and keeps ticket printing bounded.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single item in a cart.
///
/// Prevents accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: u32 = 999;
