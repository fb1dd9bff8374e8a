//! # farmapos-db: Persistence & Atomic Commit Layer
//!
//! This crate provides database access for farmapos. It uses SQLite for
//! local storage with sqlx for async operations, and owns the two
//! money-moving orchestrations that must be atomic: checkout and reversal.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      farmapos Data Flow                             │
//! │                                                                     │
//! │  priced Cart (farmapos-core, pure)                                  │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                   farmapos-db (THIS CRATE)                    │ │
//! │  │                                                               │ │
//! │  │  ┌────────────┐  ┌──────────────┐  ┌───────────────────────┐ │ │
//! │  │  │  Database  │  │ Repositories │  │ Services              │ │ │
//! │  │  │ (pool.rs)  │  │ catalog      │  │ CheckoutService       │ │ │
//! │  │  │            │◄─│ inventory    │◄─│ ReversalService       │ │ │
//! │  │  │ SqlitePool │  │ wallet       │  │ (one tx, retry on     │ │ │
//! │  │  │ WAL, FK on │  │ sale, refund │  │  version conflict)    │ │ │
//! │  │  └────────────┘  └──────────────┘  └───────────────────────┘ │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite database (WAL)                                              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`checkout`] - Atomic sale commit
//! - [`reversal`] - Atomic return/cancellation commit
//!
//! ## Usage
//!
//! ```rust,ignore
//! use farmapos_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/farmapos.db")).await?;
//!
//! let ctx = db.catalog().get_product_price_context(product_id, pharmacy_id).await?;
//! // ... price a Cart with farmapos-core ...
//! let sale = db.checkout().commit_sale(pharmacy_id, customer, &cart, &proposal).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod reversal;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::CheckoutService;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use reversal::ReversalService;

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::refund::RefundRepository;
pub use repository::sale::SaleRepository;
pub use repository::wallet::WalletRepository;
