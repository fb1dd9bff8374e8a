//! # Reversal Service
//!
//! The authoritative commit path for returns and cancellations. Same
//! transactional discipline as checkout: one transaction, all-or-nothing,
//! bounded retry on wallet version conflicts, fail closed otherwise.
//!
//! ## Commit Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  commit_return(sale folio, returned lines)                          │
//! │                                                                     │
//! │  load sale ──► BEGIN                                                │
//! │  read prior returns (inside the tx: two concurrent returns can      │
//! │    never jointly exceed what was sold)                              │
//! │  compute reversal on the REMAINING view of the sale                 │
//! │  restock returned paid units + retracted free units                 │
//! │  wallet debit: accrual reversal, CLAMPED to current balance         │
//! │  wallet credit: the wallet share of the refund                      │
//! │  insert return record with the CLAMPED reversal amount              │
//! │        │  COMMIT                                                    │
//! │        ▼                                                            │
//! │  The ticket shows what was actually applied, never the request.     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The reversal debit runs BEFORE the refund credit: the clamp is bounded
//! by what the customer still holds from the sale, and the refund is new
//! money that must not be eaten by it.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::{inventory, refund, wallet};
use farmapos_core::cart::free_units;
use farmapos_core::{
    compute_cancellation, compute_reversal, generate_folio, CancellationTransaction, CoreError,
    FolioKind, Money, ReturnTransaction, ReturnedLine, ReversalComputation, SaleTransaction,
    WalletMotive,
};

/// Bounded retries for optimistic wallet-version conflicts.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Atomic return/cancellation commit.
#[derive(Debug, Clone)]
pub struct ReversalService {
    db: Database,
}

impl ReversalService {
    /// Creates a new ReversalService.
    pub fn new(db: Database) -> Self {
        ReversalService { db }
    }

    /// Commits a partial return against a completed sale.
    pub async fn commit_return(
        &self,
        sale_folio: &str,
        returned: &[ReturnedLine],
    ) -> DbResult<ReturnTransaction> {
        let sale = self.db.sales().get_by_folio(sale_folio).await?;

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            match self.try_commit_return(&sale, returned).await {
                Ok(ret) => {
                    info!(
                        folio = %ret.folio,
                        refund_cash = ret.refund_cash_cents,
                        refund_wallet = ret.refund_wallet_cents,
                        reversal = ret.wallet_reversal_cents,
                        "Return committed"
                    );
                    return Ok(ret);
                }
                Err(DbError::ConcurrencyConflict { customer_id }) => {
                    warn!(customer_id = %customer_id, attempt, "Wallet moved during return, retrying");
                    continue;
                }
                Err(other) => return Err(other),
            }
        }

        Err(DbError::TransactionAborted(
            "wallet version conflict retries exhausted".to_string(),
        ))
    }

    /// Commits a cancellation of the whole (remaining) sale.
    ///
    /// A pending order that never took tenders restocks and reverses
    /// accrual only; no refund is paid out.
    pub async fn commit_cancellation(
        &self,
        sale_folio: &str,
    ) -> DbResult<CancellationTransaction> {
        let sale = self.db.sales().get_by_folio(sale_folio).await?;

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            match self.try_commit_cancellation(&sale).await {
                Ok(cancellation) => {
                    info!(folio = %cancellation.folio, "Cancellation committed");
                    return Ok(cancellation);
                }
                Err(DbError::ConcurrencyConflict { customer_id }) => {
                    warn!(customer_id = %customer_id, attempt, "Wallet moved during cancellation, retrying");
                    continue;
                }
                Err(other) => return Err(other),
            }
        }

        Err(DbError::TransactionAborted(
            "wallet version conflict retries exhausted".to_string(),
        ))
    }

    async fn try_commit_return(
        &self,
        sale: &SaleTransaction,
        returned: &[ReturnedLine],
    ) -> DbResult<ReturnTransaction> {
        let mut tx = self.db.pool().begin().await?;

        if refund::is_cancelled_tx(&mut tx, &sale.id).await? {
            return Err(DbError::Core(CoreError::SaleNotReversible {
                folio: sale.folio.clone(),
                reason: "sale was already cancelled".to_string(),
            }));
        }

        let prior = refund::returned_quantities_tx(&mut tx, &sale.id).await?;
        let view = remaining_view(sale, &prior);
        let computation = compute_reversal(&view, returned).map_err(DbError::Core)?;

        let now = Utc::now();
        let folio = generate_folio(FolioKind::Return, now.date_naive());
        let (applied_reversal, refund_wallet) =
            apply_reversal_effects(&mut tx, sale, &computation, &folio).await?;

        let ret = ReturnTransaction {
            id: Uuid::new_v4().to_string(),
            folio,
            sale_id: sale.id.clone(),
            pharmacy_id: sale.pharmacy_id.clone(),
            customer_id: sale.customer_id.clone(),
            lines: computation.returned_lines.clone(),
            refund_cash_cents: computation.refund_cash_cents,
            refund_wallet_cents: refund_wallet.cents(),
            wallet_reversal_cents: applied_reversal.cents(),
            created_at: now,
        };
        refund::insert_return_tx(&mut tx, &ret).await?;

        tx.commit().await.map_err(|e| DbError::TransactionAborted(e.to_string()))?;
        Ok(ret)
    }

    async fn try_commit_cancellation(
        &self,
        sale: &SaleTransaction,
    ) -> DbResult<CancellationTransaction> {
        let mut tx = self.db.pool().begin().await?;

        if refund::is_cancelled_tx(&mut tx, &sale.id).await? {
            return Err(DbError::Core(CoreError::SaleNotReversible {
                folio: sale.folio.clone(),
                reason: "sale was already cancelled".to_string(),
            }));
        }

        let prior = refund::returned_quantities_tx(&mut tx, &sale.id).await?;
        let view = remaining_view(sale, &prior);
        let computation = compute_cancellation(&view).map_err(DbError::Core)?;

        let now = Utc::now();
        let folio = generate_folio(FolioKind::Cancellation, now.date_naive());
        let (applied_reversal, refund_wallet) =
            apply_reversal_effects(&mut tx, sale, &computation, &folio).await?;

        let cancellation = CancellationTransaction {
            id: Uuid::new_v4().to_string(),
            folio,
            sale_id: sale.id.clone(),
            pharmacy_id: sale.pharmacy_id.clone(),
            customer_id: sale.customer_id.clone(),
            refund_cash_cents: computation.refund_cash_cents,
            refund_wallet_cents: refund_wallet.cents(),
            wallet_reversal_cents: applied_reversal.cents(),
            created_at: now,
        };
        refund::insert_cancellation_tx(&mut tx, &cancellation).await?;

        tx.commit().await.map_err(|e| DbError::TransactionAborted(e.to_string()))?;
        Ok(cancellation)
    }
}

/// Restocks and applies the wallet effects of a computed reversal.
/// Returns `(applied accrual reversal, wallet refund credited)`.
async fn apply_reversal_effects(
    tx: &mut sqlx::SqliteConnection,
    sale: &SaleTransaction,
    computation: &ReversalComputation,
    folio: &str,
) -> DbResult<(Money, Money)> {
    // Business precondition, not a fallback: a wallet-touching reversal of
    // an anonymous sale must first get a customer attached.
    if computation.has_wallet_component() && sale.customer_id.is_none() {
        return Err(DbError::Core(CoreError::CustomerRequired {
            reason: "refund includes a wallet component".to_string(),
        }));
    }

    for line in &computation.returned_lines {
        inventory::restock_tx(&mut *tx, &sale.pharmacy_id, &line.product_id, line.quantity as i64)
            .await?;
    }
    for retraction in &computation.retracted_free_units {
        inventory::restock_tx(
            &mut *tx,
            &sale.pharmacy_id,
            &retraction.product_id,
            retraction.quantity as i64,
        )
        .await?;
    }

    let mut applied_reversal = Money::zero();
    let refund_wallet = Money::from_cents(computation.refund_wallet_cents);

    if let Some(customer) = sale.customer_id.as_deref() {
        if computation.wallet_reversal_requested_cents > 0 {
            applied_reversal = wallet::debit_clamped_tx(
                &mut *tx,
                customer,
                Money::from_cents(computation.wallet_reversal_requested_cents),
                WalletMotive::AccrualReversal,
                &sale.pharmacy_id,
                Some(folio),
            )
            .await?;
        }
        if refund_wallet.is_positive() {
            wallet::credit_tx(
                &mut *tx,
                customer,
                refund_wallet,
                WalletMotive::ReturnRefund,
                &sale.pharmacy_id,
                Some(folio),
            )
            .await?;
        }
    }

    Ok((applied_reversal, refund_wallet))
}

/// Projects the sale down to what is still in the customer's hands:
/// paid quantities minus prior returns, free lines recomputed from the
/// remaining paid count, emptied lines dropped.
fn remaining_view(sale: &SaleTransaction, prior: &[(String, u32)]) -> SaleTransaction {
    let mut view = sale.clone();

    for (product_id, already_returned) in prior {
        if let Some(line) = view
            .lines
            .iter_mut()
            .find(|l| &l.product_id == product_id && !l.is_free_unit)
        {
            line.quantity = line.quantity.saturating_sub(*already_returned);
        }
    }

    let free_counts: Vec<(String, u32)> = view
        .lines
        .iter()
        .filter(|l| !l.is_free_unit)
        .filter_map(|l| {
            l.required_count_for_free.map(|n| (l.product_id.clone(), free_units(l.quantity, n)))
        })
        .collect();
    for (product_id, count) in free_counts {
        if let Some(free) = view
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id && l.is_free_unit)
        {
            free.quantity = count;
        }
    }

    view.lines.retain(|l| l.quantity > 0);
    view
}

// =============================================================================
// Integration Tests (in-memory SQLite)
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::NaiveDate;
    use farmapos_core::{Cart, CheckoutProfile, TenderProposal};

    const PHARMACY: &str = "farmacia-01";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, id: &str, price_cents: i64, stock: i64) {
        sqlx::query(
            r#"
            INSERT INTO products (id, pharmacy_id, name, category, base_price_cents,
                                  senior_eligible, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, 'farmacia', ?4, 0, 1, ?5, ?5)
            "#,
        )
        .bind(id)
        .bind(PHARMACY)
        .bind(format!("Producto {id}"))
        .bind(price_cents)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();
        db.inventory().set_stock(PHARMACY, id, stock).await.unwrap();
    }

    async fn seed_seasonal_rule(db: &Database, product_id: &str, rate_bps: i64, wallet: bool) {
        sqlx::query(
            r#"
            INSERT INTO promotion_rules (id, product_id, rule_type, rate_bps,
                                         starts_on, ends_on, wallet_eligible)
            VALUES (?1, ?2, 'seasonal', ?3, '2026-01-01', '2026-12-31', ?4)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(product_id)
        .bind(rate_bps)
        .bind(wallet)
        .execute(db.pool())
        .await
        .unwrap();
    }

    /// Sells `qty` of p1 ($100 each, 10% seasonal, wallet-eligible) to c1,
    /// paid part wallet / part cash.
    async fn checkout_fixture(db: &Database, wallet_funding: i64, wallet_tender: i64) -> SaleTransaction {
        seed_product(db, "p1", 10000, 50).await;
        seed_seasonal_rule(db, "p1", 1000, true).await;
        if wallet_funding > 0 {
            db.wallet()
                .credit("c1", Money::from_cents(wallet_funding), WalletMotive::SaleAccrual, PHARMACY, None)
                .await
                .unwrap();
        }

        let ctx = db.catalog().get_product_price_context("p1", PHARMACY).await.unwrap();
        let mut cart = Cart::new(today(), CheckoutProfile::known(false));
        cart.add_item(&ctx, 5, 50).unwrap(); // 5 × 90.00 = 450.00

        let cash = cart.total().cents() - wallet_tender;
        let proposal = TenderProposal {
            cash_cents: cash,
            wallet_cents: wallet_tender,
            ..Default::default()
        };
        db.checkout()
            .commit_sale(PHARMACY, Some("c1"), &cart, &proposal)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_return_splits_refund_proportionally() {
        let db = db().await;
        // total 450.00 paid 270.00 wallet (60%) / 180.00 cash (40%)
        let sale = checkout_fixture(&db, 27000, 27000).await;

        // Return 1 unit worth 90.00 → wallet 54.00, cash 36.00
        let ret = db
            .reversals()
            .commit_return(&sale.folio, &[ReturnedLine { product_id: "p1".into(), quantity: 1 }])
            .await
            .unwrap();

        assert_eq!(ret.refund_wallet_cents, 5400);
        assert_eq!(ret.refund_cash_cents, 3600);
        // Accrual was 1.80/unit; one unit reversed.
        assert_eq!(ret.wallet_reversal_cents, 180);

        // Stock back up: 50 − 5 + 1
        let stock = db.inventory().get_available_stock(PHARMACY, "p1").await.unwrap();
        assert_eq!(stock, 46);

        // Persisted and fetchable by folio.
        let fetched = db.refunds().get_return_by_folio(&ret.folio).await.unwrap();
        assert_eq!(fetched.refund_wallet_cents, 5400);
    }

    #[tokio::test]
    async fn test_clamped_reversal_reports_applied_amount() {
        let db = db().await;
        // All cash; the only wallet movement is the 9.00 accrual credit.
        let sale = checkout_fixture(&db, 0, 0).await;
        assert_eq!(db.wallet().get_wallet_balance("c1").await.unwrap().cents(), 900);

        // Customer spends the accrued credit elsewhere before returning.
        db.wallet()
            .debit("c1", Money::from_cents(800), WalletMotive::SalePayment, PHARMACY, None)
            .await
            .unwrap();

        // Returning all 5 units requests 9.00 back but only 1.00 remains.
        let ret = db
            .reversals()
            .commit_return(&sale.folio, &[ReturnedLine { product_id: "p1".into(), quantity: 5 }])
            .await
            .unwrap();

        assert_eq!(ret.wallet_reversal_cents, 100); // clamped, as ticketed
        assert!(db.wallet().get_wallet_balance("c1").await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn test_cumulative_returns_cannot_exceed_sold() {
        let db = db().await;
        let sale = checkout_fixture(&db, 0, 0).await;

        db.reversals()
            .commit_return(&sale.folio, &[ReturnedLine { product_id: "p1".into(), quantity: 3 }])
            .await
            .unwrap();

        // 3 of 5 already returned; 3 more must be rejected.
        let err = db
            .reversals()
            .commit_return(&sale.folio, &[ReturnedLine { product_id: "p1".into(), quantity: 3 }])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::ReturnExceedsSold { sold: 2, returned: 3, .. })
        ));

        // 2 more is fine.
        db.reversals()
            .commit_return(&sale.folio, &[ReturnedLine { product_id: "p1".into(), quantity: 2 }])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_reverses_whole_sale() {
        let db = db().await;
        let sale = checkout_fixture(&db, 27000, 27000).await;

        let cancellation = db.reversals().commit_cancellation(&sale.folio).await.unwrap();

        assert_eq!(
            cancellation.refund_cash_cents + cancellation.refund_wallet_cents,
            sale.total_cents
        );

        // Everything restocked.
        let stock = db.inventory().get_available_stock(PHARMACY, "p1").await.unwrap();
        assert_eq!(stock, 50);

        // Cancelling twice is rejected.
        let err = db.reversals().commit_cancellation(&sale.folio).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::SaleNotReversible { .. })));

        // As is returning against a cancelled sale.
        let err = db
            .reversals()
            .commit_return(&sale.folio, &[ReturnedLine { product_id: "p1".into(), quantity: 1 }])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::SaleNotReversible { .. })));
    }

    #[tokio::test]
    async fn test_unknown_folio_not_found() {
        let db = db().await;
        let err = db
            .reversals()
            .commit_return("V20260303-ZZZZZZ", &[ReturnedLine { product_id: "p1".into(), quantity: 1 }])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
