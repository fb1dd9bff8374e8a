//! # Checkout Service
//!
//! The authoritative commit path for a sale. One database transaction
//! wraps EVERYTHING the checkout changes; it either all lands or none of
//! it does.
//!
//! ## Commit Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  commit_sale(pharmacy, customer, cart, tender proposal)             │
//! │                                                                     │
//! │  read wallet balance ──► settle_payment (pure, rejects early)       │
//! │        │                                                            │
//! │        ▼  BEGIN                                                     │
//! │  deplete stock per line (paid AND free units)                       │
//! │  insert sale + lines + tenders                                      │
//! │  wallet debit (wallet tender, exact)                                │
//! │  wallet credit (accrual)                                            │
//! │        │  COMMIT                                                    │
//! │        ▼                                                            │
//! │  ConcurrencyConflict? → re-read balance, re-settle, retry (≤3)      │
//! │  anything else?       → rolled back wholesale, error surfaces       │
//! │                                                                     │
//! │  There is NO partial-apply fallback. A checkout that cannot commit  │
//! │  atomically fails closed with TransactionAborted.                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::{inventory, sale, wallet};
use farmapos_core::{
    generate_folio, settle_payment, Cart, CoreError, FolioKind, Money, SaleLine, SaleTransaction,
    TenderMethod, TenderProposal, ValidationError, WalletMotive,
};

/// Bounded retries for optimistic wallet-version conflicts.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Atomic checkout commit.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    db: Database,
}

impl CheckoutService {
    /// Creates a new CheckoutService.
    pub fn new(db: Database) -> Self {
        CheckoutService { db }
    }

    /// Commits a priced cart as a sale.
    ///
    /// Validation order: pure checks first (empty cart, customer
    /// coherence, payment settlement against the current balance), then
    /// the single transaction. A version conflict on the wallet retries
    /// with a freshly read balance, bounded; exhaustion surfaces as
    /// [`DbError::TransactionAborted`].
    pub async fn commit_sale(
        &self,
        pharmacy_id: &str,
        customer_id: Option<&str>,
        cart: &Cart,
        proposal: &TenderProposal,
    ) -> DbResult<SaleTransaction> {
        if cart.is_empty() {
            return Err(ValidationError::Required { field: "cart".to_string() }.into());
        }

        // The cart was priced for a specific customer presence; committing
        // it under a different one would leak or lose wallet accrual.
        if cart.profile.customer_known != customer_id.is_some() {
            return Err(DbError::Core(CoreError::CustomerRequired {
                reason: "cart was priced for a different customer presence".to_string(),
            }));
        }
        if proposal.wallet_cents > 0 && customer_id.is_none() {
            return Err(DbError::Core(CoreError::CustomerRequired {
                reason: "wallet tender on an anonymous sale".to_string(),
            }));
        }

        let total = cart.total();

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let balance = match customer_id {
                Some(customer) => self.db.wallet().get_wallet_balance(customer).await?,
                None => Money::zero(),
            };

            // Pure and pre-mutation: a rejected split never touches state.
            let settlement = settle_payment(total, proposal, balance).map_err(DbError::Core)?;

            let now = Utc::now();
            let sale = SaleTransaction {
                id: Uuid::new_v4().to_string(),
                folio: generate_folio(FolioKind::Sale, now.date_naive()),
                pharmacy_id: pharmacy_id.to_string(),
                customer_id: customer_id.map(String::from),
                lines: cart.lines().iter().map(SaleLine::from).collect(),
                tenders: settlement.tenders.clone(),
                total_cents: total.cents(),
                discount_total_cents: cart.discount_total().cents(),
                wallet_accrual_total_cents: cart.wallet_accrual_total().cents(),
                change_cents: settlement.change_cents,
                created_at: now,
            };

            match self.try_commit(&sale, customer_id).await {
                Ok(()) => {
                    info!(
                        folio = %sale.folio,
                        total = sale.total_cents,
                        change = sale.change_cents,
                        "Sale committed"
                    );
                    return Ok(sale);
                }
                Err(DbError::ConcurrencyConflict { customer_id: who }) => {
                    warn!(customer_id = %who, attempt, "Wallet moved during checkout, retrying");
                    continue;
                }
                Err(other) => return Err(other),
            }
        }

        Err(DbError::TransactionAborted(
            "wallet version conflict retries exhausted".to_string(),
        ))
    }

    /// One all-or-nothing commit attempt. Any error drops the transaction,
    /// which rolls everything back.
    async fn try_commit(&self, sale: &SaleTransaction, customer_id: Option<&str>) -> DbResult<()> {
        let mut tx = self.db.pool().begin().await?;

        // Free units deplete stock exactly like paid units.
        for line in &sale.lines {
            inventory::deplete_stock_tx(&mut tx, &sale.pharmacy_id, &line.product_id, line.quantity as i64)
                .await?;
        }

        sale::insert_sale_tx(&mut tx, sale).await?;

        let wallet_tender = sale.tender_amount(TenderMethod::Wallet);
        if wallet_tender.is_positive() {
            let customer = customer_id.ok_or_else(|| {
                DbError::Core(CoreError::CustomerRequired {
                    reason: "wallet tender on an anonymous sale".to_string(),
                })
            })?;
            wallet::debit_exact_tx(
                &mut tx,
                customer,
                wallet_tender,
                WalletMotive::SalePayment,
                &sale.pharmacy_id,
                Some(&sale.folio),
            )
            .await?;
        }

        if sale.wallet_accrual_total_cents > 0 {
            if let Some(customer) = customer_id {
                wallet::credit_tx(
                    &mut tx,
                    customer,
                    Money::from_cents(sale.wallet_accrual_total_cents),
                    WalletMotive::SaleAccrual,
                    &sale.pharmacy_id,
                    Some(&sale.folio),
                )
                .await?;
            }
        }

        tx.commit().await.map_err(|e| DbError::TransactionAborted(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// Integration Tests (in-memory SQLite)
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use chrono::NaiveDate;
    use farmapos_core::CheckoutProfile;

    const PHARMACY: &str = "farmacia-01";

    fn today() -> NaiveDate {
        // A Tuesday, matching the seeded day rule.
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

    async fn seed_quantity_rule(db: &Database, product_id: &str, required_count: i64) {
        sqlx::query(
            r#"
            INSERT INTO promotion_rules (id, product_id, rule_type, required_count,
                                         starts_on, ends_on)
            VALUES (?1, ?2, 'quantity', ?3, '2026-01-01', '2026-12-31')
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(product_id)
        .bind(required_count)
        .execute(db.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_cash_checkout_persists_sale_and_depletes_stock() {
        let db = db().await;
        seed_product(&db, "p1", 4500, 10).await;

        let ctx = db.catalog().get_product_price_context("p1", PHARMACY).await.unwrap();
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        cart.add_item(&ctx, 2, 10).unwrap();

        let proposal = TenderProposal::cash(Money::from_cents(10000));
        let sale = db
            .checkout()
            .commit_sale(PHARMACY, None, &cart, &proposal)
            .await
            .unwrap();

        assert_eq!(sale.total_cents, 9000);
        assert_eq!(sale.change_cents, 1000);

        let persisted = db.sales().get_by_folio(&sale.folio).await.unwrap();
        assert_eq!(persisted.lines.len(), 1);
        assert_eq!(persisted.tenders.len(), 1);
        assert_eq!(persisted.tenders[0].amount_cents, 9000); // net of change

        let stock = db.inventory().get_available_stock(PHARMACY, "p1").await.unwrap();
        assert_eq!(stock, 8);
    }

    #[tokio::test]
    async fn test_checkout_with_accrual_and_wallet_tender() {
        let db = db().await;
        seed_product(&db, "p1", 10000, 10).await;
        seed_seasonal_rule(&db, "p1", 1000, true).await;

        // Pre-fund the wallet so it can be spent as a tender.
        db.wallet()
            .credit("c1", Money::from_cents(3000), WalletMotive::SaleAccrual, PHARMACY, None)
            .await
            .unwrap();

        let ctx = db.catalog().get_product_price_context("p1", PHARMACY).await.unwrap();
        let mut cart = Cart::new(today(), CheckoutProfile::known(false));
        cart.add_item(&ctx, 1, 10).unwrap();
        assert_eq!(cart.total().cents(), 9000);
        assert_eq!(cart.wallet_accrual_total().cents(), 180);

        let proposal = TenderProposal {
            cash_cents: 6000,
            wallet_cents: 3000,
            ..Default::default()
        };
        let sale = db
            .checkout()
            .commit_sale(PHARMACY, Some("c1"), &cart, &proposal)
            .await
            .unwrap();

        assert_eq!(sale.tender_amount(TenderMethod::Wallet).cents(), 3000);
        assert_eq!(sale.tender_amount(TenderMethod::Cash).cents(), 6000);

        // 3000 funded − 3000 spent + 180 accrued
        let balance = db.wallet().get_wallet_balance("c1").await.unwrap();
        assert_eq!(balance.cents(), 180);

        let entries = db.wallet().statement("c1", 10).await.unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn test_quantity_promo_depletes_free_units_too() {
        let db = db().await;
        seed_product(&db, "p1", 4500, 10).await;
        seed_quantity_rule(&db, "p1", 3).await;

        let ctx = db.catalog().get_product_price_context("p1", PHARMACY).await.unwrap();
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        cart.add_item(&ctx, 4, 10).unwrap(); // 4 paid + 2 free

        let proposal = TenderProposal::cash(Money::from_cents(18000));
        let sale = db
            .checkout()
            .commit_sale(PHARMACY, None, &cart, &proposal)
            .await
            .unwrap();

        assert_eq!(sale.total_cents, 18000);
        assert_eq!(sale.lines.len(), 2);

        let stock = db.inventory().get_available_stock(PHARMACY, "p1").await.unwrap();
        assert_eq!(stock, 4); // 10 − 4 paid − 2 free
    }

    #[tokio::test]
    async fn test_insufficient_stock_at_commit_rolls_back_everything() {
        let db = db().await;
        seed_product(&db, "p1", 4500, 10).await;

        let ctx = db.catalog().get_product_price_context("p1", PHARMACY).await.unwrap();
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        cart.add_item(&ctx, 5, 10).unwrap();

        // Stock shrinks between pricing and commit (another terminal sold).
        db.inventory().set_stock(PHARMACY, "p1", 3).await.unwrap();

        let proposal = TenderProposal::cash(Money::from_cents(30000));
        let err = db
            .checkout()
            .commit_sale(PHARMACY, None, &cart, &proposal)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InsufficientStock { .. })));

        // Nothing persisted, stock untouched.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
        let stock = db.inventory().get_available_stock(PHARMACY, "p1").await.unwrap();
        assert_eq!(stock, 3);
    }

    #[tokio::test]
    async fn test_payment_mismatch_rejected_before_any_mutation() {
        let db = db().await;
        seed_product(&db, "p1", 10000, 10).await;

        let ctx = db.catalog().get_product_price_context("p1", PHARMACY).await.unwrap();
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        cart.add_item(&ctx, 1, 10).unwrap();

        // Digital covers the total and cash was still offered.
        let proposal = TenderProposal {
            cash_cents: 500,
            card_cents: 10000,
            ..Default::default()
        };
        let err = db
            .checkout()
            .commit_sale(PHARMACY, None, &cart, &proposal)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Payment(_))));

        let stock = db.inventory().get_available_stock(PHARMACY, "p1").await.unwrap();
        assert_eq!(stock, 10);
    }

    #[tokio::test]
    async fn test_wallet_tender_requires_customer() {
        let db = db().await;
        seed_product(&db, "p1", 10000, 10).await;

        let ctx = db.catalog().get_product_price_context("p1", PHARMACY).await.unwrap();
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        cart.add_item(&ctx, 1, 10).unwrap();

        let proposal = TenderProposal { wallet_cents: 10000, ..Default::default() };
        let err = db
            .checkout()
            .commit_sale(PHARMACY, None, &cart, &proposal)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::CustomerRequired { .. })));
    }
}
