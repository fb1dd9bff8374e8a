//! # Wallet Repository (Monedero)
//!
//! Append-only per-customer ledger plus a cached balance.
//!
//! ## Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  1. Ledger rows are IMMUTABLE: appended, never updated or deleted   │
//! │  2. balance == SUM(ledger deltas), reconciled in the SAME           │
//! │     transaction as every append (the cached column can never        │
//! │     drift from the ledger)                                          │
//! │  3. balance >= 0 always: debits CLAMP to the current balance and    │
//! │     report the applied amount back to the caller                    │
//! │  4. Every balance write is version-checked; a lost race surfaces    │
//! │     as ConcurrencyConflict, retried by the caller with a fresh read │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two debit flavors exist on purpose: spending wallet credit as a TENDER
//! must never silently shrink (`debit_exact_tx`), while taking back
//! accrued cashback on a return clamps to whatever the customer still has
//! (`debit_clamped_tx`).

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use farmapos_core::{CoreError, Money, WalletEntry, WalletMotive};

/// Repository for wallet balances and the ledger.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Copy, sqlx::FromRow)]
struct AccountRow {
    balance_cents: i64,
    version: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: String,
    customer_id: String,
    delta_cents: i64,
    motive: WalletMotive,
    pharmacy_id: String,
    folio: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

impl From<EntryRow> for WalletEntry {
    fn from(row: EntryRow) -> Self {
        WalletEntry {
            id: row.id,
            customer_id: row.customer_id,
            delta_cents: row.delta_cents,
            motive: row.motive,
            pharmacy_id: row.pharmacy_id,
            folio: row.folio,
            created_at: row.created_at,
        }
    }
}

impl WalletRepository {
    /// Creates a new WalletRepository.
    pub fn new(pool: SqlitePool) -> Self {
        WalletRepository { pool }
    }

    /// Current balance (0 for a customer with no account yet).
    pub async fn get_wallet_balance(&self, customer_id: &str) -> DbResult<Money> {
        let balance: Option<i64> = sqlx::query_scalar(
            "SELECT balance_cents FROM wallet_accounts WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(Money::from_cents(balance.unwrap_or(0)))
    }

    /// Most-recent-first page of the customer's ledger, for the ticket and
    /// the corte-de-caja collaborator.
    pub async fn statement(&self, customer_id: &str, limit: i64) -> DbResult<Vec<WalletEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, customer_id, delta_cents, motive, pharmacy_id, folio, created_at
            FROM wallet_ledger
            WHERE customer_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WalletEntry::from).collect())
    }

    /// Credits the wallet in its own transaction (collaborator surface).
    pub async fn credit(
        &self,
        customer_id: &str,
        amount: Money,
        motive: WalletMotive,
        pharmacy_id: &str,
        folio: Option<&str>,
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        credit_tx(&mut tx, customer_id, amount, motive, pharmacy_id, folio).await?;
        tx.commit().await.map_err(|e| DbError::TransactionAborted(e.to_string()))?;
        Ok(())
    }

    /// Debits the wallet in its own transaction, clamped to the balance.
    /// Returns the amount actually applied.
    pub async fn debit(
        &self,
        customer_id: &str,
        amount: Money,
        motive: WalletMotive,
        pharmacy_id: &str,
        folio: Option<&str>,
    ) -> DbResult<Money> {
        let mut tx = self.pool.begin().await?;
        let applied = debit_clamped_tx(&mut tx, customer_id, amount, motive, pharmacy_id, folio).await?;
        tx.commit().await.map_err(|e| DbError::TransactionAborted(e.to_string()))?;
        Ok(applied)
    }
}

// =============================================================================
// Within-Transaction Operations
// =============================================================================

/// Creates the account row if missing (idempotent).
async fn ensure_account_tx(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO wallet_accounts (customer_id, balance_cents, version) VALUES (?1, 0, 0)",
    )
    .bind(customer_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn read_account_tx(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<AccountRow> {
    ensure_account_tx(&mut *conn, customer_id).await?;
    let row: AccountRow = sqlx::query_as(
        "SELECT balance_cents, version FROM wallet_accounts WHERE customer_id = ?1",
    )
    .bind(customer_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

/// Appends one immutable ledger entry and reconciles the cached balance in
/// the same write, version-checked.
async fn apply_delta_tx(
    conn: &mut SqliteConnection,
    customer_id: &str,
    account: AccountRow,
    delta: Money,
    motive: WalletMotive,
    pharmacy_id: &str,
    folio: Option<&str>,
) -> DbResult<()> {
    let entry_id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO wallet_ledger (id, customer_id, delta_cents, motive, pharmacy_id, folio, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&entry_id)
    .bind(customer_id)
    .bind(delta.cents())
    .bind(motive)
    .bind(pharmacy_id)
    .bind(folio)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let new_balance = account.balance_cents + delta.cents();
    let result = sqlx::query(
        r#"
        UPDATE wallet_accounts SET balance_cents = ?2, version = version + 1
        WHERE customer_id = ?1 AND version = ?3
        "#,
    )
    .bind(customer_id)
    .bind(new_balance)
    .bind(account.version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::ConcurrencyConflict { customer_id: customer_id.to_string() });
    }

    debug!(customer_id, delta = delta.cents(), balance = new_balance, "Wallet entry appended");
    Ok(())
}

/// Credits `amount` to the wallet.
pub async fn credit_tx(
    conn: &mut SqliteConnection,
    customer_id: &str,
    amount: Money,
    motive: WalletMotive,
    pharmacy_id: &str,
    folio: Option<&str>,
) -> DbResult<()> {
    if !amount.is_positive() {
        return Ok(());
    }
    let account = read_account_tx(&mut *conn, customer_id).await?;
    apply_delta_tx(&mut *conn, customer_id, account, amount, motive, pharmacy_id, folio).await
}

/// Debits exactly `amount`, failing with `InsufficientWalletBalance` when
/// the balance does not cover it. Used for the wallet TENDER on a sale.
pub async fn debit_exact_tx(
    conn: &mut SqliteConnection,
    customer_id: &str,
    amount: Money,
    motive: WalletMotive,
    pharmacy_id: &str,
    folio: Option<&str>,
) -> DbResult<()> {
    if !amount.is_positive() {
        return Ok(());
    }
    let account = read_account_tx(&mut *conn, customer_id).await?;
    if account.balance_cents < amount.cents() {
        return Err(DbError::Core(CoreError::InsufficientWalletBalance {
            requested_cents: amount.cents(),
            balance_cents: account.balance_cents,
        }));
    }
    apply_delta_tx(
        &mut *conn,
        customer_id,
        account,
        Money::zero() - amount,
        motive,
        pharmacy_id,
        folio,
    )
    .await
}

/// Debits up to `requested`, clamped to the current balance. Returns the
/// amount actually applied — that amount, not the requested one, goes on
/// the ticket. Used for accrual reversals on returns.
pub async fn debit_clamped_tx(
    conn: &mut SqliteConnection,
    customer_id: &str,
    requested: Money,
    motive: WalletMotive,
    pharmacy_id: &str,
    folio: Option<&str>,
) -> DbResult<Money> {
    if !requested.is_positive() {
        return Ok(Money::zero());
    }
    let account = read_account_tx(&mut *conn, customer_id).await?;
    let applied = Money::from_cents(requested.cents().min(account.balance_cents));
    if applied.is_zero() {
        return Ok(Money::zero());
    }
    apply_delta_tx(
        &mut *conn,
        customer_id,
        account,
        Money::zero() - applied,
        motive,
        pharmacy_id,
        folio,
    )
    .await?;
    Ok(applied)
}

// =============================================================================
// Unit Tests
// =============================================================================
