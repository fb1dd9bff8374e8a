//! # Refund Repository
//!
//! Persistence for immutable return and cancellation records. Like sales,
//! these are written exactly once inside the reversal service's transaction.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use farmapos_core::{CancellationTransaction, ReturnTransaction, ReturnedLine};

/// Repository for return/cancellation records.
#[derive(Debug, Clone)]
pub struct RefundRepository {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    id: String,
    folio: String,
    sale_id: String,
    pharmacy_id: String,
    customer_id: Option<String>,
    refund_cash_cents: i64,
    refund_wallet_cents: i64,
    wallet_reversal_cents: i64,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl RefundRepository {
    /// Creates a new RefundRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RefundRepository { pool }
    }

    /// Looks a return up by its ticket folio.
    pub async fn get_return_by_folio(&self, folio: &str) -> DbResult<ReturnTransaction> {
        let row: Option<RefundRow> = sqlx::query_as(
            r#"
            SELECT id, folio, sale_id, pharmacy_id, customer_id,
                   refund_cash_cents, refund_wallet_cents, wallet_reversal_cents, created_at
            FROM returns WHERE folio = ?1
            "#,
        )
        .bind(folio)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| DbError::not_found("Return", folio))?;

        #[derive(sqlx::FromRow)]
        struct LineRow {
            product_id: String,
            quantity: i64,
        }

        let lines: Vec<LineRow> = sqlx::query_as(
            "SELECT product_id, quantity FROM return_lines WHERE return_id = ?1",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ReturnTransaction {
            id: row.id,
            folio: row.folio,
            sale_id: row.sale_id,
            pharmacy_id: row.pharmacy_id,
            customer_id: row.customer_id,
            lines: lines
                .into_iter()
                .map(|l| ReturnedLine { product_id: l.product_id, quantity: l.quantity as u32 })
                .collect(),
            refund_cash_cents: row.refund_cash_cents,
            refund_wallet_cents: row.refund_wallet_cents,
            wallet_reversal_cents: row.wallet_reversal_cents,
            created_at: row.created_at,
        })
    }

    /// Looks a cancellation up by its ticket folio.
    pub async fn get_cancellation_by_folio(&self, folio: &str) -> DbResult<CancellationTransaction> {
        let row: Option<RefundRow> = sqlx::query_as(
            r#"
            SELECT id, folio, sale_id, pharmacy_id, customer_id,
                   refund_cash_cents, refund_wallet_cents, wallet_reversal_cents, created_at
            FROM cancellations WHERE folio = ?1
            "#,
        )
        .bind(folio)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| DbError::not_found("Cancellation", folio))?;

        Ok(CancellationTransaction {
            id: row.id,
            folio: row.folio,
            sale_id: row.sale_id,
            pharmacy_id: row.pharmacy_id,
            customer_id: row.customer_id,
            refund_cash_cents: row.refund_cash_cents,
            refund_wallet_cents: row.refund_wallet_cents,
            wallet_reversal_cents: row.wallet_reversal_cents,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Within-Transaction Operations
// =============================================================================

/// Paid quantities already returned against a sale, summed per product.
/// Read inside the reversal transaction so two concurrent returns cannot
/// jointly return more than was sold.
pub async fn returned_quantities_tx(
    conn: &mut SqliteConnection,
    sale_id: &str,
) -> DbResult<Vec<(String, u32)>> {
    #[derive(sqlx::FromRow)]
    struct Row {
        product_id: String,
        total: i64,
    }

    let rows: Vec<Row> = sqlx::query_as(
        r#"
        SELECT rl.product_id AS product_id, SUM(rl.quantity) AS total
        FROM return_lines rl
        JOIN returns r ON r.id = rl.return_id
        WHERE r.sale_id = ?1
        GROUP BY rl.product_id
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(|r| (r.product_id, r.total as u32)).collect())
}

/// Whether the sale has already been cancelled.
pub async fn is_cancelled_tx(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cancellations WHERE sale_id = ?1")
        .bind(sale_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

/// Inserts the complete return record (header + lines).
pub async fn insert_return_tx(
    conn: &mut SqliteConnection,
    ret: &ReturnTransaction,
) -> DbResult<()> {
    debug!(id = %ret.id, folio = %ret.folio, "Inserting return");

    sqlx::query(
        r#"
        INSERT INTO returns (
            id, folio, sale_id, pharmacy_id, customer_id,
            refund_cash_cents, refund_wallet_cents, wallet_reversal_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&ret.id)
    .bind(&ret.folio)
    .bind(&ret.sale_id)
    .bind(&ret.pharmacy_id)
    .bind(&ret.customer_id)
    .bind(ret.refund_cash_cents)
    .bind(ret.refund_wallet_cents)
    .bind(ret.wallet_reversal_cents)
    .bind(ret.created_at)
    .execute(&mut *conn)
    .await?;

    for line in &ret.lines {
        sqlx::query(
            "INSERT INTO return_lines (id, return_id, product_id, quantity) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&ret.id)
        .bind(&line.product_id)
        .bind(line.quantity as i64)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Inserts a cancellation record.
pub async fn insert_cancellation_tx(
    conn: &mut SqliteConnection,
    cancellation: &CancellationTransaction,
) -> DbResult<()> {
    debug!(id = %cancellation.id, folio = %cancellation.folio, "Inserting cancellation");

    sqlx::query(
        r#"
        INSERT INTO cancellations (
            id, folio, sale_id, pharmacy_id, customer_id,
            refund_cash_cents, refund_wallet_cents, wallet_reversal_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&cancellation.id)
    .bind(&cancellation.folio)
    .bind(&cancellation.sale_id)
    .bind(&cancellation.pharmacy_id)
    .bind(&cancellation.customer_id)
    .bind(cancellation.refund_cash_cents)
    .bind(cancellation.refund_wallet_cents)
    .bind(cancellation.wallet_reversal_cents)
    .bind(cancellation.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
