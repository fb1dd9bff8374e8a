//! # Sale Repository
//!
//! Persistence for immutable [`SaleTransaction`] records (header + lines +
//! tenders). Sales are written exactly once, inside the checkout service's
//! transaction, and never updated afterwards: corrections happen through
//! return/cancellation records.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use farmapos_core::{SaleLine, SaleTransaction, Tender, TenderMethod};

/// Repository for sale records.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    folio: String,
    pharmacy_id: String,
    customer_id: Option<String>,
    total_cents: i64,
    discount_total_cents: i64,
    wallet_accrual_total_cents: i64,
    change_cents: i64,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SaleLineRow {
    product_id: String,
    name_snapshot: String,
    quantity: i64,
    unit_price_final_cents: i64,
    unit_price_original_cents: i64,
    discount_label: String,
    wallet_accrual_per_unit_cents: i64,
    is_free_unit: bool,
    required_count_for_free: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
struct TenderRow {
    method: TenderMethod,
    amount_cents: i64,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Loads a sale with its lines and tenders.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SaleTransaction>> {
        let header: Option<SaleRow> = sqlx::query_as(
            r#"
            SELECT id, folio, pharmacy_id, customer_id, total_cents,
                   discount_total_cents, wallet_accrual_total_cents,
                   change_cents, created_at
            FROM sales WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let lines: Vec<SaleLineRow> = sqlx::query_as(
            r#"
            SELECT product_id, name_snapshot, quantity, unit_price_final_cents,
                   unit_price_original_cents, discount_label,
                   wallet_accrual_per_unit_cents, is_free_unit, required_count_for_free
            FROM sale_lines WHERE sale_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let tenders: Vec<TenderRow> = sqlx::query_as(
            "SELECT method, amount_cents FROM sale_tenders WHERE sale_id = ?1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(SaleTransaction {
            id: header.id,
            folio: header.folio,
            pharmacy_id: header.pharmacy_id,
            customer_id: header.customer_id,
            lines: lines
                .into_iter()
                .map(|l| SaleLine {
                    product_id: l.product_id,
                    name_snapshot: l.name_snapshot,
                    quantity: l.quantity as u32,
                    unit_price_final_cents: l.unit_price_final_cents,
                    unit_price_original_cents: l.unit_price_original_cents,
                    discount_label: l.discount_label,
                    wallet_accrual_per_unit_cents: l.wallet_accrual_per_unit_cents,
                    is_free_unit: l.is_free_unit,
                    required_count_for_free: l.required_count_for_free.map(|n| n as u32),
                })
                .collect(),
            tenders: tenders
                .into_iter()
                .map(|t| Tender { method: t.method, amount_cents: t.amount_cents })
                .collect(),
            total_cents: header.total_cents,
            discount_total_cents: header.discount_total_cents,
            wallet_accrual_total_cents: header.wallet_accrual_total_cents,
            change_cents: header.change_cents,
            created_at: header.created_at,
        }))
    }

    /// Looks a sale up by the folio printed on the ticket.
    pub async fn get_by_folio(&self, folio: &str) -> DbResult<SaleTransaction> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM sales WHERE folio = ?1")
                .bind(folio)
                .fetch_optional(&self.pool)
                .await?;

        let id = id.ok_or_else(|| DbError::not_found("Sale", folio))?;
        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", folio))
    }
}

// =============================================================================
// Within-Transaction Operations
// =============================================================================

/// Inserts the complete sale record: header, lines (in scan order), tenders.
pub async fn insert_sale_tx(conn: &mut SqliteConnection, sale: &SaleTransaction) -> DbResult<()> {
    debug!(id = %sale.id, folio = %sale.folio, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, folio, pharmacy_id, customer_id,
            total_cents, discount_total_cents, wallet_accrual_total_cents,
            change_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.folio)
    .bind(&sale.pharmacy_id)
    .bind(&sale.customer_id)
    .bind(sale.total_cents)
    .bind(sale.discount_total_cents)
    .bind(sale.wallet_accrual_total_cents)
    .bind(sale.change_cents)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    for (line_no, line) in sale.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, sale_id, line_no, product_id, name_snapshot, quantity,
                unit_price_final_cents, unit_price_original_cents, discount_label,
                wallet_accrual_per_unit_cents, is_free_unit, required_count_for_free
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&sale.id)
        .bind(line_no as i64)
        .bind(&line.product_id)
        .bind(&line.name_snapshot)
        .bind(line.quantity as i64)
        .bind(line.unit_price_final_cents)
        .bind(line.unit_price_original_cents)
        .bind(&line.discount_label)
        .bind(line.wallet_accrual_per_unit_cents)
        .bind(line.is_free_unit)
        .bind(line.required_count_for_free.map(|n| n as i64))
        .execute(&mut *conn)
        .await?;
    }

    for tender in &sale.tenders {
        sqlx::query(
            "INSERT INTO sale_tenders (id, sale_id, method, amount_cents) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&sale.id)
        .bind(tender.method)
        .bind(tender.amount_cents)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
