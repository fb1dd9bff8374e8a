//! # Inventory Repository
//!
//! Stock counts per (pharmacy, product). This engine only depletes and
//! restores units; lot/expiration ordering is the inventory collaborator's
//! concern upstream.
//!
//! Depletion is a GUARDED update: the `units >= ?` predicate makes the
//! check-and-decrement a single atomic statement, so two concurrent
//! checkouts can never jointly oversell a product.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use farmapos_core::CoreError;

/// Repository for stock reads and standalone stock mutations.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Current available units (0 when no stock row exists).
    pub async fn get_available_stock(
        &self,
        pharmacy_id: &str,
        product_id: &str,
    ) -> DbResult<i64> {
        let units: Option<i64> = sqlx::query_scalar(
            "SELECT units FROM stock WHERE pharmacy_id = ?1 AND product_id = ?2",
        )
        .bind(pharmacy_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(units.unwrap_or(0))
    }

    /// Depletes stock in its own transaction (collaborator surface; the
    /// checkout service uses [`deplete_stock_tx`] inside its own).
    pub async fn deplete_stock(
        &self,
        pharmacy_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        deplete_stock_tx(&mut tx, pharmacy_id, product_id, quantity).await?;
        tx.commit().await.map_err(|e| DbError::TransactionAborted(e.to_string()))?;
        Ok(())
    }

    /// Sets the absolute stock level (seed/admin surface).
    pub async fn set_stock(
        &self,
        pharmacy_id: &str,
        product_id: &str,
        units: i64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock (pharmacy_id, product_id, units) VALUES (?1, ?2, ?3)
            ON CONFLICT (pharmacy_id, product_id) DO UPDATE SET units = excluded.units
            "#,
        )
        .bind(pharmacy_id)
        .bind(product_id)
        .bind(units)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// =============================================================================
// Within-Transaction Operations
// =============================================================================

/// Depletes `quantity` units, failing with `InsufficientStock` when not
/// enough remain. The caller's uncommitted transaction rolls back on drop.
pub async fn deplete_stock_tx(
    conn: &mut SqliteConnection,
    pharmacy_id: &str,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE stock SET units = units - ?3
        WHERE pharmacy_id = ?1 AND product_id = ?2 AND units >= ?3
        "#,
    )
    .bind(pharmacy_id)
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available: Option<i64> = sqlx::query_scalar(
            "SELECT units FROM stock WHERE pharmacy_id = ?1 AND product_id = ?2",
        )
        .bind(pharmacy_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        return Err(DbError::Core(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            available: available.unwrap_or(0),
            requested: quantity,
        }));
    }

    debug!(product_id, quantity, "Stock depleted");
    Ok(())
}

/// Returns `quantity` units to stock (returns/cancellations).
pub async fn restock_tx(
    conn: &mut SqliteConnection,
    pharmacy_id: &str,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock (pharmacy_id, product_id, units) VALUES (?1, ?2, ?3)
        ON CONFLICT (pharmacy_id, product_id) DO UPDATE SET units = units + excluded.units
        "#,
    )
    .bind(pharmacy_id)
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    debug!(product_id, quantity, "Stock restored");
    Ok(())
}
