//! # Catalog Repository
//!
//! Assembles the [`ProductPriceContext`] the engine prices against.
//!
//! This is THE validation boundary for promotion configuration: rows in
//! `promotion_rules` are loosely shaped (nullable day, rate, window,
//! required_count), and every row is checked and lifted into the typed
//! [`PromotionRule`] enum here. Past this point the resolver pattern-matches
//! exhaustively and never probes optional fields.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::{DbError, DbResult};
use farmapos_core::validation::{
    validate_date_window, validate_promotion_bps, validate_required_count,
};
use farmapos_core::{
    DateWindow, DayOfWeek, DiscountRate, ProductCategory, ProductPriceContext, PromotionRule,
    ValidationError,
};

/// Repository for catalog reads.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    category: ProductCategory,
    base_price_cents: i64,
    senior_eligible: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    rule_type: String,
    day: Option<DayOfWeek>,
    rate_bps: Option<i64>,
    starts_on: Option<NaiveDate>,
    ends_on: Option<NaiveDate>,
    wallet_eligible: bool,
    required_count: Option<i64>,
    eligible: Option<bool>,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Loads the price context for one product at one pharmacy.
    ///
    /// Fails if the product is unknown/inactive or if any configured
    /// promotion rule is malformed — a bad rule must surface loudly, not
    /// silently price at list.
    pub async fn get_product_price_context(
        &self,
        product_id: &str,
        pharmacy_id: &str,
    ) -> DbResult<ProductPriceContext> {
        let product: Option<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, category, base_price_cents, senior_eligible
            FROM products
            WHERE id = ?1 AND pharmacy_id = ?2 AND is_active = 1
            "#,
        )
        .bind(product_id)
        .bind(pharmacy_id)
        .fetch_optional(&self.pool)
        .await?;

        let product = product.ok_or_else(|| DbError::not_found("Product", product_id))?;

        let rule_rows: Vec<RuleRow> = sqlx::query_as(
            r#"
            SELECT rule_type, day, rate_bps, starts_on, ends_on,
                   wallet_eligible, required_count, eligible
            FROM promotion_rules
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rules = Vec::with_capacity(rule_rows.len());
        let mut senior_eligible = product.senior_eligible;
        for row in rule_rows {
            let rule = lift_rule(row)?;
            if let PromotionRule::SeniorCitizen { eligible: true } = rule {
                senior_eligible = true;
            }
            rules.push(rule);
        }

        Ok(ProductPriceContext {
            product_id: product.id,
            name: product.name,
            base_price_cents: product.base_price_cents,
            category: product.category,
            senior_eligible,
            rules,
        })
    }
}

/// Validates one loosely-shaped rule row into a typed [`PromotionRule`].
fn lift_rule(row: RuleRow) -> DbResult<PromotionRule> {
    match row.rule_type.as_str() {
        "day_of_week" => {
            let day = row.day.ok_or_else(|| required("day"))?;
            let rate = lift_rate(row.rate_bps)?;
            let window = lift_window(row.starts_on, row.ends_on)?;
            Ok(PromotionRule::DayOfWeek {
                day,
                rate,
                window,
                wallet_eligible: row.wallet_eligible,
            })
        }
        "seasonal" => {
            let rate = lift_rate(row.rate_bps)?;
            let window = lift_window(row.starts_on, row.ends_on)?;
            Ok(PromotionRule::Seasonal { rate, window, wallet_eligible: row.wallet_eligible })
        }
        "quantity" => {
            let required_count =
                row.required_count.ok_or_else(|| required("required_count"))? as u32;
            validate_required_count(required_count)?;
            let window = lift_window(row.starts_on, row.ends_on)?;
            Ok(PromotionRule::Quantity { required_count, window })
        }
        "senior_citizen" => {
            Ok(PromotionRule::SeniorCitizen { eligible: row.eligible.unwrap_or(false) })
        }
        other => Err(ValidationError::InvalidFormat {
            field: "rule_type".to_string(),
            reason: format!("unknown promotion rule type '{other}'"),
        }
        .into()),
    }
}

fn lift_rate(rate_bps: Option<i64>) -> DbResult<DiscountRate> {
    let bps = rate_bps.ok_or_else(|| required("rate_bps"))?;
    let bps_u32 =
        u32::try_from(bps).map_err(|_| ValidationError::PercentageOutOfRange { bps })?;
    validate_promotion_bps(bps_u32)?;
    Ok(DiscountRate::from_bps(bps_u32))
}

fn lift_window(starts_on: Option<NaiveDate>, ends_on: Option<NaiveDate>) -> DbResult<DateWindow> {
    let start = starts_on.ok_or_else(|| required("starts_on"))?;
    let end = ends_on.ok_or_else(|| required("ends_on"))?;
    validate_date_window(start, end)?;
    Ok(DateWindow::new(start, end))
}

fn required(field: &str) -> DbError {
    ValidationError::Required { field: field.to_string() }.into()
}
