//! # Cart & Quantity-Promotion Tracking
//!
//! The live cart: priced lines plus the synthetic free-unit lines that
//! N-for-(N-1) promotions inject. This is the one stateful piece of the
//! pricing engine — state lives for the duration of a checkout and dies
//! with it.
//!
//! ## Free-Unit Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  3x2 promotion (required_count = 3): pay 2, get 1                   │
//! │                                                                     │
//! │  paid qty   free units = floor(qty / 2)   synthetic line            │
//! │  ────────   ───────────────────────────   ──────────────            │
//! │     1                 0                   (none)                    │
//! │     2                 1                   "3x2-Gratis" ×1           │
//! │     3                 1                   "3x2-Gratis" ×1           │
//! │     4                 2                   "3x2-Gratis" ×2           │
//! │                                                                     │
//! │  Stock is re-validated for paid + free BEFORE any change commits;   │
//! │  an insufficient-stock rejection leaves the cart untouched.         │
//! │  Removing the paid line always removes its free line.               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::price_unit;
use crate::promotion::{resolve, CheckoutProfile};
use crate::types::{ProductPriceContext, SaleLine};
use crate::{MAX_CART_LINES, MAX_ITEM_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// A priced line in the live cart.
///
/// Pricing is frozen when the product is first scanned (snapshot pattern):
/// quantity changes later never re-read the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,

    /// Product name at scan time (frozen).
    pub name: String,

    pub quantity: u32,

    /// Final unit price, all discount passes applied. Zero on free lines.
    pub unit_price_final_cents: i64,

    /// List unit price at scan time (frozen).
    pub unit_price_original_cents: i64,

    /// Ticket label of the applied promotion, empty when none.
    pub discount_label: String,

    /// Wallet credit per paid unit. Zero on free lines.
    pub wallet_accrual_per_unit_cents: i64,

    /// Synthetic line injected by a quantity promotion.
    pub is_free_unit: bool,

    /// `Some(N)` when an N-for-(N-1) rule governs this product.
    pub required_count_for_free: Option<u32>,

    /// When this line was first scanned.
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Final unit price as Money.
    #[inline]
    pub fn unit_price_final(&self) -> Money {
        Money::from_cents(self.unit_price_final_cents)
    }

    /// Line total at the final unit price (zero for free lines).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price_final().multiply_quantity(self.quantity as i64)
    }

    /// Discount granted by this line versus list price.
    pub fn discount_total(&self) -> Money {
        let original = Money::from_cents(self.unit_price_original_cents);
        (original - self.unit_price_final()).multiply_quantity(self.quantity as i64)
    }

    /// Wallet credit earned by the whole line.
    #[inline]
    pub fn wallet_accrual_total(&self) -> Money {
        Money::from_cents(self.wallet_accrual_per_unit_cents)
            .multiply_quantity(self.quantity as i64)
    }
}

impl From<&CartLine> for SaleLine {
    fn from(line: &CartLine) -> Self {
        SaleLine {
            product_id: line.product_id.clone(),
            name_snapshot: line.name.clone(),
            quantity: line.quantity,
            unit_price_final_cents: line.unit_price_final_cents,
            unit_price_original_cents: line.unit_price_original_cents,
            discount_label: line.discount_label.clone(),
            wallet_accrual_per_unit_cents: line.wallet_accrual_per_unit_cents,
            is_free_unit: line.is_free_unit,
            required_count_for_free: line.required_count_for_free,
        }
    }
}

// =============================================================================
// Pricing a Line
// =============================================================================

/// Free units earned by `quantity` paid units under an N-for-(N-1) rule.
#[inline]
pub fn free_units(quantity: u32, required_count: u32) -> u32 {
    quantity / (required_count - 1)
}

/// Prices one cart line: resolve the promotion, apply the passes, build the
/// line.
///
/// This is the ONE pricing function. The cashier UI calls it for live
/// preview; [`Cart`] calls it when the line is committed. There is no
/// second implementation to drift out of sync.
pub fn price_cart_line(
    ctx: &ProductPriceContext,
    date: NaiveDate,
    profile: CheckoutProfile,
    quantity: u32,
) -> CartLine {
    let promo = resolve(ctx, date, profile);
    let priced = price_unit(ctx.base_price(), promo.as_ref());

    CartLine {
        product_id: ctx.product_id.clone(),
        name: ctx.name.clone(),
        quantity,
        unit_price_final_cents: priced.unit_price_final.cents(),
        unit_price_original_cents: ctx.base_price_cents,
        discount_label: promo.as_ref().map(|p| p.label.clone()).unwrap_or_default(),
        wallet_accrual_per_unit_cents: priced.wallet_accrual_per_unit.cents(),
        is_free_unit: false,
        required_count_for_free: promo.as_ref().and_then(|p| p.required_count),
        added_at: Utc::now(),
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The checkout cart.
///
/// ## Invariants
/// - At most one paid line per product; adding the same product again
///   increases its quantity
/// - At most one free line per product, paired to its paid line, with
///   `quantity = floor(paid / (N-1))`
/// - Every quantity change is stock-checked for paid + free first;
///   a rejection leaves the cart exactly as it was
/// - The pricing date and checkout profile are fixed at cart creation
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    lines: Vec<CartLine>,

    /// Pricing date ("today" for every promotion window check).
    #[ts(as = "String")]
    pub date: NaiveDate,

    /// Customer facts, cached for the cart's lifetime.
    pub profile: CheckoutProfile,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart pricing against `date` for `profile`.
    pub fn new(date: NaiveDate, profile: CheckoutProfile) -> Self {
        Cart { lines: Vec::new(), date, profile, created_at: Utc::now() }
    }

    /// All lines, paid and free, in scan order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Number of lines (free lines included).
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Checks if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds `quantity` units of a product, or increases an existing line.
    ///
    /// `available_stock` is the inventory collaborator's current count for
    /// this product; the change is rejected unless the new paid quantity
    /// PLUS the free units it earns fit within it.
    pub fn add_item(
        &mut self,
        ctx: &ProductPriceContext,
        quantity: u32,
        available_stock: i64,
    ) -> CoreResult<()> {
        if quantity == 0 {
            return Err(CoreError::Validation(crate::error::ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }));
        }

        let new_quantity = match self.paid_line(&ctx.product_id) {
            Some(line) => line.quantity + quantity,
            None => {
                if self.lines.len() >= MAX_CART_LINES {
                    return Err(CoreError::CartTooLarge { max: MAX_CART_LINES });
                }
                quantity
            }
        };

        self.set_paid_quantity(ctx, new_quantity, available_stock)
    }

    /// Sets the paid quantity of a product outright. Zero removes the line
    /// (and its free line).
    pub fn update_quantity(
        &mut self,
        ctx: &ProductPriceContext,
        quantity: u32,
        available_stock: i64,
    ) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(&ctx.product_id);
        }
        if self.paid_line(&ctx.product_id).is_none() {
            return Err(CoreError::LineNotInCart { product_id: ctx.product_id.clone() });
        }
        self.set_paid_quantity(ctx, quantity, available_stock)
    }

    /// Removes a product's paid line and its paired free line.
    pub fn remove_item(&mut self, product_id: &str) -> CoreResult<()> {
        if self.paid_line(product_id).is_none() {
            return Err(CoreError::LineNotInCart { product_id: product_id.to_string() });
        }
        self.lines.retain(|l| l.product_id != product_id);
        Ok(())
    }

    /// Clears all lines.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Grand total at final prices (free lines contribute zero).
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Total discount versus list prices, free units valued at list price.
    pub fn discount_total(&self) -> Money {
        self.lines.iter().map(CartLine::discount_total).sum()
    }

    /// Total wallet credit the cart will accrue at checkout.
    pub fn wallet_accrual_total(&self) -> Money {
        self.lines.iter().map(CartLine::wallet_accrual_total).sum()
    }

    fn paid_line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id && !l.is_free_unit)
    }

    /// Applies a validated paid-quantity change and re-syncs the free line.
    ///
    /// The stock check happens against the FUTURE paid + free count before
    /// anything mutates, so a rejection is side-effect free.
    fn set_paid_quantity(
        &mut self,
        ctx: &ProductPriceContext,
        new_quantity: u32,
        available_stock: i64,
    ) -> CoreResult<()> {
        if new_quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: new_quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        let priced = price_cart_line(ctx, self.date, self.profile, new_quantity);
        let free = match priced.required_count_for_free {
            Some(n) => free_units(new_quantity, n),
            None => 0,
        };

        let needed = (new_quantity + free) as i64;
        if needed > available_stock {
            return Err(CoreError::InsufficientStock {
                product_id: ctx.product_id.clone(),
                available: available_stock,
                requested: needed,
            });
        }

        match self.lines.iter().position(|l| l.product_id == ctx.product_id && !l.is_free_unit) {
            Some(i) => self.lines[i].quantity = new_quantity,
            None => self.lines.push(priced.clone()),
        }

        self.sync_free_line(&priced, free);
        Ok(())
    }

    /// Ensures exactly one free line with `count` units exists for the
    /// product — or none when `count` is zero.
    fn sync_free_line(&mut self, paid: &CartLine, count: u32) {
        if count == 0 {
            self.lines.retain(|l| !(l.product_id == paid.product_id && l.is_free_unit));
            return;
        }

        let required = paid
            .required_count_for_free
            .expect("free units only exist under a quantity rule");

        match self.lines.iter().position(|l| l.product_id == paid.product_id && l.is_free_unit) {
            Some(i) => self.lines[i].quantity = count,
            None => self.lines.push(CartLine {
                product_id: paid.product_id.clone(),
                name: paid.name.clone(),
                quantity: count,
                unit_price_final_cents: 0,
                unit_price_original_cents: paid.unit_price_original_cents,
                discount_label: format!("{}x{}-Gratis", required, required - 1),
                wallet_accrual_per_unit_cents: 0,
                is_free_unit: true,
                required_count_for_free: Some(required),
                added_at: Utc::now(),
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::DiscountRate;
    use crate::types::{DateWindow, ProductCategory, PromotionRule};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn today() -> NaiveDate {
        d(2026, 3, 3)
    }

    fn plain_product(id: &str, price_cents: i64) -> ProductPriceContext {
        ProductPriceContext {
            product_id: id.to_string(),
            name: format!("Producto {id}"),
            base_price_cents: price_cents,
            category: ProductCategory::Farmacia,
            senior_eligible: false,
            rules: vec![],
        }
    }

    fn three_for_two(id: &str, price_cents: i64) -> ProductPriceContext {
        let mut ctx = plain_product(id, price_cents);
        ctx.rules = vec![PromotionRule::Quantity {
            required_count: 3,
            window: DateWindow::new(d(2026, 1, 1), d(2026, 12, 31)),
        }];
        ctx
    }

    #[test]
    fn test_add_item_prices_line() {
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        cart.add_item(&plain_product("p1", 999), 2, 100).unwrap();

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.total().cents(), 1998);
        assert!(cart.discount_total().is_zero());
    }

    #[test]
    fn test_add_same_product_increases_quantity() {
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        let p = plain_product("p1", 999);
        cart.add_item(&p, 2, 100).unwrap();
        cart.add_item(&p, 3, 100).unwrap();

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.lines()[0].quantity, 5);
    }

    #[test]
    fn test_three_for_two_free_line_thresholds() {
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        let p = three_for_two("p1", 4500);

        // 1 paid unit: no free line yet
        cart.add_item(&p, 1, 100).unwrap();
        assert_eq!(cart.line_count(), 1);

        // 2 paid units: floor(2/2) = 1 free
        cart.add_item(&p, 1, 100).unwrap();
        assert_eq!(cart.line_count(), 2);
        let free = cart.lines().iter().find(|l| l.is_free_unit).unwrap();
        assert_eq!(free.quantity, 1);
        assert_eq!(free.unit_price_final_cents, 0);
        assert_eq!(free.discount_label, "3x2-Gratis");

        // 3rd unit keeps exactly 1 free unit (floor(3/2) = 1)
        cart.add_item(&p, 1, 100).unwrap();
        let free = cart.lines().iter().find(|l| l.is_free_unit).unwrap();
        assert_eq!(free.quantity, 1);

        // 5th unit: floor(5/2) = 2
        cart.add_item(&p, 2, 100).unwrap();
        let free = cart.lines().iter().find(|l| l.is_free_unit).unwrap();
        assert_eq!(free.quantity, 2);

        // Paid at list price, total counts only paid units
        assert_eq!(cart.total().cents(), 4500 * 5);
        // Free units discount at list price
        assert_eq!(cart.discount_total().cents(), 4500 * 2);
    }

    #[test]
    fn test_free_line_removed_when_quantity_drops() {
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        let p = three_for_two("p1", 4500);
        cart.add_item(&p, 4, 100).unwrap();
        assert_eq!(cart.lines().iter().find(|l| l.is_free_unit).unwrap().quantity, 2);

        cart.update_quantity(&p, 1, 100).unwrap();
        assert!(cart.lines().iter().all(|l| !l.is_free_unit));
        assert_eq!(cart.line_count(), 1);
    }

    #[test]
    fn test_stock_check_counts_free_units_and_rejects_atomically() {
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        let p = three_for_two("p1", 4500);

        // 4 paid + 2 free = 6 needed, only 5 in stock → rejected untouched
        let err = cart.add_item(&p, 4, 5).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { requested: 6, available: 5, .. }));
        assert!(cart.is_empty());

        // 3 paid + 1 free = 4 needed fits
        cart.add_item(&p, 3, 5).unwrap();
        assert_eq!(cart.line_count(), 2);

        // Bumping to 4 paid (+2 free) exceeds stock again; cart unchanged
        let err = cart.add_item(&p, 1, 5).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));
        assert_eq!(cart.lines().iter().find(|l| !l.is_free_unit).unwrap().quantity, 3);
        assert_eq!(cart.lines().iter().find(|l| l.is_free_unit).unwrap().quantity, 1);
    }

    #[test]
    fn test_remove_paid_line_removes_free_line() {
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        let p = three_for_two("p1", 4500);
        cart.add_item(&p, 2, 100).unwrap();
        assert_eq!(cart.line_count(), 2);

        cart.remove_item("p1").unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        let p = plain_product("p1", 999);
        cart.add_item(&p, 2, 100).unwrap();
        cart.update_quantity(&p, 0, 100).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_unknown_product_errors() {
        let mut cart = Cart::new(today(), CheckoutProfile::anonymous());
        let err = cart.update_quantity(&plain_product("nope", 100), 2, 100).unwrap_err();
        assert!(matches!(err, CoreError::LineNotInCart { .. }));
    }

    #[test]
    fn test_wallet_accrual_total() {
        let mut ctx = plain_product("p1", 10000);
        ctx.rules = vec![PromotionRule::Seasonal {
            rate: DiscountRate::from_bps(1000),
            window: DateWindow::new(d(2026, 1, 1), d(2026, 12, 31)),
            wallet_eligible: true,
        }];

        let mut cart = Cart::new(today(), CheckoutProfile::known(false));
        cart.add_item(&ctx, 3, 100).unwrap();

        // 10% off → 90.00; accrual 2% → 1.80/unit, ×3
        assert_eq!(cart.total().cents(), 27000);
        assert_eq!(cart.wallet_accrual_total().cents(), 540);
    }

    #[test]
    fn test_preview_equals_committed_line() {
        // The preview function and the committed cart line are the same
        // computation, byte for byte.
        let mut ctx = plain_product("p1", 4599);
        ctx.senior_eligible = true;
        ctx.rules = vec![PromotionRule::Seasonal {
            rate: DiscountRate::from_bps(1200),
            window: DateWindow::new(d(2026, 1, 1), d(2026, 12, 31)),
            wallet_eligible: true,
        }];
        let profile = CheckoutProfile::known(true);

        let preview = price_cart_line(&ctx, today(), profile, 2);

        let mut cart = Cart::new(today(), profile);
        cart.add_item(&ctx, 2, 100).unwrap();
        let committed = &cart.lines()[0];

        assert_eq!(preview.unit_price_final_cents, committed.unit_price_final_cents);
        assert_eq!(preview.wallet_accrual_per_unit_cents, committed.wallet_accrual_per_unit_cents);
        assert_eq!(preview.discount_label, committed.discount_label);
    }
}
