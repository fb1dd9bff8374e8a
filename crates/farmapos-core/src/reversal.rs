//! # Reversal Computation
//!
//! Computes what a return or cancellation gives back, proportionally to how
//! the original sale was paid. Pure: the ledger clamp and the actual writes
//! happen in the persistence layer, this module only does the arithmetic.
//!
//! ## Refund Split
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Sale: total 100.00, paid 60.00 wallet + 40.00 cash                 │
//! │  Return: one line worth 20.00                                       │
//! │                                                                     │
//! │  wallet share = 20.00 × 60/100 = 12.00  → credited back to wallet   │
//! │  cash share   = 20.00 − 12.00  =  8.00  → paid from the drawer      │
//! │                                                                     │
//! │  Separately, the 2% credit ACCRUED on the returned units is taken   │
//! │  back (a ledger debit, clamped to the current balance).             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Free Units on Return
//! Returning paid units that earned free units retracts the share of free
//! units no longer covered: the retained free count is recomputed as
//! `floor((sold − returned) / (N−1))` and the difference comes back to
//! stock. Free lines are never refundable on their own.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::free_units;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{ReturnedLine, SaleTransaction, TenderMethod};

// =============================================================================
// Reversal Computation
// =============================================================================

/// Free units a return takes back out of the customer's hands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FreeUnitRetraction {
    pub product_id: String,
    pub quantity: u32,
}

/// The computed effects of a return or cancellation, before commit.
///
/// `wallet_reversal_requested_cents` is the REQUESTED accrual reversal; the
/// ledger clamps it to the customer's balance at commit time, and the
/// clamped amount is what ends up on the ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReversalComputation {
    pub refund_total_cents: i64,
    pub refund_wallet_cents: i64,
    pub refund_cash_cents: i64,
    pub wallet_reversal_requested_cents: i64,
    pub returned_lines: Vec<ReturnedLine>,
    pub retracted_free_units: Vec<FreeUnitRetraction>,
}

impl ReversalComputation {
    /// Whether committing this reversal touches the wallet at all. When it
    /// does, a customer record is a hard precondition.
    pub fn has_wallet_component(&self) -> bool {
        self.refund_wallet_cents > 0 || self.wallet_reversal_requested_cents > 0
    }

    /// Returns the refund total as Money.
    #[inline]
    pub fn refund_total(&self) -> Money {
        Money::from_cents(self.refund_total_cents)
    }
}

// =============================================================================
// Return of Selected Lines
// =============================================================================

/// Computes the reversal for a partial return of `returned` lines.
///
/// Free lines cannot be selected; their retraction is derived from the paid
/// lines. Every returned quantity must not exceed what was sold.
pub fn compute_reversal(
    sale: &SaleTransaction,
    returned: &[ReturnedLine],
) -> CoreResult<ReversalComputation> {
    if returned.is_empty() {
        return Err(CoreError::Validation(ValidationError::Required {
            field: "returned lines".to_string(),
        }));
    }

    let mut seen = HashSet::new();
    let mut refund_total = Money::zero();
    let mut reversal_requested = Money::zero();
    let mut retractions = Vec::new();

    for ret in returned {
        if ret.quantity == 0 {
            return Err(CoreError::Validation(ValidationError::MustBePositive {
                field: "returned quantity".to_string(),
            }));
        }
        if !seen.insert(ret.product_id.as_str()) {
            return Err(CoreError::LineNotReturnable {
                product_id: ret.product_id.clone(),
                reason: "listed more than once".to_string(),
            });
        }

        let Some(line) = sale.paid_line(&ret.product_id) else {
            return Err(CoreError::LineNotReturnable {
                product_id: ret.product_id.clone(),
                reason: "no paid line on this sale (free units are not individually refundable)"
                    .to_string(),
            });
        };

        if ret.quantity > line.quantity {
            return Err(CoreError::ReturnExceedsSold {
                product_id: ret.product_id.clone(),
                sold: line.quantity,
                returned: ret.quantity,
            });
        }

        refund_total += line.unit_price_final().multiply_quantity(ret.quantity as i64);

        // The returned share of the line's accrued wallet credit.
        reversal_requested += Money::from_cents(line.wallet_accrual_per_unit_cents)
            .multiply_quantity(ret.quantity as i64);

        // Recompute how many free units the remaining paid quantity still
        // covers; the rest comes back.
        if let (Some(n), Some(free_line)) =
            (line.required_count_for_free, sale.free_line(&ret.product_id))
        {
            let retained = free_units(line.quantity - ret.quantity, n);
            let retract = free_line.quantity.saturating_sub(retained);
            if retract > 0 {
                retractions.push(FreeUnitRetraction {
                    product_id: ret.product_id.clone(),
                    quantity: retract,
                });
            }
        }
    }

    let wallet_at_sale = sale.tender_amount(TenderMethod::Wallet);
    let refund_wallet = refund_total.prorate(wallet_at_sale, sale.total());
    let refund_cash = refund_total - refund_wallet;

    Ok(ReversalComputation {
        refund_total_cents: refund_total.cents(),
        refund_wallet_cents: refund_wallet.cents(),
        refund_cash_cents: refund_cash.cents(),
        wallet_reversal_requested_cents: reversal_requested.cents(),
        returned_lines: returned.to_vec(),
        retracted_free_units: retractions,
    })
}

// =============================================================================
// Cancellation of a Whole Sale
// =============================================================================

/// Computes the reversal that cancels the entire sale.
///
/// A pending order that never took tenders refunds nothing (no money was
/// taken), but still restocks everything and reverses any accrual.
pub fn compute_cancellation(sale: &SaleTransaction) -> CoreResult<ReversalComputation> {
    let all_paid: Vec<ReturnedLine> = sale
        .lines
        .iter()
        .filter(|l| !l.is_free_unit)
        .map(|l| ReturnedLine { product_id: l.product_id.clone(), quantity: l.quantity })
        .collect();

    let mut computation = compute_reversal(sale, &all_paid)?;

    if sale.tenders.is_empty() {
        computation.refund_total_cents = 0;
        computation.refund_wallet_cents = 0;
        computation.refund_cash_cents = 0;
    }

    Ok(computation)
}

// =============================================================================
// Unit Tests
// =============================================================================
