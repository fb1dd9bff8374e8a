//! # Payment Settlement
//!
//! Splits a sale total across cash / card / transfer / wallet tenders,
//! validates the split, and computes change. Pure given its inputs; every
//! rejection happens before any mutation anywhere.
//!
//! ## Check Order (fixed)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  settle_payment(total, proposal, wallet_balance)                    │
//! │                                                                     │
//! │  1. any tender negative?            → NegativeTender                │
//! │  2. wallet > wallet balance?        → InsufficientWalletBalance     │
//! │  3. card+transfer+wallet > total?   → DigitalExceedsTotal           │
//! │  4. digital == total AND cash > 0?  → CashOverpayOnCoveredTotal     │
//! │  5. everything < total?             → InsufficientPayment           │
//! │  6. change = cash − (total − digital)                               │
//! │     recorded cash = cash − change   (net cash retained)             │
//! │                                                                     │
//! │  Only cash can produce change. Digital tenders must fit exactly     │
//! │  under the total, and cash on an already-covered total is operator  │
//! │  error, rejected outright.                                          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, PaymentMismatch};
use crate::money::Money;
use crate::types::{Tender, TenderMethod};

// =============================================================================
// Tender Proposal
// =============================================================================

/// The operator's proposed split, as entered at the drawer. Amounts in
/// centavos; absent methods are zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TenderProposal {
    pub cash_cents: i64,
    pub card_cents: i64,
    pub transfer_cents: i64,
    pub wallet_cents: i64,
}

impl TenderProposal {
    /// All-cash proposal.
    pub fn cash(amount: Money) -> Self {
        TenderProposal { cash_cents: amount.cents(), ..Default::default() }
    }

    fn digital(&self) -> Money {
        Money::from_cents(self.card_cents + self.transfer_cents + self.wallet_cents)
    }
}

// =============================================================================
// Settlement Result
// =============================================================================

/// A validated, normalized settlement: one tender per method actually used,
/// cash recorded NET of change (what stays in the drawer, not what the
/// customer handed over).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub tenders: Vec<Tender>,
    pub change_cents: i64,
}

impl Settlement {
    /// Returns the change as Money.
    #[inline]
    pub fn change(&self) -> Money {
        Money::from_cents(self.change_cents)
    }

    /// Amount recorded for a tender method (0 if unused).
    pub fn tender_amount(&self, method: TenderMethod) -> Money {
        self.tenders
            .iter()
            .find(|t| t.method == method)
            .map(Tender::amount)
            .unwrap_or_else(Money::zero)
    }
}

// =============================================================================
// Settlement
// =============================================================================

/// Validates a tender proposal against the sale total and the customer's
/// wallet balance. See the module docs for the fixed check order.
pub fn settle_payment(
    total: Money,
    proposal: &TenderProposal,
    wallet_balance: Money,
) -> CoreResult<Settlement> {
    if proposal.cash_cents < 0
        || proposal.card_cents < 0
        || proposal.transfer_cents < 0
        || proposal.wallet_cents < 0
    {
        return Err(PaymentMismatch::NegativeTender.into());
    }

    if proposal.wallet_cents > wallet_balance.cents() {
        return Err(CoreError::InsufficientWalletBalance {
            requested_cents: proposal.wallet_cents,
            balance_cents: wallet_balance.cents(),
        });
    }

    let digital = proposal.digital();
    if digital > total {
        return Err(PaymentMismatch::DigitalExceedsTotal {
            digital_cents: digital.cents(),
            total_cents: total.cents(),
        }
        .into());
    }

    if digital == total && proposal.cash_cents > 0 {
        return Err(PaymentMismatch::CashOverpayOnCoveredTotal {
            cash_cents: proposal.cash_cents,
        }
        .into());
    }

    let offered = Money::from_cents(proposal.cash_cents) + digital;
    if offered < total {
        return Err(PaymentMismatch::InsufficientPayment {
            offered_cents: offered.cents(),
            total_cents: total.cents(),
        }
        .into());
    }

    let cash_due = total - digital;
    let change = Money::from_cents(proposal.cash_cents) - cash_due;

    let mut tenders = Vec::new();
    if cash_due.is_positive() {
        tenders.push(Tender::new(TenderMethod::Cash, cash_due));
    }
    if proposal.card_cents > 0 {
        tenders.push(Tender::new(TenderMethod::Card, Money::from_cents(proposal.card_cents)));
    }
    if proposal.transfer_cents > 0 {
        tenders.push(Tender::new(TenderMethod::Transfer, Money::from_cents(proposal.transfer_cents)));
    }
    if proposal.wallet_cents > 0 {
        tenders.push(Tender::new(TenderMethod::Wallet, Money::from_cents(proposal.wallet_cents)));
    }

    Ok(Settlement { tenders, change_cents: change.cents() })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn m(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    #[test]
    fn test_exact_cash_no_change() {
        let s = settle_payment(m(10000), &TenderProposal::cash(m(10000)), Money::zero()).unwrap();
        assert_eq!(s.change_cents, 0);
        assert_eq!(s.tender_amount(TenderMethod::Cash).cents(), 10000);
    }

    #[test]
    fn test_cash_overpay_produces_change_and_net_cash() {
        // total 100, cash 120 → accepted, change 20, cash recorded net
        let s = settle_payment(m(10000), &TenderProposal::cash(m(12000)), Money::zero()).unwrap();
        assert_eq!(s.change_cents, 2000);
        assert_eq!(s.tender_amount(TenderMethod::Cash).cents(), 10000);
        let recorded: i64 = s.tenders.iter().map(|t| t.amount_cents).sum();
        assert_eq!(recorded, 10000);
    }

    #[test]
    fn test_cash_on_covered_total_rejected() {
        // total 100, card 100, cash 5 → deliberate strictness
        let proposal = TenderProposal { cash_cents: 500, card_cents: 10000, ..Default::default() };
        let err = settle_payment(m(10000), &proposal, Money::zero()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Payment(PaymentMismatch::CashOverpayOnCoveredTotal { cash_cents: 500 })
        ));
    }

    #[test]
    fn test_digital_exceeds_total_rejected() {
        let proposal = TenderProposal { card_cents: 8000, transfer_cents: 3000, ..Default::default() };
        let err = settle_payment(m(10000), &proposal, Money::zero()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Payment(PaymentMismatch::DigitalExceedsTotal { digital_cents: 11000, .. })
        ));
    }

    #[test]
    fn test_insufficient_payment_rejected() {
        let proposal = TenderProposal { cash_cents: 4000, card_cents: 5000, ..Default::default() };
        let err = settle_payment(m(10000), &proposal, Money::zero()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Payment(PaymentMismatch::InsufficientPayment { offered_cents: 9000, .. })
        ));
    }

    #[test]
    fn test_wallet_over_balance_rejected_first() {
        // Wallet check precedes the digital-exceeds check.
        let proposal = TenderProposal { wallet_cents: 20000, ..Default::default() };
        let err = settle_payment(m(10000), &proposal, m(5000)).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientWalletBalance { .. }));
    }

    #[test]
    fn test_mixed_split_with_change() {
        // total 100: wallet 30, card 20, cash 60 → cash due 50, change 10
        let proposal = TenderProposal {
            cash_cents: 6000,
            card_cents: 2000,
            wallet_cents: 3000,
            ..Default::default()
        };
        let s = settle_payment(m(10000), &proposal, m(3000)).unwrap();
        assert_eq!(s.change_cents, 1000);
        assert_eq!(s.tender_amount(TenderMethod::Cash).cents(), 5000);
        assert_eq!(s.tender_amount(TenderMethod::Wallet).cents(), 3000);
        let recorded: i64 = s.tenders.iter().map(|t| t.amount_cents).sum();
        assert_eq!(recorded, 10000);
    }

    #[test]
    fn test_exact_digital_split() {
        let proposal = TenderProposal {
            card_cents: 7000,
            transfer_cents: 2000,
            wallet_cents: 1000,
            ..Default::default()
        };
        let s = settle_payment(m(10000), &proposal, m(1000)).unwrap();
        assert_eq!(s.change_cents, 0);
        assert_eq!(s.tenders.len(), 3);
        assert_eq!(s.tender_amount(TenderMethod::Cash).cents(), 0);
    }

    #[test]
    fn test_negative_tender_rejected() {
        let proposal = TenderProposal { cash_cents: -1, ..Default::default() };
        let err = settle_payment(m(10000), &proposal, Money::zero()).unwrap_err();
        assert!(matches!(err, CoreError::Payment(PaymentMismatch::NegativeTender)));
    }

    #[test]
    fn test_tender_sum_never_exceeds_total() {
        // Recorded tenders always sum exactly to the total.
        for (cash, card, wallet) in [(10000, 0, 0), (5000, 5000, 0), (9900, 0, 100), (12345, 0, 0)] {
            let proposal = TenderProposal {
                cash_cents: cash,
                card_cents: card,
                wallet_cents: wallet,
                ..Default::default()
            };
            if let Ok(s) = settle_payment(m(10000), &proposal, m(100000)) {
                let recorded: i64 = s.tenders.iter().map(|t| t.amount_cents).sum();
                assert_eq!(recorded, 10000);
            }
        }
    }
}
