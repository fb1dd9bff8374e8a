//! # Repository Modules
//!
//! One repository per aggregate. Repositories own SQL; business rules stay
//! in farmapos-core. Functions suffixed `_tx` run on a caller-provided
//! connection so the checkout/reversal services can compose them into one
//! atomic transaction.

pub mod catalog;
pub mod inventory;
pub mod refund;
pub mod sale;
pub mod wallet;
