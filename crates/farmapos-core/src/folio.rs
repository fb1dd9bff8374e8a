//! # Folio Generation
//!
//! Human-readable transaction identifiers: `{prefix}{YYYYMMDD}-{6 alnum}`.
//! The folio is printed on the ticket and quoted by customers for returns;
//! the UUID `id` stays the relational key.
//!
//! Uniqueness is per transaction type (the prefix), enforced by a UNIQUE
//! index at the persistence layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Which transaction family a folio belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FolioKind {
    /// Venta.
    Sale,
    /// Devolución.
    Return,
    /// Cancelación.
    Cancellation,
}

impl FolioKind {
    /// Single-letter folio prefix.
    pub const fn prefix(&self) -> &'static str {
        match self {
            FolioKind::Sale => "V",
            FolioKind::Return => "D",
            FolioKind::Cancellation => "C",
        }
    }
}

/// Generates a folio like `V20260303-4F9A1C`.
///
/// The suffix is drawn from a fresh UUID v4, which keeps folio generation
/// coordination-free across terminals; the UNIQUE index catches the
/// astronomically unlikely collision.
pub fn generate_folio(kind: FolioKind, date: NaiveDate) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase();
    format!("{}{}-{}", kind.prefix(), date.format("%Y%m%d"), suffix)
}

/// Checks the `{prefix}{YYYYMMDD}-{6 alnum}` shape.
pub fn is_well_formed(folio: &str) -> bool {
    let Some((head, suffix)) = folio.split_once('-') else {
        return false;
    };
    if head.len() != 9 || suffix.len() != 6 {
        return false;
    }
    let (prefix, date_part) = head.split_at(1);
    matches!(prefix, "V" | "D" | "C")
        && date_part.chars().all(|c| c.is_ascii_digit())
        && suffix.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
    }

    #[test]
    fn test_generated_folio_shape() {
        for kind in [FolioKind::Sale, FolioKind::Return, FolioKind::Cancellation] {
            let folio = generate_folio(kind, date());
            assert!(is_well_formed(&folio), "malformed folio: {folio}");
            assert!(folio.starts_with(kind.prefix()));
            assert!(folio.contains("20260303"));
        }
    }

    #[test]
    fn test_generated_folios_differ() {
        let a = generate_folio(FolioKind::Sale, date());
        let b = generate_folio(FolioKind::Sale, date());
        assert_ne!(a, b);
    }

    #[test]
    fn test_well_formedness() {
        assert!(is_well_formed("V20260303-A1B2C3"));
        assert!(is_well_formed("D20260303-000000"));
        assert!(!is_well_formed("X20260303-A1B2C3")); // unknown prefix
        assert!(!is_well_formed("V2026033-A1B2C3")); // short date
        assert!(!is_well_formed("V20260303-A1B2")); // short suffix
        assert!(!is_well_formed("V20260303A1B2C3")); // no dash
    }
}
