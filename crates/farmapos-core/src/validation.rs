//! # Validation Module
//!
//! Boundary validators: promotion configuration arrives from the catalog as
//! loosely-shaped rows, operator input arrives from the UI, and both are
//! checked HERE before business logic runs. Past this boundary the engine
//! pattern-matches validated types and never probes optional fields.

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_PROMOTION_BPS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Promotion Rule Validators
// =============================================================================

/// Validates a promotion percentage in basis points (0..=10000).
pub fn validate_promotion_bps(bps: u32) -> ValidationResult<()> {
    if bps > MAX_PROMOTION_BPS {
        return Err(ValidationError::PercentageOutOfRange { bps: bps as i64 });
    }
    Ok(())
}

/// Validates that a promotion window is not inverted.
pub fn validate_date_window(start: NaiveDate, end: NaiveDate) -> ValidationResult<()> {
    if start > end {
        return Err(ValidationError::InvertedWindow {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(())
}

/// Validates the N of an N-for-(N-1) rule.
pub fn validate_required_count(required_count: u32) -> ValidationResult<()> {
    if required_count < 2 {
        return Err(ValidationError::RequiredCountTooSmall { required_count });
    }
    Ok(())
}

// =============================================================================
// Operator Input Validators
// =============================================================================

/// Validates a cart quantity.
pub fn validate_quantity(qty: u32) -> ValidationResult<()> {
    if qty == 0 {
        return Err(ValidationError::MustBePositive { field: "quantity".to_string() });
    }
    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY as i64,
        });
    }
    Ok(())
}

/// Validates a price or tender amount in centavos (non-negative).
pub fn validate_amount_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a UUID string.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required { field: "id".to_string() });
    }
    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;
    Ok(())
}

/// Validates a folio against the `{prefix}{YYYYMMDD}-{6 alnum}` shape.
pub fn validate_folio(folio: &str) -> ValidationResult<()> {
    if !crate::folio::is_well_formed(folio) {
        return Err(ValidationError::InvalidFormat {
            field: "folio".to_string(),
            reason: "expected {prefix}{YYYYMMDD}-{6 alnum}".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
