//! Pre-submission business-rule validation
//!
//! Exhaustive: every rule runs and every violation is reported, so the
//! caller fixes the document in one round trip instead of one error at a
//! time. An empty report means the document is submission-eligible.
use super::document::{Document, DocumentModel};
use super::error::ValidationError;

/// NFC-e grand-total ceiling, in centavos (R$ 5.000,00).
pub const NFCE_MAX_TOTAL: u64 = 500_000;

/// Payments may differ from the grand total by at most one centavo.
pub const PAYMENT_TOLERANCE: u64 = 1;

pub fn validate(document: &Document) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    match &document.issuer {
        Some(issuer) if issuer.cnpj.len() == 14 => {}
        _ => errors.push(ValidationError::MissingIssuer),
    }

    if document.items.is_empty() {
        errors.push(ValidationError::NoItems);
    }
    for item in &document.items {
        if item.quantity == 0 {
            errors.push(ValidationError::InvalidItem {
                item: item.number,
                reason: "quantity must be positive".to_owned(),
            });
        }
        if item.unit_value == 0 {
            errors.push(ValidationError::InvalidItem {
                item: item.number,
                reason: "unit value must be positive".to_owned(),
            });
        }
        // the builder saturates on overflow, so a total that cannot be
        // reproduced with checked arithmetic is out of monetary range
        match u64::from(item.quantity).checked_mul(item.unit_value) {
            Some(total) if total == item.total => {}
            Some(_) => errors.push(ValidationError::InvalidItem {
                item: item.number,
                reason: "total does not match quantity times unit value".to_owned(),
            }),
            None => errors.push(ValidationError::InvalidItem {
                item: item.number,
                reason: "value exceeds the monetary range".to_owned(),
            }),
        }
    }
    // item numbering must be 1-based and contiguous
    for (idx, item) in document.items.iter().enumerate() {
        let expected = idx as u16 + 1;
        if item.number != expected {
            errors.push(ValidationError::InvalidItem {
                item: item.number,
                reason: format!("sequence broken, expected {expected}"),
            });
        }
    }

    if let Some(declared) = document.totals.declared_total {
        if declared.abs_diff(document.totals.total) > PAYMENT_TOLERANCE {
            errors.push(ValidationError::TotalMismatch {
                declared,
                computed: document.totals.total,
            });
        }
    }

    match document.model {
        DocumentModel::Nfce => {
            if document.payments.is_empty() {
                errors.push(ValidationError::MissingPayment);
            } else {
                let paid = payment_sum(document);
                if paid.abs_diff(document.totals.total) > PAYMENT_TOLERANCE {
                    errors.push(ValidationError::PaymentMismatch {
                        total: document.totals.total,
                        payments: paid,
                    });
                }
            }
            if document.totals.total > NFCE_MAX_TOTAL {
                errors.push(ValidationError::ValueCeilingExceeded {
                    total: document.totals.total,
                });
            }
        }
        DocumentModel::Nfe => {
            match &document.recipient {
                Some(r) if !r.document.is_empty() => {}
                _ => errors.push(ValidationError::MissingRecipient),
            }
            // NFe payments are optional; when present they still must add up
            if !document.payments.is_empty() {
                let paid = payment_sum(document);
                if paid.abs_diff(document.totals.total) > PAYMENT_TOLERANCE {
                    errors.push(ValidationError::PaymentMismatch {
                        total: document.totals.total,
                        payments: paid,
                    });
                }
            }
        }
    }

    errors
}

// Saturating so absurd payment amounts surface as a mismatch, never a panic.
fn payment_sum(document: &Document) -> u64 {
    document
        .payments
        .iter()
        .fold(0u64, |acc, p| acc.saturating_add(p.amount))
}
