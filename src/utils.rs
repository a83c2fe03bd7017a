//! Small formatting helpers shared across the crate

/// Strip everything but ASCII digits. CNPJ/CPF/CEP arrive punctuated
/// ("12.345.678/0001-95") and the fiscal layout wants bare digits.
pub fn only_digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Render centavos as a decimal string with two places ("5000.00").
pub fn format_cents(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}
