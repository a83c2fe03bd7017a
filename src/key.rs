//! Access key derivation
//!
//! The 44-digit key is a pure function of the document identity fields plus
//! an 8-digit random code (cNF), closed by a modulo-11 check digit. The same
//! identity with the same random code always yields the same key, so the key
//! can be recomputed but never accidentally reissued: the random code is
//! drawn exactly once per document.
use super::document::{AccessKey, DocumentModel, TimeStamp, Uf};
use super::error::EmissionError;
use super::utils::only_digits;
use chrono::Utc;
use rand::Rng;

/// tpEmis for normal emission. Contingency modes are out of scope.
pub const EMISSION_NORMAL: u8 = 1;

pub const MAX_NUMBER: u32 = 999_999_999;
pub const MAX_SERIES: u16 = 999;
pub const MAX_RANDOM_CODE: u32 = 99_999_999;

/// Draw the cNF seed. Never zero; SEFAZ rejects cNF == 00000000.
pub fn random_code() -> u32 {
    rand::thread_rng().gen_range(1..=MAX_RANDOM_CODE)
}

/// Modulo-11 check digit over a digit string, weights 2..9 cycling from the
/// rightmost digit. Remainder below 2 maps to 0.
pub fn check_digit(digits: &str) -> Result<u8, EmissionError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EmissionError::InvalidIdentity(format!(
            "check digit input must be numeric, got '{digits}'"
        )));
    }

    let mut weight: u64 = 2;
    let mut sum: u64 = 0;
    for b in digits.bytes().rev() {
        sum += u64::from(b - b'0') * weight;
        weight = if weight == 9 { 2 } else { weight + 1 };
    }

    let remainder = sum % 11;
    Ok(if remainder < 2 {
        0
    } else {
        (11 - remainder) as u8
    })
}

/// Derive the access key for one document identity.
pub fn generate(
    uf: Uf,
    issued_at: &TimeStamp<Utc>,
    cnpj: &str,
    model: DocumentModel,
    series: u16,
    number: u32,
    random_code: u32,
) -> Result<AccessKey, EmissionError> {
    let cnpj = only_digits(cnpj);
    if cnpj.len() != 14 {
        return Err(EmissionError::InvalidIdentity(format!(
            "CNPJ must have exactly 14 digits, got {}",
            cnpj.len()
        )));
    }
    if series > MAX_SERIES {
        return Err(EmissionError::InvalidIdentity(format!(
            "series {series} exceeds the 3-digit field"
        )));
    }
    if number == 0 || number > MAX_NUMBER {
        return Err(EmissionError::InvalidIdentity(format!(
            "number {number} outside the 9-digit field"
        )));
    }
    if random_code > MAX_RANDOM_CODE {
        return Err(EmissionError::InvalidIdentity(format!(
            "random code {random_code} exceeds the 8-digit field"
        )));
    }

    // cUF(2) YYMM(4) CNPJ(14) mod(2) serie(3) nNF(9) tpEmis(1) cNF(8) = 43
    let body = format!(
        "{:02}{}{}{:02}{:03}{:09}{}{:08}",
        uf.code(),
        issued_at.yymm(),
        cnpj,
        model.code(),
        series,
        number,
        EMISSION_NORMAL,
        random_code,
    );
    debug_assert_eq!(body.len(), 43);

    let dv = check_digit(&body)?;
    Ok(AccessKey::from_digits(format!("{body}{dv}")))
}
