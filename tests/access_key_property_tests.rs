//! Property-based tests for access key derivation
//!
//! Verifies the structural invariants of the 44-digit key across randomly
//! generated document identities: length, field placement, check digit and
//! determinism.

use fiscal_emission::document::{DocumentModel, TimeStamp, Uf};
use fiscal_emission::key::{self, MAX_NUMBER, MAX_RANDOM_CODE, MAX_SERIES};
use proptest::prelude::*;

// PROPERTY TEST STRATEGIES

fn uf_strategy() -> impl Strategy<Value = Uf> {
    prop_oneof![
        Just(Uf::Sp),
        Just(Uf::Rj),
        Just(Uf::Mg),
        Just(Uf::Rs),
        Just(Uf::Ba),
        Just(Uf::Df),
        Just(Uf::Am),
    ]
}

fn model_strategy() -> impl Strategy<Value = DocumentModel> {
    prop::bool::ANY.prop_map(|b| {
        if b {
            DocumentModel::Nfe
        } else {
            DocumentModel::Nfce
        }
    })
}

fn timestamp_strategy() -> impl Strategy<Value = TimeStamp<chrono::Utc>> {
    (2020i32..=2033, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| TimeStamp::new_with(y, m, d, 12, 0, 0))
}

proptest! {
    /// Every generated key is 44 digits and its last digit is the modulo-11
    /// check digit of the preceding 43.
    #[test]
    fn prop_key_is_44_digits_with_valid_check_digit(
        uf in uf_strategy(),
        issued in timestamp_strategy(),
        cnpj in "[0-9]{14}",
        model in model_strategy(),
        series in 0u16..=MAX_SERIES,
        number in 1u32..=MAX_NUMBER,
        random in 1u32..=MAX_RANDOM_CODE,
    ) {
        let access_key = key::generate(uf, &issued, &cnpj, model, series, number, random).unwrap();
        let digits = access_key.as_str();

        prop_assert_eq!(digits.len(), 44);
        prop_assert!(digits.bytes().all(|b| b.is_ascii_digit()));

        let dv: u8 = digits[43..].parse().unwrap();
        prop_assert_eq!(key::check_digit(&digits[..43]).unwrap(), dv);
    }

    /// Identity fields land at their fixed offsets: cUF(0..2) YYMM(2..6)
    /// CNPJ(6..20) mod(20..22) serie(22..25) nNF(25..34) tpEmis(34) cNF(35..43).
    #[test]
    fn prop_fields_are_embedded_at_fixed_offsets(
        uf in uf_strategy(),
        issued in timestamp_strategy(),
        cnpj in "[0-9]{14}",
        model in model_strategy(),
        series in 0u16..=MAX_SERIES,
        number in 1u32..=MAX_NUMBER,
        random in 1u32..=MAX_RANDOM_CODE,
    ) {
        let access_key = key::generate(uf, &issued, &cnpj, model, series, number, random).unwrap();
        let digits = access_key.as_str();

        let uf_code = format!("{:02}", uf.code());
        let yymm = issued.yymm();
        let model_code = format!("{:02}", model.code());
        let series_str = format!("{series:03}");
        let number_str = format!("{number:09}");
        let random_str = format!("{random:08}");
        prop_assert_eq!(&digits[0..2], uf_code.as_str());
        prop_assert_eq!(&digits[2..6], yymm.as_str());
        prop_assert_eq!(&digits[6..20], cnpj.as_str());
        prop_assert_eq!(&digits[20..22], model_code.as_str());
        prop_assert_eq!(&digits[22..25], series_str.as_str());
        prop_assert_eq!(&digits[25..34], number_str.as_str());
        prop_assert_eq!(&digits[34..35], "1");
        prop_assert_eq!(&digits[35..43], random_str.as_str());
    }

    /// The key is a pure function of its inputs: same identity and same
    /// random code reproduce the same key, a different random code changes it.
    #[test]
    fn prop_key_is_deterministic_up_to_the_random_code(
        uf in uf_strategy(),
        issued in timestamp_strategy(),
        cnpj in "[0-9]{14}",
        model in model_strategy(),
        series in 0u16..=MAX_SERIES,
        number in 1u32..=MAX_NUMBER,
        random in 1u32..MAX_RANDOM_CODE,
    ) {
        let a = key::generate(uf, &issued, &cnpj, model, series, number, random).unwrap();
        let b = key::generate(uf, &issued, &cnpj, model, series, number, random).unwrap();
        prop_assert_eq!(&a, &b);

        let c = key::generate(uf, &issued, &cnpj, model, series, number, random + 1).unwrap();
        prop_assert_ne!(&a, &c);
        // the identity prefix is untouched by the random code
        prop_assert_eq!(&a.as_str()[..34], &c.as_str()[..34]);
    }

    /// Malformed CNPJs are rejected whatever the rest of the identity is.
    #[test]
    fn prop_bad_cnpj_is_always_rejected(
        uf in uf_strategy(),
        issued in timestamp_strategy(),
        cnpj in "[0-9]{1,13}",
        model in model_strategy(),
        number in 1u32..=MAX_NUMBER,
    ) {
        prop_assert!(key::generate(uf, &issued, &cnpj, model, 1, number, 1).is_err());
    }
}
