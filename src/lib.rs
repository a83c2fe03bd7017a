//! NFe/NFC-e emission engine: document assembly, validation, access key and
//! number assignment, and the authorize/cancel/query lifecycle against a
//! pluggable tax authority.

pub mod authority;
pub mod builder;
pub mod config;
pub mod document;
pub mod error;
pub mod key;
pub mod lifecycle;
pub mod qrcode;
pub mod sequence;
pub mod service;
pub mod utils;
pub mod validate;

#[cfg(test)]
pub(crate) fn test_issuer() -> document::Issuer {
    document::Issuer {
        cnpj: "39.123.456/0001-95".to_owned(),
        name: "Padaria Boa Vista LTDA".to_owned(),
        trade_name: Some("Padaria Boa Vista".to_owned()),
        state_registration: "110042490114".to_owned(),
        tax_regime: document::TaxRegime::SimplesNacional,
        address: document::Address {
            street: "Rua Augusta".to_owned(),
            number: "1200".to_owned(),
            district: "Consolacao".to_owned(),
            municipality_code: 3550308,
            municipality: "Sao Paulo".to_owned(),
            uf: document::Uf::Sp,
            postal_code: "01304-001".to_owned(),
        },
    }
}
