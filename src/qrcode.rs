//! NFC-e consumer QR code
//!
//! Authorized NFC-e documents carry a QR code pointing at the state's public
//! consultation page, with the access key and a short digest appended. This
//! builds the URL query string; actual image rendering is the caller's
//! problem.
use super::document::{AccessKey, Document, Environment, Uf};
use super::utils::format_cents;

/// Public consultation endpoint per UF and environment. States without a
/// known endpoint fall back to the SP one, as the original service did.
pub fn consultation_url(uf: Uf, environment: Environment) -> &'static str {
    match (uf, environment) {
        (Uf::Sp, Environment::Production) => {
            "https://www.nfce.fazenda.sp.gov.br/NFCeConsultaPublica"
        }
        (Uf::Sp, Environment::Staging) => {
            "https://homologacao.nfce.fazenda.sp.gov.br/NFCeConsultaPublica"
        }
        (_, Environment::Production) => "https://www.nfce.fazenda.sp.gov.br/NFCeConsultaPublica",
        (_, Environment::Staging) => {
            "https://homologacao.nfce.fazenda.sp.gov.br/NFCeConsultaPublica"
        }
    }
}

/// Assemble the QR code payload for an authorized NFC-e.
pub fn nfce_qr_code(document: &Document, key: &AccessKey, uf: Uf) -> String {
    let dig_val = &sha256::digest(key.as_str())[..8];
    let c_dest = document
        .recipient
        .as_ref()
        .map(|r| r.document.as_str())
        .unwrap_or("");

    let params: Vec<(&str, String)> = vec![
        ("chNFe", key.to_string()),
        ("nVersao", "100".to_owned()),
        ("tpAmb", document.environment.code().to_string()),
        ("cDest", c_dest.to_owned()),
        ("dhEmi", document.issued_at.iso8601()),
        ("vNF", format_cents(document.totals.total)),
        ("vICMS", format_cents(document.totals.icms)),
        ("digVal", dig_val.to_owned()),
        ("cIdToken", "000001".to_owned()),
    ];

    let query: Vec<String> = params
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect();

    format!(
        "{}?{}",
        consultation_url(uf, document.environment),
        query.join("&")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{DocumentBuilder, ItemInput};
    use crate::config::EmissionConfig;
    use crate::document::{DocumentModel, Payment, PaymentType};

    #[test]
    fn qr_code_carries_key_and_total() {
        let config = EmissionConfig::default();
        let doc = DocumentBuilder::new()
            .set_model(DocumentModel::Nfce)
            .add_item(ItemInput {
                description: "Agua mineral".to_owned(),
                quantity: 2,
                unit_value: 350,
                ..ItemInput::default()
            })
            .add_payment(Payment::new(PaymentType::Cash, 700))
            .build(&config);

        let key = AccessKey::parse(&"7".repeat(44)).unwrap();
        let url = nfce_qr_code(&doc, &key, Uf::Sp);

        assert!(url.starts_with("https://homologacao.nfce.fazenda.sp.gov.br"));
        assert!(url.contains(&format!("chNFe={key}")));
        assert!(url.contains("vNF=7.00"));
        assert!(url.contains("tpAmb=2"));
        // unidentified consumer: cDest is omitted entirely
        assert!(!url.contains("cDest="));
    }
}
