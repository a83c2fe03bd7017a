//! Document assembly
//!
//! Consuming builder that turns raw order data into a canonical [`Document`].
//! All derived monetary fields (item totals, tax lines, grand totals) are
//! computed here from quantities and unit values; a caller-declared grand
//! total is carried along only so the validator can cross-check it. No
//! number or key is assigned here, that happens after validation.
use super::config::EmissionConfig;
use super::document::{
    Document, DocumentModel, IcmsSn, Issuer, LineItem, Payment, Recipient, TaxLine, TimeStamp,
    Totals,
};
use super::utils::only_digits;
use chrono::Utc;

/// Raw line-item input as it arrives from the caller. Optional fields fall
/// back to the generic retail defaults the fiscal layout allows (NCM
/// 99999999, CFOP 5102, unit UN, CSOSN 102).
#[derive(Debug, Clone, Default)]
pub struct ItemInput {
    pub code: Option<String>,
    pub description: String,
    pub ncm: Option<String>,
    pub cfop: Option<String>,
    pub unit: Option<String>,
    pub quantity: u32,
    /// Centavos.
    pub unit_value: u64,
    pub origin: Option<u8>,
    pub csosn: Option<String>,
}

#[derive(Default)]
pub struct DocumentBuilder {
    model: Option<DocumentModel>,
    series: Option<u16>,
    issuer: Option<Issuer>,
    recipient: Option<Recipient>,
    items: Vec<ItemInput>,
    payments: Vec<Payment>,
    discount: u64,
    declared_total: Option<u64>,
    issued_at: Option<TimeStamp<Utc>>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_model(mut self, model: DocumentModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Override the configured series for this document.
    pub fn set_series(mut self, series: u16) -> Self {
        self.series = Some(series);
        self
    }

    pub fn set_issuer(mut self, mut issuer: Issuer) -> Self {
        issuer.cnpj = only_digits(&issuer.cnpj);
        issuer.address.postal_code = only_digits(&issuer.address.postal_code);
        self.issuer = Some(issuer);
        self
    }

    pub fn set_recipient(mut self, mut recipient: Recipient) -> Self {
        recipient.document = only_digits(&recipient.document);
        self.recipient = Some(recipient);
        self
    }

    pub fn add_item(mut self, item: ItemInput) -> Self {
        self.items.push(item);
        self
    }

    pub fn add_payment(mut self, payment: Payment) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn set_discount(mut self, cents: u64) -> Self {
        self.discount = cents;
        self
    }

    /// Grand total as the caller computed it. The validator compares this
    /// against the total derived from the items.
    pub fn set_declared_total(mut self, cents: u64) -> Self {
        self.declared_total = Some(cents);
        self
    }

    /// Pin the emission timestamp. Defaults to now; tests use this for
    /// reproducible keys.
    pub fn set_issued_at(mut self, at: TimeStamp<Utc>) -> Self {
        self.issued_at = Some(at);
        self
    }

    /// Assemble the document. Pure: derived fields are recomputed from the
    /// inputs, nothing is validated beyond structural assembly, and no
    /// number or key is allocated.
    pub fn build(self, config: &EmissionConfig) -> Document {
        let model = self.model.unwrap_or(DocumentModel::Nfce);
        let series = self.series.unwrap_or_else(|| config.series_for(model));

        let items: Vec<LineItem> = self
            .items
            .into_iter()
            .enumerate()
            .map(|(idx, input)| build_item(idx as u16 + 1, input))
            .collect();

        // saturating sums: an out-of-range total can never panic here, the
        // validator reports it as a rule violation instead
        let products: u64 = items.iter().fold(0u64, |acc, i| acc.saturating_add(i.total));
        let pis: u64 = items.iter().map(|i| i.pis.value).sum();
        let cofins: u64 = items.iter().map(|i| i.cofins.value).sum();
        let totals = Totals {
            products,
            discount: self.discount,
            total: products.saturating_sub(self.discount),
            // Simples Nacional: no ICMS highlighted on the document itself
            icms_base: 0,
            icms: 0,
            pis,
            cofins,
            declared_total: self.declared_total,
        };

        Document {
            model,
            series,
            number: None,
            access_key: None,
            issuer: self.issuer,
            recipient: self.recipient,
            items,
            totals,
            payments: self.payments,
            issued_at: self.issued_at.unwrap_or_else(TimeStamp::now),
            environment: config.environment,
        }
    }
}

fn build_item(number: u16, input: ItemInput) -> LineItem {
    let total = u64::from(input.quantity).saturating_mul(input.unit_value);
    LineItem {
        number,
        code: input
            .code
            .unwrap_or_else(|| format!("{number:06}")),
        description: input.description,
        ncm: input.ncm.unwrap_or_else(|| "99999999".to_owned()),
        cfop: input.cfop.unwrap_or_else(|| "5102".to_owned()),
        unit: input.unit.unwrap_or_else(|| "UN".to_owned()),
        quantity: input.quantity,
        unit_value: input.unit_value,
        total,
        icms: IcmsSn {
            origin: input.origin.unwrap_or(0),
            csosn: input.csosn.unwrap_or_else(|| "102".to_owned()),
        },
        // CSOSN 102 carries no PIS/COFINS credit, bases stay zero
        pis: TaxLine::compute("01", 0, 0),
        cofins: TaxLine::compute("01", 0, 0),
    }
}
