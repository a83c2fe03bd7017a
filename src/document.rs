//! Core fiscal document data model
use super::error::EmissionError;
use chrono::{DateTime, TimeZone, Utc};

/// Brazilian federative units with their IBGE numeric codes.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uf {
    #[n(0)]
    Ac,
    #[n(1)]
    Al,
    #[n(2)]
    Ap,
    #[n(3)]
    Am,
    #[n(4)]
    Ba,
    #[n(5)]
    Ce,
    #[n(6)]
    Df,
    #[n(7)]
    Es,
    #[n(8)]
    Go,
    #[n(9)]
    Ma,
    #[n(10)]
    Mt,
    #[n(11)]
    Ms,
    #[n(12)]
    Mg,
    #[n(13)]
    Pa,
    #[n(14)]
    Pb,
    #[n(15)]
    Pr,
    #[n(16)]
    Pe,
    #[n(17)]
    Pi,
    #[n(18)]
    Rj,
    #[n(19)]
    Rn,
    #[n(20)]
    Rs,
    #[n(21)]
    Ro,
    #[n(22)]
    Rr,
    #[n(23)]
    Sc,
    #[n(24)]
    Sp,
    #[n(25)]
    Se,
    #[n(26)]
    To,
}

impl Uf {
    /// Two-digit IBGE code, the first field of the access key.
    pub fn code(&self) -> u8 {
        match self {
            Uf::Ac => 12,
            Uf::Al => 27,
            Uf::Ap => 16,
            Uf::Am => 13,
            Uf::Ba => 29,
            Uf::Ce => 23,
            Uf::Df => 53,
            Uf::Es => 32,
            Uf::Go => 52,
            Uf::Ma => 21,
            Uf::Mt => 51,
            Uf::Ms => 50,
            Uf::Mg => 31,
            Uf::Pa => 15,
            Uf::Pb => 25,
            Uf::Pr => 41,
            Uf::Pe => 26,
            Uf::Pi => 22,
            Uf::Rj => 33,
            Uf::Rn => 24,
            Uf::Rs => 43,
            Uf::Ro => 11,
            Uf::Rr => 14,
            Uf::Sc => 42,
            Uf::Sp => 35,
            Uf::Se => 28,
            Uf::To => 17,
        }
    }

    pub fn sigla(&self) -> &'static str {
        match self {
            Uf::Ac => "AC",
            Uf::Al => "AL",
            Uf::Ap => "AP",
            Uf::Am => "AM",
            Uf::Ba => "BA",
            Uf::Ce => "CE",
            Uf::Df => "DF",
            Uf::Es => "ES",
            Uf::Go => "GO",
            Uf::Ma => "MA",
            Uf::Mt => "MT",
            Uf::Ms => "MS",
            Uf::Mg => "MG",
            Uf::Pa => "PA",
            Uf::Pb => "PB",
            Uf::Pr => "PR",
            Uf::Pe => "PE",
            Uf::Pi => "PI",
            Uf::Rj => "RJ",
            Uf::Rn => "RN",
            Uf::Rs => "RS",
            Uf::Ro => "RO",
            Uf::Rr => "RR",
            Uf::Sc => "SC",
            Uf::Sp => "SP",
            Uf::Se => "SE",
            Uf::To => "TO",
        }
    }
}

impl std::str::FromStr for Uf {
    type Err = EmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uf = match s.to_ascii_uppercase().as_str() {
            "AC" => Uf::Ac,
            "AL" => Uf::Al,
            "AP" => Uf::Ap,
            "AM" => Uf::Am,
            "BA" => Uf::Ba,
            "CE" => Uf::Ce,
            "DF" => Uf::Df,
            "ES" => Uf::Es,
            "GO" => Uf::Go,
            "MA" => Uf::Ma,
            "MT" => Uf::Mt,
            "MS" => Uf::Ms,
            "MG" => Uf::Mg,
            "PA" => Uf::Pa,
            "PB" => Uf::Pb,
            "PR" => Uf::Pr,
            "PE" => Uf::Pe,
            "PI" => Uf::Pi,
            "RJ" => Uf::Rj,
            "RN" => Uf::Rn,
            "RS" => Uf::Rs,
            "RO" => Uf::Ro,
            "RR" => Uf::Rr,
            "SC" => Uf::Sc,
            "SP" => Uf::Sp,
            "SE" => Uf::Se,
            "TO" => Uf::To,
            other => {
                return Err(EmissionError::InvalidIdentity(format!(
                    "unrecognized UF '{other}'"
                )));
            }
        };
        Ok(uf)
    }
}

impl std::fmt::Display for Uf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sigla())
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentModel {
    /// Standard electronic invoice, model 55.
    #[n(0)]
    Nfe,
    /// Consumer-facing invoice, model 65. Capped total, payment required.
    #[n(1)]
    Nfce,
}

impl DocumentModel {
    pub fn code(&self) -> u8 {
        match self {
            DocumentModel::Nfe => 55,
            DocumentModel::Nfce => 65,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    #[n(0)]
    Production,
    #[n(1)]
    Staging,
}

impl Environment {
    /// SEFAZ tpAmb code: 1 production, 2 homologation.
    pub fn code(&self) -> u8 {
        match self {
            Environment::Production => 1,
            Environment::Staging => 2,
        }
    }
}

/// CRT, the issuer's tax regime code.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxRegime {
    #[n(0)]
    SimplesNacional,
    #[n(1)]
    SimplesExcesso,
    #[n(2)]
    RegimeNormal,
}

impl TaxRegime {
    pub fn code(&self) -> u8 {
        match self {
            TaxRegime::SimplesNacional => 1,
            TaxRegime::SimplesExcesso => 2,
            TaxRegime::RegimeNormal => 3,
        }
    }
}

/// tPag payment type codes from the fiscal payment table.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentType {
    #[n(0)]
    Cash,
    #[n(1)]
    Check,
    #[n(2)]
    CreditCard,
    #[n(3)]
    DebitCard,
    #[n(4)]
    StoreCredit,
    #[n(5)]
    Voucher,
    #[n(6)]
    Boleto,
    #[n(7)]
    Other,
}

impl PaymentType {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentType::Cash => "01",
            PaymentType::Check => "02",
            PaymentType::CreditCard => "03",
            PaymentType::DebitCard => "04",
            PaymentType::StoreCredit => "05",
            PaymentType::Voucher => "10",
            PaymentType::Boleto => "15",
            PaymentType::Other => "99",
        }
    }

    pub fn is_card(&self) -> bool {
        matches!(self, PaymentType::CreditCard | PaymentType::DebitCard)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    #[n(0)]
    pub brand: String,
    #[n(1)]
    pub authorization: Option<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    #[n(0)]
    pub kind: PaymentType,
    /// Amount in centavos.
    #[n(1)]
    pub amount: u64,
    #[n(2)]
    pub card: Option<CardInfo>,
}

impl Payment {
    pub fn new(kind: PaymentType, amount: u64) -> Self {
        Self {
            kind,
            amount,
            card: None,
        }
    }

    pub fn with_card(kind: PaymentType, amount: u64, brand: &str, authorization: Option<&str>) -> Self {
        Self {
            kind,
            amount,
            card: Some(CardInfo {
                brand: brand.to_owned(),
                authorization: authorization.map(str::to_owned),
            }),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Address {
    #[n(0)]
    pub street: String,
    #[n(1)]
    pub number: String,
    #[n(2)]
    pub district: String,
    #[n(3)]
    pub municipality_code: u32,
    #[n(4)]
    pub municipality: String,
    #[n(5)]
    pub uf: Uf,
    #[n(6)]
    pub postal_code: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Issuer {
    /// 14 digits, stripped of punctuation at build time.
    #[n(0)]
    pub cnpj: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub trade_name: Option<String>,
    #[n(3)]
    pub state_registration: String,
    #[n(4)]
    pub tax_regime: TaxRegime,
    #[n(5)]
    pub address: Address,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// CPF (11 digits) or CNPJ (14 digits).
    #[n(0)]
    pub document: String,
    #[n(1)]
    pub name: String,
}

/// One computed tax line (PIS or COFINS). Rate is in basis points.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct TaxLine {
    #[n(0)]
    pub cst: String,
    #[n(1)]
    pub base: u64,
    #[n(2)]
    pub rate_bp: u32,
    #[n(3)]
    pub value: u64,
}

impl TaxLine {
    /// Derive the tax value from base and rate. Pure; rounds down.
    pub fn compute(cst: &str, base: u64, rate_bp: u32) -> Self {
        Self {
            cst: cst.to_owned(),
            base,
            rate_bp,
            value: base * u64::from(rate_bp) / 10_000,
        }
    }
}

/// ICMS under Simples Nacional: origin code plus CSOSN situation code.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct IcmsSn {
    #[n(0)]
    pub origin: u8,
    #[n(1)]
    pub csosn: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    /// 1-based, contiguous across the document.
    #[n(0)]
    pub number: u16,
    #[n(1)]
    pub code: String,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub ncm: String,
    #[n(4)]
    pub cfop: String,
    #[n(5)]
    pub unit: String,
    #[n(6)]
    pub quantity: u32,
    /// Unit value in centavos.
    #[n(7)]
    pub unit_value: u64,
    /// quantity * unit_value, computed at build time.
    #[n(8)]
    pub total: u64,
    #[n(9)]
    pub icms: IcmsSn,
    #[n(10)]
    pub pis: TaxLine,
    #[n(11)]
    pub cofins: TaxLine,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Totals {
    #[n(0)]
    pub products: u64,
    #[n(1)]
    pub discount: u64,
    /// Grand total: products - discount.
    #[n(2)]
    pub total: u64,
    #[n(3)]
    pub icms_base: u64,
    #[n(4)]
    pub icms: u64,
    #[n(5)]
    pub pis: u64,
    #[n(6)]
    pub cofins: u64,
    /// Caller-supplied grand total, cross-checked by the validator.
    #[n(7)]
    pub declared_total: Option<u64>,
}

/// The canonical in-memory fiscal document, independent of any wire format.
///
/// `number` and `access_key` stay empty until the lifecycle assigns them;
/// everything else is immutable after `DocumentBuilder::build`.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Document {
    #[n(0)]
    pub model: DocumentModel,
    #[n(1)]
    pub series: u16,
    #[n(2)]
    pub number: Option<u32>,
    #[n(3)]
    pub access_key: Option<AccessKey>,
    #[n(4)]
    pub issuer: Option<Issuer>,
    #[n(5)]
    pub recipient: Option<Recipient>,
    #[n(6)]
    pub items: Vec<LineItem>,
    #[n(7)]
    pub totals: Totals,
    #[n(8)]
    pub payments: Vec<Payment>,
    #[n(9)]
    pub issued_at: TimeStamp<Utc>,
    #[n(10)]
    pub environment: Environment,
}

impl Document {
    /// Bind the allocated number and derived key to this document. Called
    /// once by the lifecycle, after validation passes.
    pub fn assign_identity(&mut self, number: u32, key: AccessKey) {
        self.number = Some(number);
        self.access_key = Some(key);
    }
}

/// The 44-digit access key identifying a fiscal document nationwide.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Hash)]
#[cbor(transparent)]
pub struct AccessKey(#[n(0)] String);

impl AccessKey {
    pub const LEN: usize = 44;

    /// Accepts exactly 44 ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, EmissionError> {
        if raw.len() != Self::LEN || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EmissionError::InvalidIdentity(format!(
                "access key must be 44 digits, got '{raw}'"
            )));
        }
        Ok(Self(raw.to_owned()))
    }

    /// Used by the key generator once the digits are known-good.
    pub(crate) fn from_digits(digits: String) -> Self {
        debug_assert_eq!(digits.len(), Self::LEN);
        Self(digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn now() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    /// YYMM of the emission date, the second field of the access key.
    pub fn yymm(&self) -> String {
        self.0.format("%y%m").to_string()
    }
    /// dhEmi wire format.
    pub fn iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::now();

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn access_key_rejects_wrong_length() {
        assert!(AccessKey::parse("123").is_err());
        assert!(AccessKey::parse(&"9".repeat(44)).is_ok());
        assert!(AccessKey::parse(&"a".repeat(44)).is_err());
    }

    #[test]
    fn tax_line_rounds_down() {
        // 165 basis points of 10.00 = 0.16 (truncated)
        let line = TaxLine::compute("01", 1_000, 165);
        assert_eq!(line.value, 16);
    }
}
