//! Explicit emission configuration
//!
//! Everything the engine used to pull from ambient environment variables
//! (UF, tpAmb, series, timeout) lives here and is passed in at construction.
//! Document identity fields are never defaulted from this struct; a missing
//! issuer is a validation error, not something to paper over.
use super::authority::RetryPolicy;
use super::document::{DocumentModel, Environment, Uf};

#[derive(Debug, Clone)]
pub struct EmissionConfig {
    /// UF of emission, first field of every access key.
    pub uf: Uf,
    pub environment: Environment,
    pub nfe_series: u16,
    pub nfce_series: u16,
    pub retry: RetryPolicy,
}

impl EmissionConfig {
    pub fn new(uf: Uf, environment: Environment) -> Self {
        Self {
            uf,
            environment,
            ..Self::default()
        }
    }

    pub fn series_for(&self, model: DocumentModel) -> u16 {
        match model {
            DocumentModel::Nfe => self.nfe_series,
            DocumentModel::Nfce => self.nfce_series,
        }
    }
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            uf: Uf::Sp,
            environment: Environment::Staging,
            nfe_series: 1,
            nfce_series: 1,
            retry: RetryPolicy::default(),
        }
    }
}
