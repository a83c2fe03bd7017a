//! Authorization authority contract
//!
//! Submission, query and cancellation against the tax authority. The real
//! wire client (SOAP, certificates) plugs in behind [`AuthorityClient`]; the
//! engine only relies on the contract: all three operations are idempotent
//! for a given access key, and a transport failure is distinguishable from
//! an explicit rejection.
use super::document::{AccessKey, Document, DocumentModel, TimeStamp};
use std::time::Duration;

/// Authorization granted.
pub const STATUS_AUTHORIZED: u16 = 100;
/// Authorization granted outside the original deadline.
pub const STATUS_AUTHORIZED_LATE: u16 = 150;
/// Document cancelled.
pub const STATUS_CANCELLED: u16 = 101;
/// Cancellation granted outside the original deadline.
pub const STATUS_CANCELLED_LATE: u16 = 151;
/// Cancellation event registered and linked.
pub const STATUS_CANCEL_HOMOLOGATED: u16 = 135;

/// The authority could not be reached or did not answer in time. Retryable,
/// unlike an explicit rejection.
#[derive(thiserror::Error, Debug, Clone)]
#[error("authority transport failure: {0}")]
pub struct TransportError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityResponse {
    pub protocol: Option<String>,
    pub status: u16,
    pub reason: String,
}

impl AuthorityResponse {
    pub fn is_authorized(&self) -> bool {
        matches!(self.status, STATUS_AUTHORIZED | STATUS_AUTHORIZED_LATE)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.status,
            STATUS_CANCELLED | STATUS_CANCELLED_LATE | STATUS_CANCEL_HOMOLOGATED
        )
    }
}

/// One authority endpoint. Implementations own their transport: a wire
/// client takes the engine's [`RetryPolicy`] at construction and must
/// return from every call within [`RetryPolicy::attempt_timeout`],
/// answering with a [`TransportError`] once the deadline elapses. The
/// engine treats an overdue attempt exactly like any other transport
/// failure and retries under the same policy. In-process implementations
/// such as [`SandboxAuthority`] meet the deadline trivially.
pub trait AuthorityClient: Send + Sync {
    /// Submit a key-assigned document for authorization.
    fn submit(&self, document: &Document) -> Result<AuthorityResponse, TransportError>;
    /// Ask for the current situation of a key.
    fn query(&self, key: &AccessKey) -> Result<AuthorityResponse, TransportError>;
    /// Request cancellation of an authorized document.
    fn cancel(
        &self,
        key: &AccessKey,
        justification: &str,
    ) -> Result<AuthorityResponse, TransportError>;
}

/// Bounded retry with exponential backoff, applied to transport errors only.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    /// Per-attempt network deadline. Enforced by the [`AuthorityClient`]
    /// implementation, which receives this policy at construction.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Delay before the given retry (1-based attempt that just failed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff: Duration::from_millis(250),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

/// Deterministic in-process authority for staging and tests. Mirrors the
/// simulated SEFAZ responses of the original service: everything structurally
/// sound is authorized with a fabricated protocol number.
pub struct SandboxAuthority;

impl SandboxAuthority {
    fn protocol(model_prefix: &str, suffix: &str) -> String {
        let now = TimeStamp::now().to_datetime_utc().format("%Y%m%d%H%M%S");
        format!("{model_prefix}{now}{suffix}")
    }

    fn model_prefix(model: DocumentModel) -> &'static str {
        match model {
            DocumentModel::Nfe => "135",
            DocumentModel::Nfce => "165",
        }
    }
}

impl AuthorityClient for SandboxAuthority {
    fn submit(&self, document: &Document) -> Result<AuthorityResponse, TransportError> {
        let reason = match document.model {
            DocumentModel::Nfe => "Autorizado o uso da NF-e",
            DocumentModel::Nfce => "Autorizado o uso da NFC-e",
        };
        Ok(AuthorityResponse {
            protocol: Some(Self::protocol(Self::model_prefix(document.model), "001")),
            status: STATUS_AUTHORIZED,
            reason: reason.to_owned(),
        })
    }

    fn query(&self, _key: &AccessKey) -> Result<AuthorityResponse, TransportError> {
        Ok(AuthorityResponse {
            protocol: Some(Self::protocol("135", "001")),
            status: STATUS_AUTHORIZED,
            reason: "Autorizado o uso da NF-e".to_owned(),
        })
    }

    fn cancel(
        &self,
        _key: &AccessKey,
        _justification: &str,
    ) -> Result<AuthorityResponse, TransportError> {
        Ok(AuthorityResponse {
            protocol: Some(Self::protocol("135", "002")),
            status: STATUS_CANCELLED,
            reason: "Cancelamento homologado".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_backoff: Duration::from_millis(100),
            attempt_timeout: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn default_policy_carries_a_per_attempt_deadline() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(60));
    }

    #[test]
    fn status_classification() {
        let ok = AuthorityResponse {
            protocol: None,
            status: STATUS_AUTHORIZED,
            reason: String::new(),
        };
        assert!(ok.is_authorized());
        assert!(!ok.is_cancelled());

        let denied = AuthorityResponse {
            protocol: None,
            status: 302,
            reason: "Rejeicao: Irregularidade fiscal do emitente".to_owned(),
        };
        assert!(!denied.is_authorized());
    }
}
