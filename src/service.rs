//! Service layer driving the full emission lifecycle
use super::authority::AuthorityClient;
use super::builder::DocumentBuilder;
use super::config::EmissionConfig;
use super::document::{AccessKey, Document, DocumentModel};
use super::error::EmissionError;
use super::key;
use super::lifecycle::{DocumentState, LIFECYCLE_TREE, LifecycleRecord};
use super::qrcode::nfce_qr_code;
use super::sequence::SequenceAllocator;
use super::validate::validate;
use std::sync::Arc;

const DOCUMENT_TREE: &str = "documents";

/// Success payload of [`EmissionService::issue`].
#[derive(Debug, Clone)]
pub struct IssueOutcome {
    pub key: AccessKey,
    pub number: u32,
    pub protocol: Option<String>,
    pub status: u16,
    pub state: DocumentState,
    /// Consultation QR code, NFC-e only.
    pub qr_code: Option<String>,
}

pub struct EmissionService {
    records: sled::Tree,
    documents: sled::Tree,
    allocator: SequenceAllocator,
    authority: Box<dyn AuthorityClient>,
    config: EmissionConfig,
}

impl EmissionService {
    pub fn new(
        db: Arc<sled::Db>,
        authority: Box<dyn AuthorityClient>,
        config: EmissionConfig,
    ) -> Result<Self, EmissionError> {
        let records = db.open_tree(LIFECYCLE_TREE)?;
        let documents = db.open_tree(DOCUMENT_TREE)?;
        let allocator = SequenceAllocator::open(&db)?;
        Ok(Self {
            records,
            documents,
            allocator,
            authority,
            config,
        })
    }

    /// Assemble the document with the service's configuration and drive it
    /// through the full pipeline in one call.
    pub fn build_and_submit(
        &self,
        builder: DocumentBuilder,
    ) -> Result<IssueOutcome, EmissionError> {
        self.issue(builder.build(&self.config))
    }

    /// Drive one document from built to a settled (or unknown) outcome:
    /// validate, assign number and key, submit with bounded retries.
    ///
    /// Runs to completion synchronously. Once a number is allocated the
    /// pipeline always reaches Submitted, Rejected or a surfaced error;
    /// there is no path that drops an allocated number silently.
    pub fn issue(&self, mut document: Document) -> Result<IssueOutcome, EmissionError> {
        let mut record = LifecycleRecord::begin(document.model, document.series);
        record.transition(DocumentState::Built, "document assembled")?;

        tracing::info!(model = ?document.model, series = document.series, "starting emission");

        let violations = validate(&document);
        if !violations.is_empty() {
            record.transition(DocumentState::Invalid, "validation failed")?;
            tracing::warn!(count = violations.len(), "document failed validation");
            return Err(EmissionError::ValidationFailed(violations));
        }
        record.transition(DocumentState::Validated, "all business rules passed")?;

        // validation guarantees the issuer is present with a 14-digit CNPJ
        let issuer_cnpj = document
            .issuer
            .as_ref()
            .map(|i| i.cnpj.clone())
            .ok_or_else(|| EmissionError::InvalidIdentity("issuer missing after validation".into()))?;

        // number allocation and key derivation are one step: if the key
        // cannot be derived the number stays consumed and the caller must
        // rebuild with a fresh one
        let number = self
            .allocator
            .next(&issuer_cnpj, document.model, document.series)?;
        let access_key = key::generate(
            self.config.uf,
            &document.issued_at,
            &issuer_cnpj,
            document.model,
            document.series,
            number,
            key::random_code(),
        )
        .map_err(|e| EmissionError::KeyAssignmentFailed {
            number,
            reason: e.to_string(),
        })?;

        document.assign_identity(number, access_key.clone());
        record.assign_key(number, access_key.clone())?;
        self.save_document(&document, &access_key)?;
        record.save(&self.records)?;

        tracing::info!(key = %access_key, number, "access key assigned");

        record.transition(DocumentState::Submitted, "sent to authority")?;
        record.save(&self.records)?;

        // same key and number on every attempt; the authority deduplicates
        // by key, so resubmission is safe
        let mut attempt = 1u32;
        let response = loop {
            match self.authority.submit(&document) {
                Ok(response) => break response,
                Err(err) => {
                    tracing::warn!(attempt, key = %access_key, error = %err, "transport failure");
                    if attempt >= self.config.retry.max_attempts {
                        // outcome unknown: stay Submitted, require a query
                        return Err(EmissionError::UnknownStatus {
                            key: access_key.to_string(),
                        });
                    }
                    std::thread::sleep(self.config.retry.backoff(attempt));
                    attempt += 1;
                }
            }
        };

        record.record_authority(response.protocol.clone(), response.status, &response.reason);
        if response.is_authorized() {
            record.transition(DocumentState::Authorized, &response.reason)?;
            record.save(&self.records)?;
            tracing::info!(key = %access_key, protocol = ?record.protocol, "document authorized");

            let qr_code = matches!(document.model, DocumentModel::Nfce)
                .then(|| nfce_qr_code(&document, &access_key, self.config.uf));

            Ok(IssueOutcome {
                key: access_key,
                number,
                protocol: record.protocol.clone(),
                status: response.status,
                state: record.state,
                qr_code,
            })
        } else {
            record.transition(DocumentState::Rejected, &response.reason)?;
            record.save(&self.records)?;
            tracing::warn!(key = %access_key, status = response.status, "document rejected");
            Err(EmissionError::Rejected {
                status: response.status,
                reason: response.reason,
            })
        }
    }

    /// Resolve a record left in `Submitted` by asking the authority for the
    /// definitive situation of the key. Never loops: one query per call.
    pub fn query(&self, key: &str) -> Result<LifecycleRecord, EmissionError> {
        let access_key = AccessKey::parse(key)?;
        let mut record = LifecycleRecord::load(&self.records, &access_key)?;

        if record.state != DocumentState::Submitted {
            return Ok(record);
        }

        let response = self
            .authority
            .query(&access_key)
            .map_err(|_| EmissionError::UnknownStatus {
                key: access_key.to_string(),
            })?;

        record.record_authority(response.protocol.clone(), response.status, &response.reason);
        if response.is_authorized() {
            record.transition(DocumentState::Authorized, &response.reason)?;
        } else if response.is_cancelled() {
            // cancelled while we were unsure: the authorization happened
            // out of our sight, record both edges
            record.transition(DocumentState::Authorized, "resolved via query")?;
            record.transition(DocumentState::Cancelled, &response.reason)?;
        } else {
            record.transition(DocumentState::Rejected, &response.reason)?;
        }
        record.save(&self.records)?;
        tracing::info!(key = %access_key, state = ?record.state, "record resolved via query");
        Ok(record)
    }

    /// Cancel an authorized document. On any refusal (local guard, explicit
    /// authority denial, transport failure) the record stays Authorized.
    pub fn cancel(&self, key: &str, justification: &str) -> Result<LifecycleRecord, EmissionError> {
        let access_key = AccessKey::parse(key)?;
        if justification.trim().chars().count() < 15 {
            return Err(EmissionError::Cancellation(
                "justification must have at least 15 characters".into(),
            ));
        }

        let mut record = LifecycleRecord::load(&self.records, &access_key)?;
        if record.state != DocumentState::Authorized {
            return Err(EmissionError::Cancellation(format!(
                "only authorized documents can be cancelled, current state is {:?}",
                record.state
            )));
        }

        tracing::info!(key = %access_key, "requesting cancellation");
        let response = self
            .authority
            .cancel(&access_key, justification)
            .map_err(|e| EmissionError::Cancellation(e.to_string()))?;

        if response.is_cancelled() {
            record.record_authority(response.protocol.clone(), response.status, &response.reason);
            record.transition(DocumentState::Cancelled, &response.reason)?;
            record.save(&self.records)?;
            tracing::info!(key = %access_key, protocol = ?record.protocol, "document cancelled");
            Ok(record)
        } else {
            tracing::warn!(key = %access_key, status = response.status, "cancellation denied");
            Err(EmissionError::Cancellation(format!(
                "authority denied cancellation: status {} - {}",
                response.status, response.reason
            )))
        }
    }

    /// Load the lifecycle record for a key.
    pub fn record(&self, key: &str) -> Result<LifecycleRecord, EmissionError> {
        let access_key = AccessKey::parse(key)?;
        LifecycleRecord::load(&self.records, &access_key)
    }

    /// Load the stored document for a key.
    pub fn document(&self, key: &str) -> Result<Document, EmissionError> {
        let access_key = AccessKey::parse(key)?;
        let bytes = self
            .documents
            .get(access_key.as_str().as_bytes())?
            .ok_or_else(|| EmissionError::NotFound(access_key.to_string()))?;
        minicbor::decode(&bytes).map_err(|e| EmissionError::Store(e.to_string()))
    }

    fn save_document(&self, document: &Document, key: &AccessKey) -> Result<(), EmissionError> {
        let bytes = minicbor::to_vec(document).map_err(|e| EmissionError::Store(e.to_string()))?;
        self.documents.insert(key.as_str().as_bytes(), bytes)?;
        Ok(())
    }
}
