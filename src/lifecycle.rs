//! Document lifecycle record and state machine
//!
//! Each document's journey is an append-only transition log owned by one
//! [`LifecycleRecord`]. Records are persisted as CBOR in sled, keyed by the
//! 44-digit access key, and only the defined transitions can mutate them.
use super::document::{AccessKey, DocumentModel, TimeStamp};
use super::error::EmissionError;
use chrono::Utc;

pub const LIFECYCLE_TREE: &str = "lifecycle";

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    #[n(0)]
    Draft,
    #[n(1)]
    Built,
    #[n(2)]
    Validated,
    #[n(3)]
    KeyAssigned,
    #[n(4)]
    Submitted,
    #[n(5)]
    Authorized,
    #[n(6)]
    Rejected,
    #[n(7)]
    Cancelled,
    /// Terminal: validation failed, nothing was allocated or submitted.
    #[n(8)]
    Invalid,
}

impl DocumentState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocumentState::Rejected | DocumentState::Cancelled | DocumentState::Invalid
        )
    }

    fn allows(self, to: DocumentState) -> bool {
        use DocumentState::*;
        matches!(
            (self, to),
            (Draft, Built)
                | (Built, Validated)
                | (Built, Invalid)
                | (Validated, KeyAssigned)
                | (KeyAssigned, Submitted)
                | (Submitted, Authorized)
                | (Submitted, Rejected)
                | (Authorized, Cancelled)
        )
    }
}

/// One entry of the append-only transition log.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Transition {
    #[n(0)]
    pub at: TimeStamp<Utc>,
    #[n(1)]
    pub from: DocumentState,
    #[n(2)]
    pub to: DocumentState,
    #[n(3)]
    pub reason: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct LifecycleRecord {
    /// Empty until the key-assignment step; the record is persisted only
    /// from that point on.
    #[n(0)]
    pub access_key: Option<AccessKey>,
    #[n(1)]
    pub model: DocumentModel,
    #[n(2)]
    pub series: u16,
    #[n(3)]
    pub number: Option<u32>,
    #[n(4)]
    pub state: DocumentState,
    #[n(5)]
    pub protocol: Option<String>,
    #[n(6)]
    pub status_code: Option<u16>,
    #[n(7)]
    pub reason: Option<String>,
    #[n(8)]
    pub transitions: Vec<Transition>,
}

impl LifecycleRecord {
    pub fn begin(model: DocumentModel, series: u16) -> Self {
        Self {
            access_key: None,
            model,
            series,
            number: None,
            state: DocumentState::Draft,
            protocol: None,
            status_code: None,
            reason: None,
            transitions: Vec::new(),
        }
    }

    pub fn current_state(&self) -> DocumentState {
        self.state
    }

    /// Apply a transition, appending to the log. Illegal edges are a bug in
    /// the driver, reported as a `Store` error rather than silently applied.
    pub fn transition(&mut self, to: DocumentState, reason: &str) -> Result<(), EmissionError> {
        if !self.state.allows(to) {
            return Err(EmissionError::Store(format!(
                "illegal transition {:?} -> {:?}",
                self.state, to
            )));
        }
        self.transitions.push(Transition {
            at: TimeStamp::now(),
            from: self.state,
            to,
            reason: reason.to_owned(),
        });
        self.state = to;
        Ok(())
    }

    /// Record the allocated number and derived key, moving to KeyAssigned.
    pub fn assign_key(&mut self, number: u32, key: AccessKey) -> Result<(), EmissionError> {
        self.number = Some(number);
        self.access_key = Some(key);
        self.transition(DocumentState::KeyAssigned, "number and access key assigned")
    }

    /// Store the authority's verdict fields.
    pub fn record_authority(&mut self, protocol: Option<String>, status: u16, reason: &str) {
        if protocol.is_some() {
            self.protocol = protocol;
        }
        self.status_code = Some(status);
        self.reason = Some(reason.to_owned());
    }

    pub fn save(&self, tree: &sled::Tree) -> Result<(), EmissionError> {
        let key = self
            .access_key
            .as_ref()
            .ok_or_else(|| EmissionError::Store("cannot persist a record without a key".into()))?;
        let bytes =
            minicbor::to_vec(self).map_err(|e| EmissionError::Store(e.to_string()))?;
        tree.insert(key.as_str().as_bytes(), bytes)?;
        Ok(())
    }

    pub fn load(tree: &sled::Tree, key: &AccessKey) -> Result<Self, EmissionError> {
        let bytes = tree
            .get(key.as_str().as_bytes())?
            .ok_or_else(|| EmissionError::NotFound(key.to_string()))?;
        minicbor::decode(&bytes).map_err(|e| EmissionError::Store(e.to_string()))
    }

    /// Dump the transition log through tracing, newest last.
    pub fn view_history(&self) {
        for t in &self.transitions {
            tracing::info!(
                at = %t.at.iso8601(),
                from = ?t.from,
                to = ?t.to,
                reason = %t.reason,
                "lifecycle transition"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> LifecycleRecord {
        LifecycleRecord::begin(DocumentModel::Nfce, 1)
    }

    #[test]
    fn happy_path_transitions() {
        let mut rec = record();
        rec.transition(DocumentState::Built, "assembled").unwrap();
        rec.transition(DocumentState::Validated, "no violations").unwrap();
        rec.assign_key(7, AccessKey::parse(&"4".repeat(44)).unwrap())
            .unwrap();
        rec.transition(DocumentState::Submitted, "sent").unwrap();
        rec.transition(DocumentState::Authorized, "status 100").unwrap();
        rec.transition(DocumentState::Cancelled, "operator request")
            .unwrap();

        assert_eq!(rec.transitions.len(), 6);
        assert_eq!(rec.transitions[0].from, DocumentState::Draft);
        assert_eq!(rec.state, DocumentState::Cancelled);
        assert!(rec.state.is_terminal());
    }

    #[test]
    fn cancel_requires_authorized() {
        let mut rec = record();
        rec.transition(DocumentState::Built, "assembled").unwrap();
        assert!(rec.transition(DocumentState::Cancelled, "nope").is_err());
        // state untouched after the refused transition
        assert_eq!(rec.state, DocumentState::Built);
    }

    #[test]
    fn rejected_is_terminal() {
        let mut rec = record();
        rec.transition(DocumentState::Built, "assembled").unwrap();
        rec.transition(DocumentState::Validated, "ok").unwrap();
        rec.assign_key(1, AccessKey::parse(&"5".repeat(44)).unwrap())
            .unwrap();
        rec.transition(DocumentState::Submitted, "sent").unwrap();
        rec.transition(DocumentState::Rejected, "status 302").unwrap();
        assert!(rec.transition(DocumentState::Submitted, "retry").is_err());
    }

    #[test]
    fn record_roundtrips_through_sled() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path().join("lc.db")).unwrap();
        let tree = db.open_tree(LIFECYCLE_TREE).unwrap();

        let mut rec = record();
        rec.transition(DocumentState::Built, "assembled").unwrap();
        rec.transition(DocumentState::Validated, "ok").unwrap();
        let key = AccessKey::parse(&"6".repeat(44)).unwrap();
        rec.assign_key(3, key.clone()).unwrap();
        rec.save(&tree).unwrap();

        let loaded = LifecycleRecord::load(&tree, &key).unwrap();
        assert_eq!(loaded, rec);
    }

    #[test]
    fn unsaved_record_without_key_errors() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path().join("lc.db")).unwrap();
        let tree = db.open_tree(LIFECYCLE_TREE).unwrap();
        assert!(record().save(&tree).is_err());
    }
}
