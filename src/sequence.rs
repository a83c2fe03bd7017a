//! Monotonic document numbering
//!
//! One durable counter per (issuer CNPJ, model, series), kept in its own
//! sled tree. `update_and_fetch` gives the atomic read-modify-write: two
//! concurrent callers for the same series can interleave but never see the
//! same number. An allocated number is a consumed slot; nothing here ever
//! hands one back, even if the caller's submission later fails.
use super::document::DocumentModel;
use super::error::EmissionError;
use super::key::MAX_NUMBER;
use super::utils::only_digits;

const SEQUENCE_TREE: &str = "sequences";

pub struct SequenceAllocator {
    tree: sled::Tree,
}

impl SequenceAllocator {
    pub fn open(db: &sled::Db) -> Result<Self, EmissionError> {
        let tree = db
            .open_tree(SEQUENCE_TREE)
            .map_err(|e| EmissionError::Allocation(e.to_string()))?;
        Ok(Self { tree })
    }

    fn counter_key(cnpj: &str, model: DocumentModel, series: u16) -> String {
        format!("{}:{:02}:{:03}", only_digits(cnpj), model.code(), series)
    }

    /// Consume and return the next number for the series. Atomic per key.
    pub fn next(
        &self,
        cnpj: &str,
        model: DocumentModel,
        series: u16,
    ) -> Result<u32, EmissionError> {
        let key = Self::counter_key(cnpj, model, series);

        let current = self
            .tree
            .update_and_fetch(key.as_bytes(), |old| {
                let next = decode_counter(old) + 1;
                Some(next.to_be_bytes().to_vec())
            })
            .map_err(|e| EmissionError::Allocation(e.to_string()))?;

        // flush before returning: the slot must be durably consumed before
        // anything is submitted under it
        self.tree
            .flush()
            .map_err(|e| EmissionError::Allocation(e.to_string()))?;

        let number = current
            .as_deref()
            .map(decode_bytes)
            .ok_or_else(|| EmissionError::Allocation("counter vanished mid-update".into()))?;

        if number > u64::from(MAX_NUMBER) {
            return Err(EmissionError::Allocation(format!(
                "series {key} exhausted the 9-digit number space"
            )));
        }
        Ok(number as u32)
    }

    /// Last number handed out for the series, if any. Read-only.
    pub fn current(
        &self,
        cnpj: &str,
        model: DocumentModel,
        series: u16,
    ) -> Result<Option<u64>, EmissionError> {
        let key = Self::counter_key(cnpj, model, series);
        let value = self
            .tree
            .get(key.as_bytes())
            .map_err(|e| EmissionError::Allocation(e.to_string()))?;
        Ok(value.as_deref().map(decode_bytes))
    }
}

fn decode_counter(old: Option<&[u8]>) -> u64 {
    old.map(decode_bytes).unwrap_or(0)
}

fn decode_bytes(bytes: &[u8]) -> u64 {
    // counters are always written as 8 big-endian bytes
    let mut buf = [0u8; 8];
    let len = bytes.len().min(8);
    buf[8 - len..].copy_from_slice(&bytes[..len]);
    u64::from_be_bytes(buf)
}
