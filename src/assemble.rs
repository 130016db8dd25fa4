//! Dataset assembly: deduplication and deterministic ordering.
//!
//! Records accumulate in arrival order and deduplicate by full structural
//! equality — first seen wins, and the hash key plays no part in the
//! decision, so a key collision can never merge two distinct records. The
//! final sort orders by hash key ascending and breaks key ties with the
//! records' canonical JSON bytes, which makes the output independent of
//! device-discovery order even under a collision.
//!
//! The linear deep-compare on insert is O(n²) over the dataset. That is
//! intentional: the device catalog is tens of entries, not thousands, and a
//! content-hash set would not change observable behavior. Revisit only with
//! a benchmark showing it matters.

use crate::geometry::Dimensions;
use tracing::debug;

/// Accumulates per-device records and yields the final ordered dataset.
#[derive(Debug, Default)]
pub struct DatasetAssembler {
    records: Vec<Dimensions>,
}

impl DatasetAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record in. Returns `false` if a structurally equal record
    /// was already present (the incoming one is dropped).
    pub fn insert(&mut self, record: Dimensions) -> bool {
        if self.records.iter().any(|existing| *existing == record) {
            debug!(device = %record.device, "dropping structurally duplicate record");
            return false;
        }
        self.records.push(record);
        true
    }

    /// Number of unique records accumulated so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records have been accumulated.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Finish: sort by `(hash_key, canonical_json)` ascending and yield the
    /// dataset. Byte-identical output for any permutation of the same input.
    pub fn into_sorted(self) -> Vec<Dimensions> {
        let mut keyed: Vec<(u64, String, Dimensions)> = self
            .records
            .into_iter()
            .map(|record| (record.hash_key(), record.canonical_json(), record))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        keyed.into_iter().map(|(_, _, record)| record).collect()
    }
}
