//! Vault metadata (spec §3): timestamps, item count, and the version vector
//! that drives sync reconciliation (spec §4.9).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

mod rfc3339 {
    pub use time::serde::rfc3339::{deserialize, serialize};
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultMetadata {
    #[serde(with = "rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "rfc3339")]
    pub modified_at: OffsetDateTime,
    pub item_count: usize,
    pub version_vector: BTreeMap<String, u64>,
    pub client_id: String,
}

impl VaultMetadata {
    #[must_use]
    pub fn new(client_id: String, now: OffsetDateTime) -> Self {
        let mut version_vector = BTreeMap::new();
        version_vector.insert(client_id.clone(), 0);
        Self {
            created_at: now,
            modified_at: now,
            item_count: 0,
            version_vector,
            client_id,
        }
    }

    /// Bumps this client's local counter and refreshes `modified_at`,
    /// `item_count` — the bookkeeping every mutation performs (spec §4.7).
    pub fn record_mutation(&mut self, item_count: usize, now: OffsetDateTime) {
        self.item_count = item_count;
        self.modified_at = now;
        *self.version_vector.entry(self.client_id.clone()).or_insert(0) += 1;
    }

    /// Ordering between two version vectors (spec §4.9):
    /// `Equal` if identical, `Less`/`Greater` if one dominates the other
    /// (every counter ≤/≥ and at least one strictly less/greater),
    /// `None` if concurrent (incomparable).
    #[must_use]
    pub fn compare_vectors(a: &BTreeMap<String, u64>, b: &BTreeMap<String, u64>) -> Option<std::cmp::Ordering> {
        use std::cmp::Ordering;

        let mut clients: std::collections::BTreeSet<&String> = a.keys().collect();
        clients.extend(b.keys());

        let mut a_ahead = false;
        let mut b_ahead = false;
        for client in clients {
            let va = a.get(client).copied().unwrap_or(0);
            let vb = b.get(client).copied().unwrap_or(0);
            match va.cmp(&vb) {
                Ordering::Greater => a_ahead = true,
                Ordering::Less => b_ahead = true,
                Ordering::Equal => {}
            }
        }

        match (a_ahead, b_ahead) {
            (false, false) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Greater),
            (false, true) => Some(Ordering::Less),
            (true, true) => None,
        }
    }

    /// Pointwise max of two version vectors, used when merging (spec §4.9).
    #[must_use]
    pub fn pointwise_max(a: &BTreeMap<String, u64>, b: &BTreeMap<String, u64>) -> BTreeMap<String, u64> {
        let mut out = a.clone();
        for (client, &v) in b {
            let entry = out.entry(client.clone()).or_insert(0);
            if v > *entry {
                *entry = v;
            }
        }
        out
    }
}
