//! Sync reconciler (spec §4.9): divergence detection and resolution across
//! two decrypted replicas of the same vault (same password / key set).

use crate::item::Item;
use crate::metadata::VaultMetadata;
use crate::migrate::DecodedVault;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

pub enum Side {
    Local,
    Remote,
}

pub enum ReconcileOutcome {
    NoOp,
    FastForward(Side),
    Conflict {
        local_modified_at: OffsetDateTime,
        remote_modified_at: OffsetDateTime,
    },
}

pub enum ConflictResolution {
    KeepLocal,
    KeepRemote,
    Merge,
    KeepBoth,
}

/// Compares the two replicas' version vectors and reports which of the
/// three outcomes in spec §4.9 applies. Never mutates either replica.
#[must_use]
pub fn reconcile(local: &DecodedVault, remote: &DecodedVault) -> ReconcileOutcome {
    match VaultMetadata::compare_vectors(&local.metadata.version_vector, &remote.metadata.version_vector) {
        Some(Ordering::Equal) => ReconcileOutcome::NoOp,
        Some(Ordering::Greater) => ReconcileOutcome::FastForward(Side::Local),
        Some(Ordering::Less) => ReconcileOutcome::FastForward(Side::Remote),
        None => ReconcileOutcome::Conflict {
            local_modified_at: local.metadata.modified_at,
            remote_modified_at: remote.metadata.modified_at,
        },
    }
}

/// Applies the caller's chosen resolution. `local_client_id` is used only
/// for the version-vector increment on `Merge`; it must match
/// `local.metadata.client_id`.
#[must_use]
pub fn resolve(local: DecodedVault, remote: DecodedVault, resolution: ConflictResolution, now: OffsetDateTime) -> DecodedVault {
    match resolution {
        ConflictResolution::KeepLocal => local,
        ConflictResolution::KeepRemote => remote,
        ConflictResolution::Merge => merge(local, remote, now, false),
        ConflictResolution::KeepBoth => merge(local, remote, now, true),
    }
}

/// Per-item merge keyed by id (spec §4.9): an id present on only one side is
/// kept as-is; present on both, the item with the greater `modified_at`
/// wins, ties broken by lexicographically greater `client_id`. Symmetric in
/// `local`/`remote` except for which side's client-id entry gets the final
/// increment, so merging A into B and B into A yield the same item set
/// (invariant 7, spec §8).
fn merge(local: DecodedVault, remote: DecodedVault, now: OffsetDateTime, keep_both: bool) -> DecodedVault {
    let local_client = local.metadata.client_id.clone();
    let remote_client = remote.metadata.client_id.clone();

    let mut by_id: BTreeMap<Uuid, Item> = BTreeMap::new();
    let mut extra: Vec<Item> = Vec::new();

    let mut remote_by_id: BTreeMap<Uuid, Item> = remote.items.into_iter().map(|i| (i.id, i)).collect();

    for local_item in local.items {
        match remote_by_id.remove(&local_item.id) {
            None => {
                by_id.insert(local_item.id, local_item);
            }
            Some(remote_item) => {
                if local_item == remote_item {
                    by_id.insert(local_item.id, local_item);
                    continue;
                }
                let winner = pick_winner(&local_item, &local_client, &remote_item, &remote_client);
                if keep_both {
                    let (keep, dup) = if winner.0 == &local_item { (local_item, remote_item) } else { (remote_item, local_item) };
                    by_id.insert(keep.id, keep);
                    extra.push(duplicate_with_fresh_id(dup));
                } else {
                    let (item, _client) = winner;
                    by_id.insert(item.id, item.clone());
                }
            }
        }
    }

    // Whatever remains in `remote_by_id` existed only on the remote side.
    for (id, item) in remote_by_id {
        by_id.insert(id, item);
    }

    let mut items: Vec<Item> = by_id.into_values().chain(extra).collect();
    items.sort_by_key(|item| item.id);

    let version_vector = VaultMetadata::pointwise_max(&local.metadata.version_vector, &remote.metadata.version_vector);
    let mut metadata = VaultMetadata {
        created_at: local.metadata.created_at.min(remote.metadata.created_at),
        modified_at: now,
        item_count: items.len(),
        version_vector,
        client_id: local_client.clone(),
    };
    *metadata.version_vector.entry(local_client).or_insert(0) += 1;

    DecodedVault { metadata, items }
}

/// Picks the per-item winner: greater `modified_at`, ties broken by
/// lexicographically greater owning client id. Returns the winning item
/// paired with a marker so the caller can tell which side it came from
/// without re-comparing.
fn pick_winner<'a>(
    local_item: &'a Item,
    local_client: &'a str,
    remote_item: &'a Item,
    remote_client: &'a str,
) -> (&'a Item, &'a str) {
    match local_item.modified_at.cmp(&remote_item.modified_at) {
        Ordering::Greater => (local_item, local_client),
        Ordering::Less => (remote_item, remote_client),
        Ordering::Equal => {
            if local_client >= remote_client {
                (local_item, local_client)
            } else {
                (remote_item, remote_client)
            }
        }
    }
}

fn duplicate_with_fresh_id(mut item: Item) -> Item {
    item.id = Uuid::new_v4();
    item.title = format!("{} (conflicted copy)", item.title);
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemFields, SecretString};
    use std::collections::BTreeMap as Map;

    fn meta(client_id: &str, vv: &[(&str, u64)]) -> VaultMetadata {
        VaultMetadata {
            created_at: OffsetDateTime::UNIX_EPOCH,
            modified_at: OffsetDateTime::from_unix_timestamp(10).unwrap(),
            item_count: 0,
            version_vector: vv.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            client_id: client_id.to_string(),
        }
    }

    fn note(title: &str, modified_at: i64) -> Item {
        Item::new(
            title,
            ItemFields::SecureNote {
                body: SecretString::new("body"),
            },
            OffsetDateTime::from_unix_timestamp(modified_at).unwrap(),
        )
    }

    #[test]
    fn identical_vectors_are_a_no_op() {
        let meta = meta("a", &[("a", 1)]);
        let local = DecodedVault { metadata: meta.clone(), items: vec![] };
        let remote = DecodedVault { metadata: meta, items: vec![] };
        assert!(matches!(reconcile(&local, &remote), ReconcileOutcome::NoOp));
    }

    #[test]
    fn dominating_side_fast_forwards() {
        let local = DecodedVault { metadata: meta("a", &[("a", 2)]), items: vec![] };
        let remote = DecodedVault { metadata: meta("b", &[("a", 1)]), items: vec![] };
        assert!(matches!(reconcile(&local, &remote), ReconcileOutcome::FastForward(Side::Local)));
    }

    #[test]
    fn concurrent_vectors_report_conflict() {
        let local = DecodedVault { metadata: meta("a", &[("a", 2), ("b", 0)]), items: vec![] };
        let remote = DecodedVault { metadata: meta("b", &[("a", 1), ("b", 1)]), items: vec![] };
        assert!(matches!(reconcile(&local, &remote), ReconcileOutcome::Conflict { .. }));
    }

    #[test]
    fn merge_includes_items_unique_to_each_side() {
        let x = note("X", 10);
        let y = note("Y", 11);
        let local = DecodedVault { metadata: meta("local", &[("local", 1)]), items: vec![x.clone()] };
        let remote = DecodedVault { metadata: meta("remote", &[("remote", 1)]), items: vec![y.clone()] };

        let merged = resolve(local, remote, ConflictResolution::Merge, OffsetDateTime::from_unix_timestamp(100).unwrap());
        let ids: Vec<_> = merged.items.iter().map(|i| i.id).collect();
        assert!(ids.contains(&x.id));
        assert!(ids.contains(&y.id));
    }

    #[test]
    fn merge_version_vector_is_pointwise_max_plus_local_increment() {
        let local = DecodedVault { metadata: meta("local", &[("local", 3), ("remote", 1)]), items: vec![] };
        let remote = DecodedVault { metadata: meta("remote", &[("local", 2), ("remote", 5)]), items: vec![] };
        let merged = resolve(local, remote, ConflictResolution::Merge, OffsetDateTime::from_unix_timestamp(100).unwrap());
        assert_eq!(merged.metadata.version_vector["local"], 4); // max(3,2) + 1
        assert_eq!(merged.metadata.version_vector["remote"], 5);
    }

    #[test]
    fn keep_both_duplicates_conflicting_item_under_a_fresh_id() {
        let shared_id = uuid::Uuid::new_v4();
        let mut local_item = note("Shared", 10);
        local_item.id = shared_id;
        let mut remote_item = note("Shared", 20);
        remote_item.id = shared_id;
        remote_item.fields = ItemFields::SecureNote { body: SecretString::new("different") };

        let local = DecodedVault { metadata: meta("local", &[("local", 1)]), items: vec![local_item] };
        let remote = DecodedVault { metadata: meta("remote", &[("remote", 1)]), items: vec![remote_item] };

        let merged = resolve(local, remote, ConflictResolution::KeepBoth, OffsetDateTime::from_unix_timestamp(100).unwrap());
        assert_eq!(merged.items.len(), 2);
        assert!(merged.items.iter().any(|i| i.id == shared_id));
        assert!(merged.items.iter().any(|i| i.id != shared_id && i.title.contains("conflicted copy")));
    }

    #[test]
    fn merge_is_commutative_up_to_client_id_tiebreak() {
        let shared_id = uuid::Uuid::new_v4();
        let mut a_item = note("Shared", 10);
        a_item.id = shared_id;
        let mut b_item = note("Shared", 10); // same modified_at -> tiebreak on client_id
        b_item.id = shared_id;
        b_item.fields = ItemFields::SecureNote { body: SecretString::new("from-b") };

        let a = DecodedVault { metadata: meta("aaa", &[("aaa", 1)]), items: vec![a_item.clone()] };
        let b = DecodedVault { metadata: meta("bbb", &[("bbb", 1)]), items: vec![b_item.clone()] };

        let a_into_b = resolve(
            DecodedVault { metadata: a.metadata.clone(), items: a.items.clone() },
            DecodedVault { metadata: b.metadata.clone(), items: b.items.clone() },
            ConflictResolution::Merge,
            OffsetDateTime::from_unix_timestamp(100).unwrap(),
        );
        let b_into_a = resolve(b, a, ConflictResolution::Merge, OffsetDateTime::from_unix_timestamp(100).unwrap());

        // "bbb" > "aaa" lexicographically, so both directions keep b's item.
        assert_eq!(a_into_b.items[0].fields, b_item.fields);
        assert_eq!(b_into_a.items[0].fields, b_item.fields);
    }

    #[allow(dead_code)]
    fn unused(_: Map<String, u64>) {}
}
