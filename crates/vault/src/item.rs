//! Item model & serializer (spec §4.6, §3 "Vault Items").
//!
//! Categories are a tagged enum with one variant per kind rather than a
//! single record with optional fields, so "required fields per category" is
//! enforced by the type system instead of by convention (spec §9).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::OffsetDateTime;
use uuid::Uuid;

mod rfc3339 {
    pub use time::serde::rfc3339::{deserialize, serialize};
}

/// A string that is redacted in `Debug` output. Serializes transparently so
/// the encrypted items blob still carries the real value; what it protects
/// against is an accidental `{:?}` in a log line.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString(REDACTED)")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // String's buffer isn't reliably zeroizable through the std API
        // without `zeroize`'s `Zeroize` impl for `String`; clear + shrink is
        // best-effort, matching the teacher's "best effort, not propagated"
        // stance on secret scrubbing for non-key buffers.
        self.0.clear();
        self.0.shrink_to_fit();
    }
}

/// One entry in a login's append-only password history (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHistoryEntry {
    pub password: SecretString,
    #[serde(with = "rfc3339")]
    pub changed_at: OffsetDateTime,
}

/// The maximum number of entries retained in a login's `password_history`.
pub const MAX_PASSWORD_HISTORY: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Category-specific required fields. Internally tagged on `category` so it
/// flattens into the same JSON object as the item's common header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ItemFields {
    Login {
        username: String,
        password: SecretString,
        urls: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        totp_secret: Option<SecretString>,
        #[serde(default)]
        notes: String,
        #[serde(default)]
        password_history: Vec<PasswordHistoryEntry>,
    },
    SecureNote {
        body: SecretString,
    },
    CreditCard {
        cardholder: String,
        number: SecretString,
        cvv: SecretString,
        expiry: String,
        brand: String,
    },
    Identity {
        full_name: String,
        email: String,
        phone: String,
        #[serde(default)]
        address: Address,
    },
}

/// `rename_all = "snake_case"` on the derive above only governs
/// serialization; serde's internally-tagged enum matching is exact-case on
/// the way in. Spec §4.6 requires `category` to decode case-insensitively
/// (a future client or migration step may round-trip `"Login"` or
/// `"LOGIN"`), so this lowercases the tag before handing the object to the
/// derived matcher rather than hand-rolling the whole variant dispatch.
fn deserialize_item_fields_ci<'de, D>(deserializer: D) -> std::result::Result<ItemFields, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mut value = serde_json::Value::deserialize(deserializer)?;
    if let serde_json::Value::Object(map) = &mut value {
        if let Some(serde_json::Value::String(category)) = map.get("category") {
            let lowered = category.to_lowercase();
            map.insert("category".to_string(), serde_json::Value::String(lowered));
        }
    }
    serde_json::from_value(value).map_err(serde::de::Error::custom)
}

impl ItemFields {
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::SecureNote { .. } => "secure_note",
            Self::CreditCard { .. } => "credit_card",
            Self::Identity { .. } => "identity",
        }
    }

    /// Appends a password change to a login's history, enforcing the
    /// append-only and bounded-length invariants (spec §3). No-op for
    /// other categories.
    pub fn record_password_change(&mut self, previous: SecretString, changed_at: OffsetDateTime) {
        if let Self::Login { password_history, .. } = self {
            password_history.push(PasswordHistoryEntry {
                password: previous,
                changed_at,
            });
            if password_history.len() > MAX_PASSWORD_HISTORY {
                let overflow = password_history.len() - MAX_PASSWORD_HISTORY;
                password_history.drain(0..overflow);
            }
        }
    }
}

/// A vault item: the common header plus category-specific fields (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(with = "rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "rfc3339")]
    pub modified_at: OffsetDateTime,
    #[serde(flatten, deserialize_with = "deserialize_item_fields_ci")]
    pub fields: ItemFields,
}

impl Item {
    #[must_use]
    pub fn new(title: impl Into<String>, fields: ItemFields, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            favorite: false,
            tags: BTreeSet::new(),
            created_at: now,
            modified_at: now,
            fields,
        }
    }

    /// Lowercase-folds and dedupes tags (spec §3 invariant). `BTreeSet`
    /// dedupes structurally; this only needs to normalize case before
    /// insertion.
    pub fn set_tags(&mut self, tags: impl IntoIterator<Item = String>) {
        self.tags = tags.into_iter().map(|t| t.to_lowercase()).collect();
    }

    pub fn touch(&mut self, now: OffsetDateTime) {
        self.modified_at = now;
    }
}

/// Serializes a set of items to canonical JSON: items sorted by id, and
/// stable (sorted) key order within each object, so the same logical vault
/// state produces byte-identical plaintext regardless of the order
/// add/update/delete operations were applied in (spec §4.6, invariant 4).
/// Key order falls out of round-tripping through `serde_json::Value`, whose
/// default map representation is a `BTreeMap`; array order is made
/// insertion-independent by sorting on `id` before serializing.
pub fn to_canonical_json(items: &[Item]) -> crate::error::Result<Vec<u8>> {
    let mut sorted: Vec<&Item> = items.iter().collect();
    sorted.sort_by_key(|item| item.id);
    let value = serde_json::to_value(&sorted)?;
    Ok(serde_json::to_vec(&value)?)
}

pub fn from_canonical_json(bytes: &[u8]) -> crate::error::Result<Vec<Item>> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn login() -> Item {
        let mut item = Item::new(
            "Example",
            ItemFields::Login {
                username: "u".into(),
                password: SecretString::new("p"),
                urls: vec!["https://example.com".into()],
                totp_secret: None,
                notes: String::new(),
                password_history: vec![],
            },
            now(),
        );
        item.set_tags(["Work".to_string(), "work".to_string(), "Personal".to_string()]);
        item
    }

    #[test]
    fn tags_are_lowercased_and_deduped() {
        let item = login();
        assert_eq!(item.tags.len(), 2);
        assert!(item.tags.contains("work"));
        assert!(item.tags.contains("personal"));
    }

    #[test]
    fn category_tag_matches_spec_names() {
        assert_eq!(login().fields.category(), "login");
        let note = ItemFields::SecureNote { body: SecretString::new("x") };
        assert_eq!(note.category(), "secure_note");
    }

    #[test]
    fn category_decodes_case_insensitively() {
        let bytes = to_canonical_json(&[login()]).unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value[0]["category"] = serde_json::Value::String("LOGIN".into());
        let raw = serde_json::to_vec(&value).unwrap();

        let decoded = from_canonical_json(&raw).unwrap();
        assert_eq!(decoded[0].fields.category(), "login");

        // Re-encoding always emits the canonical lowercase tag.
        let re_encoded = to_canonical_json(&decoded).unwrap();
        let re_value: serde_json::Value = serde_json::from_slice(&re_encoded).unwrap();
        assert_eq!(re_value[0]["category"], "login");
    }

    #[test]
    fn canonical_json_roundtrips() {
        let items = vec![login()];
        let bytes = to_canonical_json(&items).unwrap();
        let back = from_canonical_json(&bytes).unwrap();
        assert_eq!(items, back);
    }

    #[test]
    fn canonical_json_is_independent_of_vec_insertion_order() {
        let mut a = login();
        a.title = "A".into();
        let mut b = login();
        b.title = "B".into();
        b.created_at = a.created_at;
        b.modified_at = a.modified_at;
        b.tags = a.tags.clone();
        // b's fields differ only in title/id from a; what matters here is
        // that the two insertion orders below canonicalize identically.
        let forward = to_canonical_json(&[a.clone(), b.clone()]).unwrap();
        let backward = to_canonical_json(&[b, a]).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn canonical_json_is_order_independent() {
        let mut a = login();
        let mut b = login();
        b.id = a.id;
        b.created_at = a.created_at;
        b.modified_at = a.modified_at;
        // Same logical items built via different field-assignment order
        // still produce byte-identical canonical JSON.
        a.tags = ["x".into(), "y".into()].into_iter().collect();
        b.tags = ["y".into(), "x".into()].into_iter().collect();
        assert_eq!(to_canonical_json(&[a]).unwrap(), to_canonical_json(&[b]).unwrap());
    }

    #[test]
    fn password_history_is_capped() {
        let mut fields = ItemFields::Login {
            username: "u".into(),
            password: SecretString::new("p"),
            urls: vec![],
            totp_secret: None,
            notes: String::new(),
            password_history: vec![],
        };
        for i in 0..(MAX_PASSWORD_HISTORY + 5) {
            fields.record_password_change(SecretString::new(format!("old-{i}")), now());
        }
        if let ItemFields::Login { password_history, .. } = &fields {
            assert_eq!(password_history.len(), MAX_PASSWORD_HISTORY);
            assert_eq!(password_history[0].password.expose(), "old-5");
        } else {
            unreachable!()
        }
    }

    #[test]
    fn debug_never_exposes_secret_contents() {
        let secret = SecretString::new("hunter2");
        assert_eq!(format!("{secret:?}"), "SecretString(REDACTED)");
    }
}
