//! Search index (spec §4.10): an in-memory inverted index keyed on
//! `HMAC-SHA256(search_key, token)`. Posting lists store item ids only, never
//! plaintext — if `search_key` is zeroized (lock) the index becomes opaque
//! even to a process that dumps it from memory, and nothing searchable ever
//! touches disk.

use crate::item::{Item, ItemFields};
use crate::secret::Key32;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Tokenizes `text` by lowercasing and splitting on non-alphanumeric runs
/// (spec §4.10).
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extracts a naive eTLD+1 from a URL's host (last two dot-separated
/// labels), so a query for "example.com" matches a stored URL regardless of
/// subdomain or path. Not a full public-suffix-list implementation.
fn etld_plus_one(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = without_scheme.split(['/', ':']).next()?;
    let labels: Vec<&str> = host.split('.').filter(|s| !s.is_empty()).collect();
    if labels.len() < 2 {
        return None;
    }
    Some(labels[labels.len() - 2..].join("."))
}

fn item_tokens(item: &Item) -> Vec<String> {
    let mut tokens = Vec::new();
    tokens.extend(tokenize(&item.title));
    tokens.extend(item.tags.iter().flat_map(|t| tokenize(t)));

    match &item.fields {
        ItemFields::Login {
            username, urls, notes, ..
        } => {
            tokens.extend(tokenize(username));
            tokens.extend(tokenize(notes));
            for url in urls {
                tokens.extend(tokenize(url));
                if let Some(etld1) = etld_plus_one(url) {
                    tokens.push(etld1);
                }
            }
        }
        ItemFields::SecureNote { .. } => {}
        ItemFields::CreditCard { cardholder, brand, .. } => {
            tokens.extend(tokenize(cardholder));
            tokens.extend(tokenize(brand));
        }
        ItemFields::Identity {
            full_name, email, phone, ..
        } => {
            tokens.extend(tokenize(full_name));
            tokens.extend(tokenize(email));
            tokens.extend(tokenize(phone));
        }
    }
    tokens
}

fn hmac_token(search_key: &Key32, token: &str) -> Vec<u8> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(&search_key.0).expect("HMAC accepts any key length");
    mac.update(token.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

#[derive(Clone, Copy)]
struct Ordering {
    favorite: bool,
    modified_at: OffsetDateTime,
}

/// The rebuilt-on-unlock, never-persisted blind index.
pub struct SearchIndex {
    postings: BTreeMap<Vec<u8>, BTreeSet<Uuid>>,
    ordering: BTreeMap<Uuid, Ordering>,
}

impl SearchIndex {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            postings: BTreeMap::new(),
            ordering: BTreeMap::new(),
        }
    }

    /// Rebuilds the index from plaintext items, atomically replacing
    /// whatever was there before (spec §4.10: rebuilt on unlock and after
    /// every mutation).
    pub fn rebuild(search_key: &Key32, items: &[Item]) -> Self {
        let mut postings: BTreeMap<Vec<u8>, BTreeSet<Uuid>> = BTreeMap::new();
        let mut ordering = BTreeMap::new();

        for item in items {
            ordering.insert(
                item.id,
                Ordering {
                    favorite: item.favorite,
                    modified_at: item.modified_at,
                },
            );
            for token in item_tokens(item) {
                let digest = hmac_token(search_key, &token);
                postings.entry(digest).or_default().insert(item.id);
            }
        }

        Self { postings, ordering }
    }

    /// Tokenizes `query` the same way items were tokenized, HMACs each
    /// token, and intersects the posting lists (spec §4.10, invariant 6).
    /// Results are ordered `(favorite desc, modified_at desc)`. A token with
    /// no matches yields an empty result set.
    #[must_use]
    pub fn query(&self, search_key: &Key32, query: &str) -> Vec<Uuid> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut result: Option<BTreeSet<Uuid>> = None;
        for token in &tokens {
            let digest = hmac_token(search_key, token);
            let ids = self.postings.get(&digest).cloned().unwrap_or_default();
            result = Some(match result {
                Some(acc) => acc.intersection(&ids).copied().collect(),
                None => ids,
            });
        }

        let mut ids: Vec<Uuid> = result.unwrap_or_default().into_iter().collect();
        ids.sort_by(|a, b| {
            let oa = self.ordering.get(a);
            let ob = self.ordering.get(b);
            match (oa, ob) {
                (Some(oa), Some(ob)) => ob
                    .favorite
                    .cmp(&oa.favorite)
                    .then_with(|| ob.modified_at.cmp(&oa.modified_at)),
                _ => std::cmp::Ordering::Equal,
            }
        });
        ids
    }
}
