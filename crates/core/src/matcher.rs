//! Decides whether a session record belongs to a list.
//!
//! Strategies run most specific first: exact (case and whitespace
//! insensitive) name equality, alias-key equality (which also covers the
//! final segment of path-like names), and for grammar lists only a bounded
//! substring check. Anything else is a non-match.

use std::collections::BTreeSet;

use crate::canon::{build_alias_keys, canonical_key, last_segment, normalize_str};
use crate::model::{ListDescriptor, SessionRecord};

/// Shorter key must be at least this long for the grammar substring check.
pub const MIN_SUBSTRING_KEY_LEN: usize = 4;

/// Precomputed comparison keys for one list.
#[derive(Debug, Clone)]
pub struct ListMatcher<'a> {
    list: &'a ListDescriptor,
    exact: BTreeSet<String>,
    alias_keys: BTreeSet<String>,
    substring_keys: Vec<String>,
}

impl<'a> ListMatcher<'a> {
    #[must_use]
    pub fn new(list: &'a ListDescriptor) -> Self {
        let exact = [list.identifier(), list.display_label()]
            .into_iter()
            .map(normalize_str)
            .filter(|s| !s.is_empty())
            .collect();

        let names = std::iter::once(list.identifier()).chain(list.aliases().iter().map(String::as_str));
        let mut alias_keys = BTreeSet::new();
        let mut substring_keys = Vec::new();
        for name in names {
            alias_keys.extend(build_alias_keys(name));
            substring_keys.push(canonical_key(name));
            if let Some(segment) = last_segment(name) {
                substring_keys.push(canonical_key(segment));
            }
        }
        substring_keys.retain(|k| k.chars().count() >= MIN_SUBSTRING_KEY_LEN);
        substring_keys.dedup();

        Self {
            list,
            exact,
            alias_keys,
            substring_keys,
        }
    }

    #[must_use]
    pub fn list(&self) -> &ListDescriptor {
        self.list
    }

    /// True if `candidate` names this list.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let normalized = normalize_str(candidate);
        if normalized.is_empty() {
            return false;
        }
        if self.exact.contains(&normalized) {
            return true;
        }

        let candidate_keys = build_alias_keys(candidate);
        if !candidate_keys.is_disjoint(&self.alias_keys) {
            return true;
        }

        self.list.is_grammar() && self.substring_match(candidate)
    }

    fn substring_match(&self, candidate: &str) -> bool {
        let mut keys = vec![canonical_key(candidate)];
        if let Some(segment) = last_segment(candidate) {
            keys.push(canonical_key(segment));
        }
        keys.iter()
            .filter(|k| k.chars().count() >= MIN_SUBSTRING_KEY_LEN)
            .any(|candidate_key| {
                self.substring_keys.iter().any(|target| {
                    candidate_key.contains(target.as_str()) || target.contains(candidate_key.as_str())
                })
            })
    }

    /// A record belongs to the list if any of its names matches. Records
    /// with no names never match.
    #[must_use]
    pub fn matches_record(&self, record: &SessionRecord) -> bool {
        record
            .candidate_names()
            .into_iter()
            .any(|name| self.matches(name))
    }
}

/// One-off form of [`ListMatcher::matches`].
#[must_use]
pub fn matches(list: &ListDescriptor, candidate: &str) -> bool {
    ListMatcher::new(list).matches(candidate)
}

/// One-off form of [`ListMatcher::matches_record`].
#[must_use]
pub fn record_matches(list: &ListDescriptor, record: &SessionRecord) -> bool {
    ListMatcher::new(list).matches_record(record)
}
