use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::canon::{UNKNOWN_MODE, canonical_key, last_segment};
use crate::model::SessionRecord;

/// Stars earned for one `(list, mode)` best percentage.
///
/// `>= 100` → 5, `> 90` → 4, `> 80` → 3, `> 70` → 2, `>= 60` → 1, else 0.
/// Exactly 90 falls in the `> 80` step and earns 3 stars.
#[must_use]
pub fn stars_for(pct: f64) -> u8 {
    if pct >= 100.0 {
        5
    } else if pct > 90.0 {
        4
    } else if pct > 80.0 {
        3
    } else if pct > 70.0 {
        2
    } else if pct >= 60.0 {
        1
    } else {
        0
    }
}

/// Star totals per bucket (`level1`, `phonics`, `grammar_level2`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StarCounts(BTreeMap<String, u32>);

impl StarCounts {
    /// Stars in `bucket`; 0 when nothing was earned there.
    #[must_use]
    pub fn get(&self, bucket: &str) -> u32 {
        self.0.get(bucket).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Bucket sessions by level, keep the best percentage per
/// `(bucket, list, mode)` and sum the stars of each retained percentage.
#[must_use]
pub fn compute_star_count(sessions: &[SessionRecord]) -> StarCounts {
    let mut best: HashMap<(String, String, String), f64> = HashMap::new();

    for session in sessions {
        let Some(pct) = session.percentage() else {
            continue;
        };
        let mode = session.canonical_mode();
        if mode == UNKNOWN_MODE {
            continue;
        }
        let Some(list_key) = list_key(session) else {
            continue;
        };
        let Some(bucket) = bucket_for(session) else {
            continue;
        };
        best.entry((bucket, list_key, mode))
            .and_modify(|current| *current = current.max(pct))
            .or_insert(pct);
    }

    let mut counts = BTreeMap::new();
    for ((bucket, _, _), pct) in best {
        *counts.entry(bucket).or_insert(0) += u32::from(stars_for(pct));
    }
    StarCounts(counts)
}

fn list_key(session: &SessionRecord) -> Option<String> {
    let primary = *session.candidate_names().first()?;
    let key = canonical_key(last_segment(primary).unwrap_or(primary));
    (!key.is_empty()).then_some(key)
}

fn bucket_for(session: &SessionRecord) -> Option<String> {
    if session.is_grammar() {
        return session
            .level_hint()
            .map(|level| format!("grammar_level{level}"));
    }

    for name in session.candidate_names() {
        let mut keys = vec![canonical_key(name)];
        if let Some(segment) = last_segment(name) {
            keys.push(canonical_key(segment));
        }
        for key in keys {
            if key.starts_with("phonics") {
                return Some("phonics".to_owned());
            }
            if let Some(level) = level_prefix(&key) {
                return Some(format!("level{level}"));
            }
        }
    }
    None
}

/// `level1_animals` and `level_1_animals` both yield 1.
fn level_prefix(key: &str) -> Option<u32> {
    let rest = key.strip_prefix("level")?;
    let rest = rest.strip_prefix('_').unwrap_or(rest);
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
