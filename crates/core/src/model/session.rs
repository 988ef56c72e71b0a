use serde_json::{Map, Value};
use thiserror::Error;

use crate::canon;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionRecordError {
    #[error("session record is not a JSON object")]
    NotAnObject,
}

const MODE_FIELDS: &[&str] = &["mode", "gameMode", "game_mode", "activity", "type"];
const LIST_FIELDS: &[&str] = &[
    "listIdentifier",
    "listName",
    "list_name",
    "listId",
    "list_id",
    "list",
    "wordList",
    "word_list",
    "file",
    "filePath",
    "file_path",
];
const TOTAL_FIELDS: &[&str] = &["total", "totalQuestions", "total_questions"];
const MAX_FIELDS: &[&str] = &["max", "maxScore", "max_score"];
const CORRECT_FIELDS: &[&str] = &["correct", "correctAnswers", "correct_answers"];
const METADATA_FIELDS: &[&str] = &["metadata", "meta", "details"];

/// Metadata keys that may carry an alternate list or grammar rule name.
const METADATA_NAME_HINTS: &[&str] = &[
    "listName",
    "list_name",
    "listId",
    "list_id",
    "list",
    "file",
    "filePath",
    "file_path",
    "grammarName",
    "grammar_name",
    "grammarFile",
    "grammar_file",
    "ruleName",
    "rule_name",
    "name",
    "title",
];

/// One completed practice run, normalized from whatever shape the quiz
/// screens wrote at the time.
///
/// At most one score representation is expected per record; when several are
/// present, [`SessionRecord::percentage`] applies a fixed precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRecord {
    pub mode: Option<String>,
    pub list_identifier: Option<String>,
    pub score: Option<f64>,
    pub total: Option<f64>,
    pub max: Option<f64>,
    pub accuracy: Option<f64>,
    pub correct: Option<f64>,
    pub category: Option<String>,
    pub metadata: Map<String, Value>,
}

impl SessionRecord {
    /// Record for `mode` run against `list` with no score yet.
    #[must_use]
    pub fn new(mode: impl Into<String>, list: impl Into<String>) -> Self {
        Self {
            mode: Some(mode.into()),
            list_identifier: Some(list.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_score(mut self, score: f64, total: f64) -> Self {
        self.score = Some(score);
        self.total = Some(total);
        self
    }

    #[must_use]
    pub fn with_score_of_max(mut self, score: f64, max: f64) -> Self {
        self.score = Some(score);
        self.max = Some(max);
        self
    }

    #[must_use]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    #[must_use]
    pub fn with_correct(mut self, correct: f64, total: f64) -> Self {
        self.correct = Some(correct);
        self.total = Some(total);
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Normalize one raw record. For every field the first present alias wins.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError::NotAnObject` if `raw` is not a JSON object.
    pub fn from_json(raw: &Value) -> Result<Self, SessionRecordError> {
        let obj = raw.as_object().ok_or(SessionRecordError::NotAnObject)?;

        let metadata = METADATA_FIELDS
            .iter()
            .find_map(|field| obj.get(*field).and_then(Value::as_object))
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            mode: first_string(obj, MODE_FIELDS),
            list_identifier: first_string(obj, LIST_FIELDS),
            score: first_number(obj, &["score"]),
            total: first_number(obj, TOTAL_FIELDS),
            max: first_number(obj, MAX_FIELDS),
            accuracy: first_number(obj, &["accuracy"]),
            correct: first_number(obj, CORRECT_FIELDS),
            category: first_string(obj, &["category"]),
            metadata,
        })
    }

    /// Derived 0–100 percentage, or `None` if the record carries no usable
    /// score.
    ///
    /// Precedence: `score/total` (total > 0), `score/max` (max > 0),
    /// `accuracy`, `correct/total` (total > 0).
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        let raw = match (self.score, self.total, self.max) {
            (Some(score), Some(total), _) if total > 0.0 => Some(score / total * 100.0),
            (Some(score), _, Some(max)) if max > 0.0 => Some(score / max * 100.0),
            _ => None,
        }
        .or_else(|| {
            self.accuracy
                .map(|acc| if acc > 1.0 { acc } else { acc * 100.0 })
        })
        .or_else(|| match (self.correct, self.total) {
            (Some(correct), Some(total)) if total > 0.0 => Some(correct / total * 100.0),
            _ => None,
        })?;

        raw.is_finite().then(|| raw.clamp(0.0, 100.0))
    }

    /// Canonical form of the session's mode.
    #[must_use]
    pub fn canonical_mode(&self) -> String {
        canon::canonical_mode(self.mode.as_deref().unwrap_or_default())
    }

    /// Every name this record can be matched by: its own list identifier
    /// followed by metadata hints. Blank values are skipped.
    #[must_use]
    pub fn candidate_names(&self) -> Vec<&str> {
        let own = self.list_identifier.as_deref().into_iter();
        let hints = METADATA_NAME_HINTS
            .iter()
            .filter_map(|key| self.metadata.get(*key).and_then(Value::as_str));
        own.chain(hints).filter(|name| !name.trim().is_empty()).collect()
    }

    /// True when the record has no identifying name at all.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.candidate_names().is_empty()
    }

    /// Grammar sessions share mode names with word lists, so they are told
    /// apart by category, mode namespace or naming.
    #[must_use]
    pub fn is_grammar(&self) -> bool {
        if canon::normalize(self.category.as_deref()) == "grammar" {
            return true;
        }
        if canon::is_grammar_mode(&self.canonical_mode()) {
            return true;
        }
        self.candidate_names()
            .iter()
            .any(|name| canon::normalize_str(name).contains("grammar"))
    }

    /// Level number from metadata `level`, then from `level<N>` in a name.
    #[must_use]
    pub fn level_hint(&self) -> Option<u32> {
        let from_meta = self.metadata.get("level").and_then(|v| match v {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        from_meta.or_else(|| {
            self.candidate_names()
                .iter()
                .find_map(|name| find_level_number(&canon::normalize_str(name)))
        })
    }
}

/// Finds the first `level` followed by an optional single separator and
/// digits, e.g. `level2`, `level_2`, `level 2`.
fn find_level_number(value: &str) -> Option<u32> {
    let mut rest = value;
    while let Some(idx) = rest.find("level") {
        let after = &rest[idx + "level".len()..];
        let after = after
            .strip_prefix(['_', '-', ' ', '/'])
            .unwrap_or(after);
        let digits: String = after.chars().take_while(char::is_ascii_digit).collect();
        if let Ok(level) = digits.parse() {
            return Some(level);
        }
        rest = &rest[idx + "level".len()..];
    }
    None
}

fn first_string(obj: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match obj.get(*field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_number(obj: &Map<String, Value>, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|field| match obj.get(*field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}
