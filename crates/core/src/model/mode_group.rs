use serde::{Deserialize, Serialize};

use crate::canon::{LEVEL_UP, LISTEN_AND_SPELL, LISTENING, MEANING, MULTI_CHOICE, SENTENCE};

const GENERAL_MODES: &[&str] = &[MEANING, LISTENING, MULTI_CHOICE, LISTEN_AND_SPELL, SENTENCE, LEVEL_UP];
const PHONICS_MODES: &[&str] = &[LISTENING, LISTEN_AND_SPELL, MULTI_CHOICE, MEANING];
const GRAMMAR_MODES: &[&str] = &[
    "grammar_lesson",
    "grammar_choose",
    "grammar_fill_gap",
    "grammar_sentence_order",
];

/// Fixed set of canonical modes that together make up 100% for one kind of
/// list. Every mode weighs the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeGroup {
    name: String,
    modes: Vec<String>,
}

impl ModeGroup {
    /// Custom group. Duplicate modes are kept once, in first-seen order.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, modes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for mode in modes {
            let mode = mode.into();
            if !unique.contains(&mode) {
                unique.push(mode);
            }
        }
        Self {
            name: name.into(),
            modes: unique,
        }
    }

    #[must_use]
    pub fn general() -> Self {
        Self::new("general", GENERAL_MODES.iter().copied())
    }

    #[must_use]
    pub fn phonics() -> Self {
        Self::new("phonics", PHONICS_MODES.iter().copied())
    }

    #[must_use]
    pub fn grammar() -> Self {
        Self::new("grammar", GRAMMAR_MODES.iter().copied())
    }

    /// Looks up one of the built-in groups by name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "general" => Some(Self::general()),
            "phonics" => Some(Self::phonics()),
            "grammar" => Some(Self::grammar()),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn modes(&self) -> &[String] {
        &self.modes
    }
}
