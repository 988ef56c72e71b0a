//! Name canonicalization.
//!
//! Session history has been written by many versions of the quiz screens, so
//! list names and mode names show up as file names, paths, display labels,
//! kebab-case, spaced words and so on. Everything here is pure and idempotent:
//! applying a transform to its own output returns the same value.

use std::collections::BTreeSet;

/// Suffixes treated as file extensions by [`strip_extension`].
const EXTENSIONS: [&str; 5] = [".json", ".jsonl", ".txt", ".csv", ".md"];

/// Canonical mode returned for inputs that match nothing in the table.
pub const UNKNOWN_MODE: &str = "unknown";

pub const MEANING: &str = "meaning";
pub const LISTENING: &str = "listening";
pub const MULTI_CHOICE: &str = "multi_choice";
pub const LISTEN_AND_SPELL: &str = "listen_and_spell";
pub const SENTENCE: &str = "sentence";
pub const LEVEL_UP: &str = "level_up";

/// Historical spellings, keyed by their canonical key.
const MODE_ALIASES: &[(&str, &str)] = &[
    ("meaning", MEANING),
    ("meanings", MEANING),
    ("word_meaning", MEANING),
    ("definition", MEANING),
    ("definitions", MEANING),
    ("match_meaning", MEANING),
    ("flashcard", MEANING),
    ("flashcards", MEANING),
    ("listening", LISTENING),
    ("listen", LISTENING),
    ("listen_choose", LISTENING),
    ("listen_and_choose", LISTENING),
    ("audio", LISTENING),
    ("audio_choice", LISTENING),
    ("multi_choice", MULTI_CHOICE),
    ("multichoice", MULTI_CHOICE),
    ("multiple_choice", MULTI_CHOICE),
    ("read", MULTI_CHOICE),
    ("read_and_choose", MULTI_CHOICE),
    ("reading", MULTI_CHOICE),
    ("picture", MULTI_CHOICE),
    ("pictures", MULTI_CHOICE),
    ("picture_choice", MULTI_CHOICE),
    ("picture_multi_choice", MULTI_CHOICE),
    ("listen_and_spell", LISTEN_AND_SPELL),
    ("listen_spell", LISTEN_AND_SPELL),
    ("listenandspell", LISTEN_AND_SPELL),
    ("spelling", LISTEN_AND_SPELL),
    ("spell", LISTEN_AND_SPELL),
    ("dictation", LISTEN_AND_SPELL),
    ("sentence", SENTENCE),
    ("sentences", SENTENCE),
    ("sentence_builder", SENTENCE),
    ("build_sentence", SENTENCE),
    ("fill_blank", SENTENCE),
    ("fill_in_blank", SENTENCE),
    ("level_up", LEVEL_UP),
    ("levelup", LEVEL_UP),
    ("challenge", LEVEL_UP),
    ("boss", LEVEL_UP),
    ("level_up_challenge", LEVEL_UP),
];

/// Trim and lower-case. `None` becomes the empty string.
#[must_use]
pub fn normalize<S: AsRef<str>>(value: Option<S>) -> String {
    value
        .map(|v| v.as_ref().trim().to_lowercase())
        .unwrap_or_default()
}

/// Shorthand for `normalize(Some(value))`.
#[must_use]
pub fn normalize_str(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Remove one trailing file extension such as `.json`.
#[must_use]
pub fn strip_extension(value: &str) -> &str {
    for ext in EXTENSIONS {
        if value.len() > ext.len() && value.is_char_boundary(value.len() - ext.len()) {
            let (head, tail) = value.split_at(value.len() - ext.len());
            if tail.eq_ignore_ascii_case(ext) {
                return head;
            }
        }
    }
    value
}

/// Comparable key: normalized, extension stripped, every run of
/// non-alphanumeric characters collapsed to `_`, outer underscores trimmed.
#[must_use]
pub fn canonical_key(value: &str) -> String {
    let normalized = normalize_str(value);
    collapse_non_alnum(strip_extension(&normalized))
}

fn collapse_non_alnum(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_sep = false;
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    out
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Map a raw mode spelling onto one of the canonical mode keys.
///
/// Grammar modes are already namespaced and pass through with whitespace
/// runs turned into underscores. Anything unrecognised becomes
/// [`UNKNOWN_MODE`].
#[must_use]
pub fn canonical_mode(raw: &str) -> String {
    let normalized = normalize_str(raw);
    if normalized.is_empty() {
        return UNKNOWN_MODE.to_owned();
    }
    if normalized.contains("grammar") {
        return collapse_whitespace(&normalized);
    }
    let key = collapse_non_alnum(&normalized);
    MODE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map_or_else(|| UNKNOWN_MODE.to_owned(), |(_, mode)| (*mode).to_owned())
}

/// True for the grammar mode namespace.
#[must_use]
pub fn is_grammar_mode(mode: &str) -> bool {
    mode.contains("grammar")
}

/// Final segment of a path-like value, if the value has a separator.
#[must_use]
pub fn last_segment(value: &str) -> Option<&str> {
    let trimmed = value.trim().trim_end_matches(['/', '\\']);
    trimmed
        .rfind(['/', '\\'])
        .map(|idx| &trimmed[idx + 1..])
        .filter(|seg| !seg.trim().is_empty())
}

/// Every plausible comparable form of `value`.
///
/// Covers the normalized value with and without its extension, with
/// whitespace collapsed to underscores, the full canonical key, and the same
/// forms for the final path segment when `value` looks like a path.
#[must_use]
pub fn build_alias_keys(value: &str) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    push_forms(&mut keys, value);
    if let Some(segment) = last_segment(value) {
        push_forms(&mut keys, segment);
    }
    keys.retain(|k| !k.is_empty());
    keys
}

fn push_forms(keys: &mut BTreeSet<String>, value: &str) {
    let normalized = normalize_str(value);
    let stripped = strip_extension(&normalized).to_owned();
    keys.insert(collapse_whitespace(&normalized));
    keys.insert(collapse_whitespace(&stripped));
    keys.insert(canonical_key(&normalized));
    keys.insert(normalized);
    keys.insert(stripped);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_missing_values() {
        assert_eq!(normalize::<&str>(None), "");
        assert_eq!(normalize(Some("  Animals ")), "animals");
    }

    #[test]
    fn strip_extension_only_removes_known_suffix() {
        assert_eq!(strip_extension("animals.json"), "animals");
        assert_eq!(strip_extension("Animals.JSON"), "Animals");
        assert_eq!(strip_extension("level 1.5"), "level 1.5");
        assert_eq!(strip_extension(".json"), ".json");
    }

    #[test]
    fn canonical_key_collapses_punctuation() {
        assert_eq!(canonical_key("  Level-1 / Farm Animals.json "), "level_1_farm_animals");
        assert_eq!(canonical_key("__Hello,,World__"), "hello_world");
        assert_eq!(canonical_key("!!!"), "");
    }

    #[test]
    fn canonical_key_is_idempotent() {
        let samples = [
            "Animals.json",
            "data/words/Level1 Fruits.json",
            "  mixed--Case__ and   spaces ",
            "Ünïcode Wörds.txt",
            "a.json.json",
            "",
            "___",
        ];
        for sample in samples {
            let once = canonical_key(sample);
            assert_eq!(canonical_key(&once), once, "input {sample:?}");
        }
    }

    #[test]
    fn canonical_mode_collapses_spellings() {
        assert_eq!(canonical_mode("Read"), MULTI_CHOICE);
        assert_eq!(canonical_mode("picture-choice"), MULTI_CHOICE);
        assert_eq!(canonical_mode("Multiple Choice"), MULTI_CHOICE);
        assert_eq!(canonical_mode("Listen & Spell"), LISTEN_AND_SPELL);
        assert_eq!(canonical_mode("levelUp"), LEVEL_UP);
        assert_eq!(canonical_mode("meaning"), MEANING);
    }

    #[test]
    fn canonical_mode_keeps_grammar_namespace() {
        assert_eq!(canonical_mode("Grammar Fill Gap"), "grammar_fill_gap");
        assert_eq!(canonical_mode("grammar-choose"), "grammar-choose");
    }

    #[test]
    fn canonical_mode_falls_back_to_unknown() {
        assert_eq!(canonical_mode(""), UNKNOWN_MODE);
        assert_eq!(canonical_mode("space invaders"), UNKNOWN_MODE);
        assert_eq!(canonical_mode(UNKNOWN_MODE), UNKNOWN_MODE);
    }

    #[test]
    fn canonical_mode_is_idempotent() {
        for raw in ["Read", "Grammar  Lesson", "LISTEN", "nope", "fill in blank"] {
            let once = canonical_mode(raw);
            assert_eq!(canonical_mode(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn alias_keys_cover_paths_and_extensions() {
        let keys = build_alias_keys("lists/Level1/Farm Animals.json");
        assert!(keys.contains("farm animals"));
        assert!(keys.contains("farm_animals"));
        assert!(keys.contains("farm animals.json"));
        assert!(keys.contains("lists_level1_farm_animals"));
        assert!(!keys.contains(""));
    }

    #[test]
    fn last_segment_requires_separator() {
        assert_eq!(last_segment("a/b/c.json"), Some("c.json"));
        assert_eq!(last_segment(r"a\b"), Some("b"));
        assert_eq!(last_segment("plain"), None);
        assert_eq!(last_segment("dir/"), None);
    }
}
