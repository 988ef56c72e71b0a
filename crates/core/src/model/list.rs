use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canon;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ListDescriptorError {
    #[error("list identifier cannot be empty")]
    EmptyIdentifier,
}

/// Coarse family a list belongs to; decides which matching strategies apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListFamily {
    #[default]
    Word,
    Phonics,
    Grammar,
}

/// One trackable content list as shown in a menu.
///
/// Supplied by the caller for the lifetime of a render; the engine never
/// builds these itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawListDescriptor")]
pub struct ListDescriptor {
    identifier: String,
    #[serde(alias = "label")]
    display_label: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    family: ListFamily,
}

/// Wire form of [`ListDescriptor`]; validated through `ListDescriptor::new`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListDescriptor {
    identifier: String,
    #[serde(alias = "label")]
    display_label: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    family: ListFamily,
}

impl TryFrom<RawListDescriptor> for ListDescriptor {
    type Error = ListDescriptorError;

    fn try_from(raw: RawListDescriptor) -> Result<Self, Self::Error> {
        Ok(Self::new(raw.identifier, raw.display_label)?
            .with_aliases(raw.aliases)
            .with_family(raw.family))
    }
}

impl ListDescriptor {
    /// # Errors
    ///
    /// Returns `ListDescriptorError::EmptyIdentifier` for a blank identifier.
    pub fn new(
        identifier: impl Into<String>,
        display_label: impl Into<String>,
    ) -> Result<Self, ListDescriptorError> {
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return Err(ListDescriptorError::EmptyIdentifier);
        }
        Ok(Self {
            identifier,
            display_label: display_label.into(),
            aliases: Vec::new(),
            family: ListFamily::Word,
        })
    }

    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_family(mut self, family: ListFamily) -> Self {
        self.family = family;
        self
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn display_label(&self) -> &str {
        &self.display_label
    }

    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    #[must_use]
    pub fn family(&self) -> ListFamily {
        self.family
    }

    /// Grammar lists either say so explicitly or carry `grammar` in their key.
    #[must_use]
    pub fn is_grammar(&self) -> bool {
        self.family == ListFamily::Grammar
            || canon::canonical_key(&self.identifier).contains("grammar")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_identifier() {
        assert_eq!(
            ListDescriptor::new("  ", "Empty"),
            Err(ListDescriptorError::EmptyIdentifier)
        );
    }

    #[test]
    fn grammar_family_is_explicit_or_named() {
        let explicit = ListDescriptor::new("past_simple", "Past Simple")
            .unwrap()
            .with_family(ListFamily::Grammar);
        assert!(explicit.is_grammar());

        let named = ListDescriptor::new("grammar/level1/articles.json", "Articles").unwrap();
        assert!(named.is_grammar());

        let word = ListDescriptor::new("Animals.json", "Animals").unwrap();
        assert!(!word.is_grammar());
    }

    #[test]
    fn deserializes_with_label_alias_and_defaults() {
        let list: ListDescriptor =
            serde_json::from_str(r#"{"identifier":"Animals.json","label":"Animals"}"#).unwrap();
        assert_eq!(list.display_label(), "Animals");
        assert!(list.aliases().is_empty());
        assert_eq!(list.family(), ListFamily::Word);
    }

    #[test]
    fn deserializing_a_blank_identifier_fails() {
        let err = serde_json::from_str::<ListDescriptor>(r#"{"identifier":" ","label":"x"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("list identifier cannot be empty"));

        let grammar: ListDescriptor = serde_json::from_str(
            r#"{"identifier":"past_simple","displayLabel":"Past","aliases":["ps"],"family":"grammar"}"#,
        )
        .unwrap();
        assert_eq!(grammar.aliases(), ["ps".to_string()]);
        assert!(grammar.is_grammar());
    }
}
