use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Authenticated user identifier as handed out by the identity provider.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Creates a `UserId`, rejecting blank identifiers.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Length of the derived cache namespace key.
const USER_KEY_LEN: usize = 12;

/// Short, URL-safe namespace derived from a [`UserId`].
///
/// This is obfuscation for cache keys, not a security boundary.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserKey(String);

impl UserKey {
    #[must_use]
    pub fn derive(user: &UserId) -> Self {
        let digest = Sha256::digest(user.as_str().as_bytes());
        let mut encoded = URL_SAFE_NO_PAD.encode(digest);
        encoded.truncate(USER_KEY_LEN);
        Self(encoded)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Name of a cached aggregate, e.g. `level1_progress`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheType(String);

impl CacheType {
    pub const LEVEL1_PROGRESS: &'static str = "level1_progress";
    pub const LEVEL2_PROGRESS: &'static str = "level2_progress";
    pub const LEVEL3_PROGRESS: &'static str = "level3_progress";
    pub const LEVEL4_PROGRESS: &'static str = "level4_progress";
    pub const PHONICS_PROGRESS: &'static str = "phonics_progress";
    pub const LEVEL_STARS: &'static str = "level_stars";

    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn level_progress(level: u8) -> Self {
        Self(format!("level{level}_progress"))
    }

    #[must_use]
    pub fn grammar_level(level: u8) -> Self {
        Self(format!("grammar_level{level}_progress"))
    }

    #[must_use]
    pub fn phonics() -> Self {
        Self::new(Self::PHONICS_PROGRESS)
    }

    #[must_use]
    pub fn level_stars() -> Self {
        Self::new(Self::LEVEL_STARS)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Debug for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserKey({})", self.0)
    }
}

impl fmt::Debug for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheType({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_user_id_is_rejected() {
        assert!(UserId::new("   ").is_none());
        assert_eq!(UserId::new("u-1").unwrap().as_str(), "u-1");
    }

    #[test]
    fn user_key_is_short_stable_and_url_safe() {
        let user = UserId::new("student@example.com").unwrap();
        let key = UserKey::derive(&user);
        assert_eq!(key.as_str().len(), 12);
        assert_eq!(key, UserKey::derive(&user));
        assert!(
            key.as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert!(!key.as_str().contains("student"));
    }

    #[test]
    fn different_users_get_different_keys() {
        let a = UserKey::derive(&UserId::new("alice").unwrap());
        let b = UserKey::derive(&UserId::new("bob").unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn cache_type_helpers_format_names() {
        assert_eq!(CacheType::grammar_level(2).as_str(), "grammar_level2_progress");
        assert_eq!(CacheType::level_progress(3).as_str(), CacheType::LEVEL3_PROGRESS);
        assert_eq!(CacheType::level_stars().to_string(), "level_stars");
    }
}
