//! Session identity
//!
//! A session groups the per-rider collections (telemetry, recommendations,
//! movement trail) under one key. The key is minted by whoever launches a
//! ride; this crate only needs it to be non-empty and safe to embed in a
//! store path.

use std::fmt;

use thiserror::Error;

/// Session used when nothing selects one explicitly.
pub const DEFAULT_SESSION: &str = "demo-session";

/// Characters that would corrupt a store path if embedded in a key.
const FORBIDDEN_CHARS: &[char] = &['.', '#', '$', '[', ']', '/'];

/// Errors from session identifier validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionIdError {
    /// The identifier was empty or all whitespace
    #[error("session identifier is empty")]
    Empty,
    /// The identifier contained a character that is not allowed in store keys
    #[error("session identifier contains forbidden character '{0}'")]
    ForbiddenChar(char),
}

/// Validated session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Validate a raw identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, SessionIdError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if let Some(bad) = trimmed.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(SessionIdError::ForbiddenChar(bad));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The shared demo session.
    pub fn default_session() -> Self {
        Self(DEFAULT_SESSION.to_string())
    }

    /// Extract the session from a page URL's `session` query parameter.
    ///
    /// Falls back to [`SessionId::default_session`] when the URL does not
    /// parse, carries no `session` parameter, or carries an invalid one.
    /// Viewers opened from a bare link should still see the demo ride.
    pub fn from_page_url(url: &str) -> Self {
        let parsed = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::debug!(url, %error, "unparseable page URL, using default session");
                return Self::default_session();
            }
        };

        parsed
            .query_pairs()
            .find(|(key, _)| key == "session")
            .and_then(|(_, value)| Self::new(value.into_owned()).ok())
            .unwrap_or_else(Self::default_session)
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::default_session()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
