//! Read-only access to the user's authentication token and username.
//!
//! Storage and renewal of credentials belong to the embedding application;
//! this crate only reads them each time a channel (re)connects.

use std::sync::{Arc, PoisonError, RwLock};

/// Token plus username presented when opening a channel.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub username: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
        }
    }

    /// Both fields must be non-empty for a connect attempt to make sense.
    pub fn is_complete(&self) -> bool {
        !self.token.is_empty() && !self.username.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

/// Source of the current credentials, consulted on every connect attempt.
pub trait CredentialSource: Send + Sync + 'static {
    /// Current credentials, or `None` when the user is logged out.
    fn credentials(&self) -> Option<Credentials>;
}

/// A [`CredentialSource`] holding a value that can be swapped or cleared.
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    slot: Arc<RwLock<Option<Credentials>>>,
}

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(credentials))),
        }
    }

    /// A source with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set(&self, credentials: Credentials) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(credentials);
    }

    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl CredentialSource for StaticCredentials {
    fn credentials(&self) -> Option<Credentials> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(Credentials::is_complete)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let creds = Credentials::new("secret-token", "alice");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("alice"));
    }

    #[test]
    fn incomplete_credentials_are_hidden() {
        let source = StaticCredentials::new(Credentials::new("", "alice"));
        assert!(source.credentials().is_none());

        source.set(Credentials::new("tok", "alice"));
        assert_eq!(source.credentials().unwrap().username, "alice");

        source.clear();
        assert!(source.credentials().is_none());
    }

    #[test]
    fn clones_share_the_slot() {
        let source = StaticCredentials::empty();
        let alias = source.clone();
        alias.set(Credentials::new("tok", "bob"));
        assert_eq!(source.credentials().unwrap().username, "bob");
    }
}
