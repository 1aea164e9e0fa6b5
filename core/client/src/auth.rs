//! Auth collaborator seam.
//!
//! The upload core never touches persistent storage for credentials; it asks
//! an injected provider for the current bearer token. Login, registration,
//! and logout live with whoever owns the provider.

use async_trait::async_trait;
use tokio::sync::RwLock;

use sealpost_common::AuthToken;

/// Source of the bearer token for upload requests.
///
/// Read-only from the core's perspective; a `None` return means no user is
/// signed in and the upload must fail fast without a network call.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Get the current bearer token, if any.
    async fn bearer_token(&self) -> Option<AuthToken>;
}

/// Provider backed by a fixed token, e.g. one passed on the command line.
pub struct StaticToken {
    token: AuthToken,
}

impl StaticToken {
    /// Create a provider that always returns the given token.
    pub fn new(token: AuthToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl AuthProvider for StaticToken {
    async fn bearer_token(&self) -> Option<AuthToken> {
        Some(self.token.clone())
    }
}

/// In-memory token cell for long-lived processes.
///
/// A login collaborator stores the token after sign-in and clears it on
/// logout; concurrent uploads read it through the provider trait.
#[derive(Default)]
pub struct TokenCell {
    token: RwLock<Option<AuthToken>>,
}

impl TokenCell {
    /// Create an empty cell (no user signed in).
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a token after a successful login.
    pub async fn set(&self, token: AuthToken) {
        *self.token.write().await = Some(token);
    }

    /// Clear the token on logout.
    pub async fn clear(&self) {
        *self.token.write().await = None;
    }
}

#[async_trait]
impl AuthProvider for TokenCell {
    async fn bearer_token(&self) -> Option<AuthToken> {
        self.token.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticToken::new(AuthToken::new("abc").unwrap());
        let token = provider.bearer_token().await.unwrap();
        assert_eq!(token.bearer_header(), "Bearer abc");
    }

    #[tokio::test]
    async fn test_token_cell_lifecycle() {
        let cell = TokenCell::new();
        assert!(cell.bearer_token().await.is_none());

        cell.set(AuthToken::new("session-token").unwrap()).await;
        assert!(cell.bearer_token().await.is_some());

        cell.clear().await;
        assert!(cell.bearer_token().await.is_none());
    }
}
