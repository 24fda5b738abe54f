// crates/actions/src/auth.rs

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::info;

use hisho_core::AuthError;

use crate::AuthProvider;

#[derive(Debug, Clone)]
struct Token {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Holds one access token handed over by an external sign-in flow.
#[derive(Debug, Default)]
pub struct StaticTokenAuth {
    token: RwLock<Option<Token>>,
}

impl StaticTokenAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token without expiry.
    pub fn with_token(value: impl Into<String>) -> Self {
        let auth = Self::new();
        auth.store(value.into(), None);
        auth
    }

    pub fn sign_in(&self, value: impl Into<String>, ttl: Duration) {
        self.store(value.into(), Some(Utc::now() + ttl));
    }

    pub fn sign_out(&self) {
        *self.token.write() = None;
        info!("Signed out");
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token.read().as_ref().and_then(|t| t.expires_at)
    }

    fn store(&self, value: String, expires_at: Option<DateTime<Utc>>) {
        *self.token.write() = Some(Token { value, expires_at });
        info!(expires_at = ?expires_at, "Access token stored");
    }

    fn current(&self) -> Result<String, AuthError> {
        match self.token.read().as_ref() {
            None => Err(AuthError::Unauthenticated),
            Some(token) if token.value.is_empty() => Err(AuthError::Unauthenticated),
            Some(Token {
                expires_at: Some(at),
                ..
            }) if *at <= Utc::now() => Err(AuthError::Expired),
            Some(token) => Ok(token.value.clone()),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    fn is_authenticated(&self) -> bool {
        self.current().is_ok()
    }

    async fn access_token(&self) -> Result<String, AuthError> {
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_missing_and_expired_tokens() {
        let auth = StaticTokenAuth::new();
        assert!(!auth.is_authenticated());
        assert_eq!(auth.access_token().await, Err(AuthError::Unauthenticated));

        auth.sign_in("abc", Duration::hours(1));
        assert!(auth.is_authenticated());
        assert_eq!(auth.access_token().await.unwrap(), "abc");

        auth.sign_in("abc", Duration::seconds(-1));
        assert_eq!(auth.access_token().await, Err(AuthError::Expired));

        auth.sign_out();
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn static_token_never_expires() {
        let auth = StaticTokenAuth::with_token("t");
        assert!(auth.is_authenticated());
        assert!(auth.expires_at().is_none());
    }
}
