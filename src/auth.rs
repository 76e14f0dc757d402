//! Auth token seam. Authentication itself is external; callers only need a bearer token or none.

use async_trait::async_trait;

#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Current bearer token, or `None` for an unauthenticated user.
    async fn auth_token(&self) -> Option<String>;
}

/// Fixed token (or fixed absence of one).
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn auth_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub const DEFAULT_VAR: &'static str = "GENCHAIN_AUTH_TOKEN";

    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvToken {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

#[async_trait]
impl TokenSource for EnvToken {
    async fn auth_token(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }
}
