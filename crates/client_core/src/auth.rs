//! Bearer token captured once at startup and attached to every request.

use std::fmt;

use tracing::{debug, info};
use url::Url;

use crate::store::{KeyValueStore, StoreError};

pub const BEARER_QUERY_PARAM: &str = "bearer";
pub const SESSION_TOKEN_KEY: &str = "authToken";
const BEARER_PREFIX: &str = "Bearer ";

#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Blank input yields `None`.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let raw = raw.as_ref().trim();
        (!raw.is_empty()).then(|| Self(raw.to_string()))
    }

    /// Accepts the persisted `Bearer <token>` form as well as a bare token.
    pub fn from_header_value(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::new(value.strip_prefix(BEARER_PREFIX).unwrap_or(value))
    }

    pub fn header_value(&self) -> String {
        format!("{BEARER_PREFIX}{}", self.0)
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

pub fn token_from_launch_url(url: &Url) -> Option<BearerToken> {
    url.query_pairs()
        .find(|(key, _)| key == BEARER_QUERY_PARAM)
        .and_then(|(_, value)| BearerToken::new(value))
}

/// Resolves the session credential: a token supplied at launch wins and is
/// persisted to the session store; otherwise the previously persisted one is
/// reused. The result stays fixed for the lifetime of the process.
pub fn capture_bearer_token(
    launch_token: Option<BearerToken>,
    session: &dyn KeyValueStore,
) -> Result<Option<BearerToken>, StoreError> {
    if let Some(token) = launch_token {
        session.set(SESSION_TOKEN_KEY, &token.header_value())?;
        info!("auth: bearer token captured from launch parameters");
        return Ok(Some(token));
    }

    let stored = session
        .get(SESSION_TOKEN_KEY)?
        .and_then(|value| BearerToken::from_header_value(&value));
    match &stored {
        Some(_) => info!("auth: reusing bearer token from session store"),
        None => debug!("auth: no bearer token available, requests go out unauthenticated"),
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn launch_url_token_is_read_from_bearer_param() {
        let url = Url::parse("http://localhost:5173/post/4?theme=dark&bearer=s3cret").expect("url");
        assert_eq!(
            token_from_launch_url(&url).map(|t| t.secret().to_string()),
            Some("s3cret".to_string())
        );

        let url = Url::parse("http://localhost:5173/?bearer=").expect("url");
        assert!(token_from_launch_url(&url).is_none());
    }

    #[test]
    fn launch_token_is_persisted_with_bearer_prefix() {
        let session = MemoryStore::new();
        let token = capture_bearer_token(BearerToken::new("abc"), &session)
            .expect("capture")
            .expect("token");

        assert_eq!(token.header_value(), "Bearer abc");
        assert_eq!(
            session.get(SESSION_TOKEN_KEY).expect("get").as_deref(),
            Some("Bearer abc")
        );
    }

    #[test]
    fn persisted_token_is_reused_when_launch_has_none() {
        let session = MemoryStore::new();
        session.set(SESSION_TOKEN_KEY, "Bearer kept").expect("seed");

        let token = capture_bearer_token(None, &session)
            .expect("capture")
            .expect("token");
        assert_eq!(token.secret(), "kept");
    }

    #[test]
    fn launch_token_replaces_persisted_token() {
        let session = MemoryStore::new();
        session.set(SESSION_TOKEN_KEY, "Bearer old").expect("seed");

        let token = capture_bearer_token(BearerToken::new("new"), &session)
            .expect("capture")
            .expect("token");
        assert_eq!(token.secret(), "new");
        assert_eq!(
            session.get(SESSION_TOKEN_KEY).expect("get").as_deref(),
            Some("Bearer new")
        );
    }

    #[test]
    fn absent_everywhere_yields_no_token() {
        let session = MemoryStore::new();
        assert!(capture_bearer_token(None, &session).expect("capture").is_none());
    }

    #[test]
    fn debug_output_does_not_leak_the_secret() {
        let token = BearerToken::new("topsecret").expect("token");
        assert!(!format!("{token:?}").contains("topsecret"));
    }
}
