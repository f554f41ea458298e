//! Explicit request credentials.

use secrecy::{ExposeSecret, SecretString};

/// Authorization capability for backend requests.
///
/// Handed out by the session store; attaching it to a request is the only
/// way a bearer token reaches the wire.
#[derive(Clone, Default)]
pub struct Credentials {
    token: Option<SecretString>,
}

impl Credentials {
    /// No authorization.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { token: None }
    }

    /// Bearer-token authorization.
    #[must_use]
    pub const fn bearer(token: SecretString) -> Self {
        Self { token: Some(token) }
    }

    /// Whether no token is attached.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        self.token.is_none()
    }

    /// The bearer token, for comparing whose session a request runs under.
    pub(crate) const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// Attach the `Authorization` header, if any, to `request`.
    #[must_use]
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.token {
            Some(_) => f.write_str("Credentials::Bearer([REDACTED])"),
            None => f.write_str("Credentials::Anonymous"),
        }
    }
}
