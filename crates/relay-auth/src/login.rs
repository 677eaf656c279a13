//! Login policy that gates credential issuance.

use serde::Deserialize;

/// Body of `POST /login`.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginRequest {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// Decides whether a login request may receive a credential.
pub trait Authenticator: Send + Sync {
    /// Return `true` when the request carries valid credentials.
    fn authenticate(&self, request: &LoginRequest) -> bool;
}

/// A single fixed username/password pair.
#[derive(Clone, Debug)]
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    /// Accept exactly this pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Authenticator for StaticCredentials {
    fn authenticate(&self, request: &LoginRequest) -> bool {
        !self.username.is_empty()
            && request.username == self.username
            && request.password == self.password
    }
}
