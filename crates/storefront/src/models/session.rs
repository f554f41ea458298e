//! Session-related types.

use secrecy::SecretString;

use super::UserProfile;

/// The authenticated session: a token plus, once validated, the user.
///
/// `user` is only set after the backend accepted `token`. A session created
/// through the out-of-band token injection path carries no user until the
/// next restore.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque bearer token.
    pub token: SecretString,
    /// Identity resolved from the token.
    pub user: Option<UserProfile>,
}

impl Session {
    /// A session whose token has not been validated yet.
    #[must_use]
    pub const fn unvalidated(token: SecretString) -> Self {
        Self { token, user: None }
    }

    /// A session with a validated identity.
    #[must_use]
    pub const fn validated(token: SecretString, user: UserProfile) -> Self {
        Self {
            token,
            user: Some(user),
        }
    }
}
