//! Session store: authentication token and current user identity.
//!
//! The token is persisted under [`keys::AUTH_TOKEN`] so a session survives
//! process restarts. On startup [`SessionStore::restore`] re-validates it
//! against the backend; a rejected token clears the persisted value and the
//! in-memory session together.
//!
//! Every identity change (login, logout, manual token) advances a session
//! epoch while holding the state lock. A restore that observes a different
//! epoch when its profile request returns discards its result, so a user
//! who logged out mid-restore is never signed back in.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use clickcart_core::{Role, UserId};

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::gateway::{BackendGateway, Credentials, GatewayError, SignInResponse};
use crate::models::{Session, SignInRequest, SignUpRequest, UserProfile};
use crate::storage::{KeyValueStore, keys};

/// What [`SessionStore::restore`] did.
#[derive(Debug)]
pub enum RestoreOutcome {
    /// Nothing was persisted.
    NoToken,
    /// The persisted token was accepted.
    Restored(UserProfile),
    /// Validation failed; token and session were cleared.
    Cleared(AppError),
    /// The identity changed while validating; the result was discarded.
    Superseded,
}

/// Owner of the session token and user identity.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    gateway: Arc<dyn BackendGateway>,
    storage: Arc<dyn KeyValueStore>,
    session: RwLock<Option<Session>>,
    epoch: AtomicU64,
    loading: watch::Sender<bool>,
}

impl SessionStore {
    /// Create an empty store. It reports loading until [`restore`] finishes.
    ///
    /// [`restore`]: Self::restore
    #[must_use]
    pub fn new(gateway: Arc<dyn BackendGateway>, storage: Arc<dyn KeyValueStore>) -> Self {
        let (loading, _) = watch::channel(true);
        Self {
            inner: Arc::new(SessionStoreInner {
                gateway,
                storage,
                session: RwLock::new(None),
                epoch: AtomicU64::new(0),
                loading,
            }),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, f: impl FnOnce(Option<&Session>) -> T) -> T {
        let guard = self
            .inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(guard.as_ref())
    }

    /// Advance the epoch. Callers hold the write lock.
    fn bump_epoch(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn persist_token(&self, token: &SecretString) {
        if let Err(e) = self
            .inner
            .storage
            .set(keys::AUTH_TOKEN, token.expose_secret())
        {
            warn!(error = %e, "Failed to persist session token");
        }
    }

    fn forget_token(&self) {
        if let Err(e) = self.inner.storage.remove(keys::AUTH_TOKEN) {
            warn!(error = %e, "Failed to remove persisted session token");
        }
    }

    // =========================================================================
    // Restore
    // =========================================================================

    /// Re-validate a persisted token and load the user profile.
    ///
    /// Always completes the loading signal, whatever the outcome.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> RestoreOutcome {
        let outcome = self.restore_inner().await;
        self.inner.loading.send_replace(false);
        outcome
    }

    async fn restore_inner(&self) -> RestoreOutcome {
        let persisted = match self.inner.storage.get(keys::AUTH_TOKEN) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session token");
                None
            }
        };
        let Some(token) = persisted
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(SecretString::from)
        else {
            debug!("No persisted session token");
            return RestoreOutcome::NoToken;
        };

        // Attach the token and remember which identity generation we are
        // validating.
        let epoch = {
            let mut session = self.write();
            *session = Some(Session::unvalidated(token.clone()));
            self.inner.epoch.load(Ordering::SeqCst)
        };

        let result = self
            .inner
            .gateway
            .fetch_profile(&Credentials::bearer(token.clone()))
            .await;

        let mut session = self.write();
        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            info!("Session changed during restore, discarding result");
            return RestoreOutcome::Superseded;
        }

        match result {
            Ok(payload) => {
                let profile = payload.into_profile();
                *session = Some(Session::validated(token, profile.clone()));
                drop(session);

                set_sentry_user(&profile.id, &profile.username, profile.email.as_deref());
                info!(user_id = %profile.id, "Session restored");
                RestoreOutcome::Restored(profile)
            }
            Err(e) => {
                self.forget_token();
                *session = None;
                drop(session);

                let err = AppError::from(e);
                warn!(error = %err, "Persisted token rejected, session cleared");
                RestoreOutcome::Cleared(err)
            }
        }
    }

    // =========================================================================
    // Login / Register / Logout
    // =========================================================================

    /// Sign in and establish a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoTokenReceived` if the response carries no usable
    /// token, the backend's message as `AppError::Validation` if it rejected
    /// the credentials, or `AppError::Network` on transport failure. The
    /// session is unchanged on error.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: SecretString) -> Result<UserProfile> {
        let request = SignInRequest {
            username: username.trim().to_string(),
            password,
        };

        let body = self
            .inner
            .gateway
            .sign_in(&request)
            .await
            .map_err(|e| relay_error(e, "Login failed"))?;

        let response = SignInResponse::from_body(body)
            .map_err(|e| AppError::MalformedResponse(e.to_string()))?
            .ok_or(AppError::NoTokenReceived)?;

        let profile = response.profile.into_profile();
        {
            let mut session = self.write();
            self.bump_epoch();
            self.persist_token(&response.token);
            *session = Some(Session::validated(response.token, profile.clone()));
        }

        set_sentry_user(&profile.id, &profile.username, profile.email.as_deref());
        add_breadcrumb("auth", "Signed in", Some(&[("username", profile.username.as_str())]));
        info!(user_id = %profile.id, "Signed in");

        Ok(profile)
    }

    /// Create an account. Does not sign in.
    ///
    /// # Errors
    ///
    /// Returns the backend's message as `AppError::Validation` (for example
    /// a taken username), or `AppError::Network` on transport failure.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: &SignUpRequest) -> Result<Value> {
        self.inner
            .gateway
            .sign_up(request)
            .await
            .map_err(|e| relay_error(e, "Registration failed"))
    }

    /// End the session. Local only; never fails.
    #[instrument(skip(self))]
    pub fn logout(&self) {
        {
            let mut session = self.write();
            self.bump_epoch();
            self.forget_token();
            *session = None;
        }

        clear_sentry_user();
        add_breadcrumb("auth", "Signed out", None);
        info!("Signed out");
    }

    /// Persist and attach a token without fetching a profile.
    ///
    /// The current user, if any, is kept.
    #[instrument(skip(self, token))]
    pub fn set_token(&self, token: SecretString) {
        let mut session = self.write();
        self.bump_epoch();
        self.persist_token(&token);
        let user = session.take().and_then(|s| s.user);
        *session = Some(Session { token, user });
        debug!("Session token set manually");
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Authorization for backend calls made on behalf of this session.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        self.read(|session| {
            session.map_or_else(Credentials::anonymous, |s| {
                Credentials::bearer(s.token.clone())
            })
        })
    }

    /// Credentials and the validated user id, read together.
    pub(crate) fn identity(&self) -> (Credentials, Option<UserId>) {
        self.read(|session| {
            session.map_or_else(
                || (Credentials::anonymous(), None),
                |s| {
                    (
                        Credentials::bearer(s.token.clone()),
                        s.user.as_ref().map(|u| u.id),
                    )
                },
            )
        })
    }

    /// Whether a token is attached (validated or not).
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.read(|session| session.is_some())
    }

    /// The signed-in user, if validated.
    #[must_use]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.read(|session| session.and_then(|s| s.user.clone()))
    }

    /// Whether a validated user is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read(|session| session.is_some_and(|s| s.user.is_some()))
    }

    /// Whether the current user is an administrator. False without a user.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.read(|session| {
            session
                .and_then(|s| s.user.as_ref())
                .is_some_and(|u| u.has_role(&Role::Admin))
        })
    }

    /// Whether restore has not finished yet.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        *self.inner.loading.borrow()
    }

    /// Receiver that flips to `false` once restore completes.
    #[must_use]
    pub fn loading_signal(&self) -> watch::Receiver<bool> {
        self.inner.loading.subscribe()
    }

    /// Drop the in-memory identity, keeping the persisted token so a later
    /// process can restore it.
    pub fn teardown(&self) {
        let mut session = self.write();
        self.bump_epoch();
        *session = None;
        debug!("Session store torn down");
    }
}

/// Surface the backend's message if it sent one, otherwise `fallback`.
/// Transport and parse failures keep their own kind.
fn relay_error(err: GatewayError, fallback: &str) -> AppError {
    if let Some(message) = err.backend_message() {
        return AppError::Validation(message.to_string());
    }
    match AppError::from(err) {
        err @ (AppError::Network(_) | AppError::MalformedResponse(_)) => err,
        _ => AppError::Validation(fallback.to_string()),
    }
}
