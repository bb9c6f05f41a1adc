//! Auth context: the owner of the session state machine.
//!
//! ARCHITECTURE
//! ============
//! `AuthContext` is a cheap cloneable handle. The session, the generation
//! counter and the broadcast outbox sit behind one mutex that is never held
//! across an await. Storage writes happen under that mutex, so persisted
//! state and in-memory state never disagree.
//!
//! GENERATIONS
//! ===========
//! Every action that starts a sign-in attempt or destroys the session bumps
//! the generation. In-flight calls remember the generation they were issued
//! under; a settlement whose generation is no longer current is dropped and
//! its caller receives `AuthError::Superseded`. Ordering is by generation,
//! not by which response happens to arrive last.
//!
//! BROADCAST
//! =========
//! Each applied transition queues a snapshot. Whoever queued first drains the
//! queue, invoking subscribers outside the lock, so callbacks see transitions
//! in the order they were applied and may call back into the context.

#[cfg(test)]
#[path = "context_test.rs"]
mod context_test;

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::AuthApi;
use crate::error::AuthError;
use crate::storage::SessionStorage;
use crate::types::{AuthResponse, Credentials, RegistrationFields, Session, SessionStatus, UserRecord};
use crate::validate;

type Subscriber = Arc<dyn Fn(&Session) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct State {
    session: Session,
    generation: u64,
    outbox: VecDeque<Session>,
    draining: bool,
}

struct Inner {
    api: Arc<dyn AuthApi>,
    storage: SessionStorage,
    state: Mutex<State>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
}

#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

impl AuthContext {
    /// Create a context in the `Anonymous` state. Call `restore` to pick up a stored session.
    pub fn new(api: Arc<dyn AuthApi>, storage: SessionStorage) -> Self {
        let state = State { session: Session::anonymous(), generation: 0, outbox: VecDeque::new(), draining: false };
        Self {
            inner: Arc::new(Inner {
                api,
                storage,
                state: Mutex::new(state),
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    // =========================================================================
    // READERS
    // =========================================================================

    #[must_use]
    pub fn session(&self) -> Session {
        self.lock_state().session.clone()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.lock_state().session.status
    }

    #[must_use]
    pub fn user(&self) -> Option<UserRecord> {
        self.lock_state().session.user.clone()
    }

    /// Bearer token for other API calls; `None` unless a session exists.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.lock_state().session.token.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status() == SessionStatus::Authenticating
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.lock_state().session.error_message.clone()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock_state().generation
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Register `callback` to receive a snapshot after every applied transition.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.subscribers).push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.inner.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Validate the stored session against the backend at app start.
    ///
    /// Returns the signed-in user, or `None` when the client ends anonymous.
    /// Network and server failures keep a cached user signed in; `Unauthorized`
    /// clears storage, as does any failure when no usable user was cached.
    ///
    /// # Errors
    ///
    /// `ConcurrentOperation` while another sign-in is in flight, `Superseded`
    /// when a newer action settled first.
    pub async fn restore(&self) -> Result<Option<UserRecord>, AuthError> {
        let (generation, token, cached) = {
            let mut state = self.lock_state();
            match state.session.status {
                SessionStatus::Authenticating => return Err(AuthError::ConcurrentOperation),
                SessionStatus::Authenticated => return Ok(state.session.user.clone()),
                SessionStatus::Anonymous | SessionStatus::Error => {}
            }
            let Some(stored) = self.inner.storage.load() else {
                tracing::debug!("no stored session to restore");
                return Ok(None);
            };
            state.generation += 1;
            let generation = state.generation;
            state.session = Session {
                token: Some(stored.token.clone()),
                user: None,
                status: SessionStatus::Authenticating,
                error_message: None,
            };
            tracing::debug!(generation, "restoring stored session");
            self.publish(state);
            (generation, stored.token, stored.user)
        };

        let result = self.inner.api.fetch_current_user(&token).await;

        let mut state = self.lock_state();
        if state.generation != generation {
            tracing::warn!(issued = generation, current = state.generation, "discarding stale restore result");
            return Err(AuthError::Superseded);
        }
        match result {
            Ok(user) => {
                self.persist(&token, &user);
                tracing::info!(user_id = %user.id, "stored session restored");
                state.session = authenticated(token, user.clone());
                self.publish(state);
                Ok(Some(user))
            }
            Err(AuthError::Unauthorized) => {
                self.wipe();
                tracing::info!("stored session rejected; signed out");
                state.session = Session::anonymous();
                self.publish(state);
                Ok(None)
            }
            Err(err) => {
                let outcome = cached.clone();
                match cached {
                    Some(user) => {
                        tracing::warn!(error = %err, user_id = %user.id, "session check failed; continuing with cached user");
                        state.session = authenticated(token, user);
                    }
                    None => {
                        tracing::warn!(error = %err, "session check failed and no cached user; signed out");
                        self.wipe();
                        state.session = Session::anonymous();
                    }
                }
                self.publish(state);
                Ok(outcome)
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Validation and backend failures (also surfaced via `error()`),
    /// `ConcurrentOperation` while another sign-in is in flight, and
    /// `Superseded` when a logout or newer sign-in overtook this call.
    pub async fn login(&self, credentials: Credentials) -> Result<UserRecord, AuthError> {
        let validated = validate::validate_credentials(&credentials).map_err(|errors| validate::to_auth_error(&errors));
        let (generation, credentials, replaced) = self.begin_sign_in("login", validated)?;
        let result = self.inner.api.login(&credentials).await;
        let settled = self.settle_sign_in("login", generation, result);
        self.revoke(replaced).await;
        settled
    }

    /// Create an account and sign it in. Never retried after a conflict.
    ///
    /// # Errors
    ///
    /// Same as `login`, with `Conflict` for an existing account.
    pub async fn register(&self, fields: RegistrationFields) -> Result<UserRecord, AuthError> {
        let validated = validate::validate_registration(&fields).map_err(|errors| validate::to_auth_error(&errors));
        let (generation, fields, replaced) = self.begin_sign_in("register", validated)?;
        let result = self.inner.api.register(&fields).await;
        let settled = self.settle_sign_in("register", generation, result);
        self.revoke(replaced).await;
        settled
    }

    /// Drop the session locally, then revoke the token server-side on a best-effort basis.
    ///
    /// A no-op returning `false` when already anonymous.
    pub async fn logout(&self) -> bool {
        let token = {
            let mut state = self.lock_state();
            if state.session.status == SessionStatus::Anonymous {
                return false;
            }
            state.generation += 1;
            self.wipe();
            let token = state.session.token.take();
            state.session = Session::anonymous();
            tracing::info!(generation = state.generation, "signed out");
            self.publish(state);
            token
        };

        self.revoke(token).await;
        true
    }

    /// Leave the `Error` state. No-op in any other state.
    pub fn clear_error(&self) {
        let mut state = self.lock_state();
        if state.session.status != SessionStatus::Error {
            return;
        }
        state.session = Session::anonymous();
        self.publish(state);
    }

    /// Form input changed; dismisses a pending error.
    pub fn input_changed(&self) {
        self.clear_error();
    }

    /// Any API call answered 401: the session is gone.
    pub fn handle_unauthorized(&self) {
        let mut state = self.lock_state();
        if state.session.status == SessionStatus::Anonymous {
            return;
        }
        state.generation += 1;
        self.wipe();
        tracing::info!(generation = state.generation, "session revoked by backend");
        state.session = Session::anonymous();
        self.publish(state);
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Enter `Authenticating`. Also returns the token of a session this attempt replaces.
    fn begin_sign_in<T>(
        &self,
        action: &'static str,
        validated: Result<T, AuthError>,
    ) -> Result<(u64, T, Option<String>), AuthError> {
        let mut state = self.lock_state();
        if state.session.status == SessionStatus::Authenticating {
            tracing::debug!(action, "rejected: sign-in already in flight");
            return Err(AuthError::ConcurrentOperation);
        }

        let payload = match validated {
            Ok(payload) => payload,
            Err(err) => {
                // An authenticated session is never torn down by a bad form.
                if state.session.status != SessionStatus::Authenticated {
                    state.session = failed(&err);
                    self.publish(state);
                }
                return Err(err);
            }
        };

        let replaced = if state.session.status == SessionStatus::Authenticated {
            tracing::debug!(action, "switching accounts; dropping current session");
            self.wipe();
            state.session.token.take()
        } else {
            None
        };
        state.generation += 1;
        let generation = state.generation;
        state.session = Session { status: SessionStatus::Authenticating, ..Session::anonymous() };
        tracing::debug!(action, generation, "sign-in started");
        self.publish(state);
        Ok((generation, payload, replaced))
    }

    fn settle_sign_in(
        &self,
        action: &'static str,
        generation: u64,
        result: Result<AuthResponse, AuthError>,
    ) -> Result<UserRecord, AuthError> {
        let mut state = self.lock_state();
        if state.generation != generation {
            tracing::warn!(action, issued = generation, current = state.generation, "discarding stale sign-in result");
            return Err(AuthError::Superseded);
        }
        match result {
            Ok(AuthResponse { token, user }) => {
                self.persist(&token, &user);
                tracing::info!(action, user_id = %user.id, "signed in");
                state.session = authenticated(token, user.clone());
                self.publish(state);
                Ok(user)
            }
            Err(err) => {
                tracing::info!(action, code = err.error_code(), "sign-in failed");
                state.session = failed(&err);
                self.publish(state);
                Err(err)
            }
        }
    }

    /// Best-effort server-side revocation of a token already dropped locally.
    async fn revoke(&self, token: Option<String>) {
        let Some(token) = token else { return };
        if let Err(e) = self.inner.api.logout(&token).await {
            tracing::debug!(error = %e, "server logout failed; local session already cleared");
        }
    }

    fn persist(&self, token: &str, user: &UserRecord) {
        if let Err(e) = self.inner.storage.save(token, user) {
            tracing::warn!(key = self.inner.storage.key(), error = %e, "failed to persist session");
        }
    }

    fn wipe(&self) {
        if let Err(e) = self.inner.storage.clear() {
            tracing::warn!(key = self.inner.storage.key(), error = %e, "failed to clear stored session");
        }
    }

    /// Queue the current snapshot and deliver queued snapshots unless another caller already is.
    fn publish(&self, mut state: MutexGuard<'_, State>) {
        debug_assert!(state.session.is_consistent(), "inconsistent session: {:?}", state.session);
        let snapshot = state.session.clone();
        state.outbox.push_back(snapshot);
        if state.draining {
            return;
        }
        state.draining = true;
        drop(state);

        loop {
            let next = {
                let mut state = self.lock_state();
                if let Some(next) = state.outbox.pop_front() {
                    next
                } else {
                    state.draining = false;
                    break;
                }
            };
            let subscribers: Vec<Subscriber> = lock(&self.inner.subscribers)
                .iter()
                .map(|(_, s)| Arc::clone(s))
                .collect();
            for subscriber in subscribers {
                if std::panic::catch_unwind(AssertUnwindSafe(|| subscriber(&next))).is_err() {
                    tracing::error!(status = %next.status, "session subscriber panicked");
                }
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        lock(&self.inner.state)
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("AuthContext")
            .field("session", &state.session)
            .field("generation", &state.generation)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn authenticated(token: String, user: UserRecord) -> Session {
    Session { token: Some(token), user: Some(user), status: SessionStatus::Authenticated, error_message: None }
}

fn failed(err: &AuthError) -> Session {
    Session { status: SessionStatus::Error, error_message: Some(err.user_message()), ..Session::anonymous() }
}
