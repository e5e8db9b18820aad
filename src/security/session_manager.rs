// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session Manager
//!
//! Owns the process-wide authentication flag and keeps it in step with the
//! Session Store.
//!
//! ## State machine
//!
//! Two states, `Unauthenticated` and `Authenticated`. The initial state is
//! computed once by [`SessionManager::restore`]. After that:
//!
//! - `login` always moves to `Authenticated`, replacing any prior session
//! - `logout` and `on_session_invalidated` move to `Unauthenticated`
//!
//! There is no refresh timer. An expired credential is noticed lazily by
//! [`SessionManager::revalidate`] or when the backend rejects it.
//!
//! ## Ordering
//!
//! Every transition holds the state lock while it writes the store, so the
//! in-memory flag and the stored credential never disagree and the last
//! writer wins. Listeners run after the lock is released.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{CredentialError, SessionError};
use crate::navigation::{sections_for, SidebarView};
use crate::security::credential::{self, Clock, CredentialClaims, ExpiryPolicy, SystemClock};
use crate::security::locks::{resilient_read, resilient_write};
use crate::store::{SessionStore, TOKEN_KEY, USER_KEY};
use crate::types::{Identity, Role};
use crate::utils::mask_credential;

/// Authentication flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthState::Unauthenticated => write!(f, "UNAUTHENTICATED"),
            AuthState::Authenticated => write!(f, "AUTHENTICATED"),
        }
    }
}

/// Why a session was torn down without the user asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    CredentialExpired,
    CredentialMalformed,
    /// Strict policy only.
    CredentialWithoutExpiry,
    /// A credential was stored but the identity next to it was missing or
    /// unreadable.
    IdentityMissing,
    /// The backend answered 401 or 403.
    Rejected { status: u16 },
}

impl From<&CredentialError> for InvalidationReason {
    fn from(err: &CredentialError) -> Self {
        match err {
            CredentialError::Expired { .. } => InvalidationReason::CredentialExpired,
            CredentialError::MissingExpiry => InvalidationReason::CredentialWithoutExpiry,
            CredentialError::Missing | CredentialError::Malformed(_) => {
                InvalidationReason::CredentialMalformed
            }
        }
    }
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::CredentialExpired => write!(f, "credential_expired"),
            InvalidationReason::CredentialMalformed => write!(f, "credential_malformed"),
            InvalidationReason::CredentialWithoutExpiry => write!(f, "credential_without_expiry"),
            InvalidationReason::IdentityMissing => write!(f, "identity_missing"),
            InvalidationReason::Rejected { status } => write!(f, "rejected_{}", status),
        }
    }
}

/// Session events, delivered to listeners and written to the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A stored session was accepted at startup.
    Restored {
        session_id: String,
        user: String,
        timestamp: DateTime<Utc>,
    },
    LoggedIn {
        session_id: String,
        user: String,
        role: String,
        timestamp: DateTime<Utc>,
    },
    LoggedOut {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    Invalidated {
        session_id: Option<String>,
        reason: InvalidationReason,
        timestamp: DateTime<Utc>,
    },
    ProfileUpdated {
        session_id: String,
        user: String,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// Format event for audit log
    pub fn to_audit_string(&self) -> String {
        let fmt = |ts: &DateTime<Utc>| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        match self {
            SessionEvent::Restored { session_id, user, timestamp } => {
                format!("{} | SESSION_RESTORED | session={} user={}", fmt(timestamp), session_id, user)
            }
            SessionEvent::LoggedIn { session_id, user, role, timestamp } => {
                format!("{} | SESSION_LOGIN | session={} user={} role={}", fmt(timestamp), session_id, user, role)
            }
            SessionEvent::LoggedOut { session_id, timestamp } => {
                format!("{} | SESSION_LOGOUT | session={}", fmt(timestamp), session_id)
            }
            SessionEvent::Invalidated { session_id, reason, timestamp } => {
                format!(
                    "{} | SESSION_INVALIDATED | session={} reason={}",
                    fmt(timestamp),
                    session_id.as_deref().unwrap_or("-"),
                    reason
                )
            }
            SessionEvent::ProfileUpdated { session_id, user, timestamp } => {
                format!("{} | SESSION_PROFILE_UPDATED | session={} user={}", fmt(timestamp), session_id, user)
            }
        }
    }
}

type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Debug)]
struct SessionInner {
    state: AuthState,
    session_id: Option<String>,
    credential: Option<String>,
    identity: Option<Identity>,
}

impl SessionInner {
    fn unauthenticated() -> Self {
        Self {
            state: AuthState::Unauthenticated,
            session_id: None,
            credential: None,
            identity: None,
        }
    }
}

/// Handle to the authentication state. Cloning shares the same state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<RwLock<SessionInner>>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    policy: ExpiryPolicy,
    listeners: Arc<RwLock<Vec<Listener>>>,
    id_counter: Arc<AtomicU64>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = resilient_read(&self.inner);
        f.debug_struct("SessionManager")
            .field("state", &inner.state)
            .field("session_id", &inner.session_id)
            .field("policy", &self.policy)
            .finish()
    }
}

impl SessionManager {
    /// Build a manager from whatever the store holds.
    ///
    /// A stored credential that fails validation, or a valid one with no
    /// readable identity next to it, is cleared and reported as an
    /// invalidation.
    pub fn restore(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, policy: ExpiryPolicy) -> Self {
        let manager = Self {
            inner: Arc::new(RwLock::new(SessionInner::unauthenticated())),
            store,
            clock,
            policy,
            listeners: Arc::new(RwLock::new(Vec::new())),
            id_counter: Arc::new(AtomicU64::new(1)),
        };

        let Some(stored_credential) = manager.read_store(TOKEN_KEY) else {
            if manager.read_store(USER_KEY).is_some() {
                tracing::debug!("SESSION_RESTORE | identity without credential, clearing");
                manager.clear_store();
            }
            return manager;
        };

        if let Err(err) = credential::check(Some(&stored_credential), manager.clock.now(), policy) {
            tracing::warn!("Stored session is no longer valid ({}). Clearing storage.", err);
            manager.on_session_invalidated(InvalidationReason::from(&err));
            return manager;
        }

        let identity = manager
            .read_store(USER_KEY)
            .and_then(|raw| match serde_json::from_str::<Identity>(&raw) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    tracing::warn!("SESSION_RESTORE | stored identity unreadable: {}", e);
                    None
                }
            });

        let Some(identity) = identity else {
            manager.on_session_invalidated(InvalidationReason::IdentityMissing);
            return manager;
        };

        let session_id = manager.generate_session_id();
        let event = SessionEvent::Restored {
            session_id: session_id.clone(),
            user: identity.email.clone(),
            timestamp: manager.clock.now(),
        };
        {
            let mut inner = resilient_write(&manager.inner);
            inner.state = AuthState::Authenticated;
            inner.session_id = Some(session_id);
            inner.credential = Some(stored_credential);
            inner.identity = Some(identity);
        }
        manager.emit(event);
        manager
    }

    /// Restore using the wall clock and the permissive expiry policy.
    pub fn restore_default(store: Arc<dyn SessionStore>) -> Self {
        Self::restore(store, Arc::new(SystemClock), ExpiryPolicy::Permissive)
    }

    /// Register a listener for every future session event.
    pub fn subscribe(&self, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        resilient_write(&self.listeners).push(Arc::new(listener));
    }

    /// Generate a unique session ID
    fn generate_session_id(&self) -> String {
        let counter = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let timestamp = self.clock.now().timestamp_millis();
        let random: u32 = rand::random();
        format!("sess_{}_{}_{:08x}", timestamp, counter, random)
    }

    /// Start a session. Unconditional: replaces whatever was there.
    ///
    /// Returns the new session id.
    pub fn login(&self, credential: impl Into<String>, identity: Identity) -> String {
        let credential = credential.into();
        let session_id = self.generate_session_id();

        let event = SessionEvent::LoggedIn {
            session_id: session_id.clone(),
            user: identity.email.clone(),
            role: identity.role.clone(),
            timestamp: self.clock.now(),
        };

        {
            let mut inner = resilient_write(&self.inner);
            self.write_store(TOKEN_KEY, &credential);
            match serde_json::to_string(&identity) {
                Ok(json) => self.write_store(USER_KEY, &json),
                Err(e) => tracing::warn!("SESSION_LOGIN | identity not persisted: {}", e),
            }
            inner.state = AuthState::Authenticated;
            inner.session_id = Some(session_id.clone());
            inner.credential = Some(credential.clone());
            inner.identity = Some(identity);
        }

        tracing::debug!("SESSION_LOGIN | session={} credential={}", session_id, mask_credential(&credential));
        self.emit(event);
        session_id
    }

    /// End the session at the user's request.
    ///
    /// Returns false if there was no session. Safe to call repeatedly.
    pub fn logout(&self) -> bool {
        let previous = {
            let mut inner = resilient_write(&self.inner);
            self.clear_store();
            std::mem::replace(&mut *inner, SessionInner::unauthenticated())
        };

        match previous.session_id {
            Some(session_id) if previous.state.is_authenticated() => {
                self.emit(SessionEvent::LoggedOut {
                    session_id,
                    timestamp: self.clock.now(),
                });
                true
            }
            _ => false,
        }
    }

    /// Tear the session down because it can no longer be trusted.
    ///
    /// Clears the identity and credential, in memory and in the store, and
    /// moves to `Unauthenticated`. Returns false, and emits nothing, if there
    /// was nothing to clear.
    pub fn on_session_invalidated(&self, reason: InvalidationReason) -> bool {
        self.invalidate(reason, None)
    }

    /// Invalidate only if `session_id` is still the live session.
    ///
    /// A verdict reached about one session must not tear down a login that
    /// landed after it.
    fn invalidate_if_current(&self, session_id: &str, reason: InvalidationReason) -> bool {
        self.invalidate(reason, Some(session_id))
    }

    fn invalidate(&self, reason: InvalidationReason, expected: Option<&str>) -> bool {
        let (previous, had_stored) = {
            let mut inner = resilient_write(&self.inner);
            if let Some(expected) = expected {
                if inner.session_id.as_deref() != Some(expected) {
                    tracing::debug!(
                        "SESSION_INVALIDATED | reason={} | session={} superseded, skipping",
                        reason,
                        expected
                    );
                    return false;
                }
            }
            let had_stored = self.read_store(TOKEN_KEY).is_some() || self.read_store(USER_KEY).is_some();
            self.clear_store();
            (std::mem::replace(&mut *inner, SessionInner::unauthenticated()), had_stored)
        };

        if !previous.state.is_authenticated() && !had_stored {
            tracing::debug!("SESSION_INVALIDATED | reason={} | already unauthenticated", reason);
            return false;
        }

        self.emit(SessionEvent::Invalidated {
            session_id: previous.session_id,
            reason,
            timestamp: self.clock.now(),
        });
        true
    }

    /// Re-check the held credential against the clock.
    ///
    /// Invalidates the session if the credential no longer passes, unless a
    /// newer login replaced it meanwhile. Returns whether a session is still
    /// authenticated.
    pub fn revalidate(&self) -> bool {
        let (session_id, held) = {
            let inner = resilient_read(&self.inner);
            if !inner.state.is_authenticated() {
                return false;
            }
            (inner.session_id.clone().unwrap_or_default(), inner.credential.clone())
        };

        match credential::check(held.as_deref(), self.clock.now(), self.policy) {
            Ok(_) => true,
            Err(err) => {
                self.invalidate_if_current(&session_id, InvalidationReason::from(&err));
                self.is_authenticated()
            }
        }
    }

    /// Replace the cached identity after a profile edit.
    pub fn update_identity(&self, identity: Identity) -> Result<(), SessionError> {
        let session_id = {
            let mut inner = resilient_write(&self.inner);
            if !inner.state.is_authenticated() {
                return Err(SessionError::NotAuthenticated);
            }
            let json = serde_json::to_string(&identity).map_err(crate::error::StoreError::from)?;
            self.store.set(USER_KEY, &json)?;
            inner.identity = Some(identity.clone());
            inner.session_id.clone().unwrap_or_default()
        };

        self.emit(SessionEvent::ProfileUpdated {
            session_id,
            user: identity.email,
            timestamp: self.clock.now(),
        });
        Ok(())
    }

    pub fn state(&self) -> AuthState {
        resilient_read(&self.inner).state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn session_id(&self) -> Option<String> {
        resilient_read(&self.inner).session_id.clone()
    }

    pub fn credential(&self) -> Option<String> {
        resilient_read(&self.inner).credential.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        resilient_read(&self.inner).identity.clone()
    }

    /// Role of the current identity. `None` when unauthenticated or when
    /// the stored role is not recognized.
    pub fn role(&self) -> Option<Role> {
        resilient_read(&self.inner).identity.as_ref().and_then(Identity::role)
    }

    /// Decoded claims of the held credential, if it decodes.
    pub fn claims(&self) -> Option<CredentialClaims> {
        let credential = self.credential()?;
        credential::decode_claims(&credential).ok()
    }

    /// Sidebar for the current identity.
    pub fn sections(&self) -> SidebarView {
        sections_for(self.role())
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn emit(&self, event: SessionEvent) {
        match &event {
            SessionEvent::Invalidated { .. } => tracing::warn!("{}", event.to_audit_string()),
            _ => tracing::info!("{}", event.to_audit_string()),
        }

        let listeners: Vec<Listener> = resilient_read(&self.listeners).clone();
        for listener in listeners {
            listener(&event);
        }
    }

    fn read_store(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("SESSION_STORE | read of '{}' failed, treating as absent: {}", key, e);
                None
            }
        }
    }

    fn write_store(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            tracing::warn!("SESSION_STORE | write of '{}' failed: {}", key, e);
        }
    }

    fn clear_store(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!("SESSION_STORE | removal of '{}' failed: {}", key, e);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
