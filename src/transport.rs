// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Backend seam.
//!
//! The REST backend itself is not implemented here. [`Backend`] describes
//! what the session layer needs from it, and [`AuthorizedClient`] wires a
//! backend to a [`SessionManager`] so that any 401 or 403 tears the session
//! down.

use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::security::session_manager::{InvalidationReason, SessionManager};
use crate::types::Identity;

/// Successful login payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Identity,
}

/// What the session layer needs from the REST backend.
pub trait Backend: Send + Sync {
    fn login(&self, email: &str, password: &str) -> Result<LoginResponse, BackendError>;
    fn fetch_identity(&self, credential: &str) -> Result<Identity, BackendError>;
    fn logout(&self, credential: &str) -> Result<(), BackendError>;
}

/// A backend bound to a session.
pub struct AuthorizedClient<B> {
    backend: B,
    session: SessionManager,
}

impl<B: Backend> AuthorizedClient<B> {
    pub fn new(backend: B, session: SessionManager) -> Self {
        Self { backend, session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Report the status of any response made with the held credential.
    ///
    /// Returns true if the status invalidated the session.
    pub fn observe_status(&self, status: u16) -> bool {
        if matches!(status, 401 | 403) {
            tracing::warn!("TRANSPORT | backend answered {}, invalidating session", status);
            return self
                .session
                .on_session_invalidated(InvalidationReason::Rejected { status });
        }
        false
    }

    fn observe<T>(&self, result: Result<T, BackendError>) -> Result<T, BackendError> {
        if let Err(err) = &result {
            if let Some(status) = err.status() {
                self.observe_status(status);
            }
        }
        result
    }

    /// Log in against the backend and start a session with the result.
    ///
    /// A rejected login leaves the current state alone: a bad password is
    /// not a statement about the session already held.
    pub fn login(&self, email: &str, password: &str) -> Result<Identity, BackendError> {
        let response = self.backend.login(email, password)?;
        self.session.login(response.token, response.user.clone());
        Ok(response.user)
    }

    /// Re-fetch the identity for the held credential and cache it.
    pub fn refresh_identity(&self) -> Result<Identity, BackendError> {
        let Some(credential) = self.session.credential() else {
            return Err(BackendError::Status {
                status: 401,
                message: "no credential held".to_string(),
            });
        };

        let identity = self.observe(self.backend.fetch_identity(&credential))?;
        if let Err(e) = self.session.update_identity(identity.clone()) {
            tracing::warn!("TRANSPORT | fetched identity not cached: {}", e);
        }
        Ok(identity)
    }

    /// Tell the backend, then drop the local session regardless of the
    /// backend's answer.
    pub fn logout(&self) {
        if let Some(credential) = self.session.credential() {
            if let Err(e) = self.backend.logout(&credential) {
                tracing::debug!("TRANSPORT | backend logout failed, continuing: {}", e);
            }
        }
        self.session.logout();
    }
}
