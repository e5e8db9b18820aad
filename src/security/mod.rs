// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Security Module
//!
//! Credential validity and the authentication state machine.
//!
//! ## Key Pieces
//!
//! - **Credential validity**: offline `exp` check of a stored signed token
//! - **Session manager**: `login` / `logout` / `on_session_invalidated`
//!   transitions, kept in step with the Session Store
//! - **Audit logging**: every transition is logged through `tracing`
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use workhub::security::{SessionManager, InvalidationReason};
//! use workhub::store::MemoryStore;
//! use workhub::types::{Identity, Role};
//!
//! let manager = SessionManager::restore_default(Arc::new(MemoryStore::new()));
//! assert!(!manager.is_authenticated());
//!
//! manager.login("h.p.s", Identity::new("Asha", "asha@example.com", Role::Admin));
//! assert!(manager.is_authenticated());
//!
//! // The backend said 401
//! manager.on_session_invalidated(InvalidationReason::Rejected { status: 401 });
//! assert!(!manager.is_authenticated());
//! ```

pub mod credential;
pub mod locks;
pub mod session_manager;

pub use credential::{
    check, decode_claims, is_valid, is_valid_at, Clock, CredentialClaims, ExpiryPolicy, FixedClock,
    SystemClock,
};
pub use locks::{resilient_read, resilient_write};
pub use session_manager::{AuthState, InvalidationReason, SessionEvent, SessionManager};
