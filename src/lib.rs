// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! workhub - session validity and role-gated navigation
//!
//! The policy core of the WorkHub operations dashboard (CRM, tasks,
//! meetings, user administration). Two pure policies and the state they
//! read:
//!
//! **Stored credential** -> **is it still valid?** -> **who is logged in?**
//! -> **which sidebar sections may they see?**
//!
//! # Core Modules
//!
//! - [`security`] - Credential validity and the session state machine
//! - [`navigation`] - Role-gated sidebar sections
//! - [`store`] - Session Store (credential, identity, preferences)
//! - [`transport`] - Backend seam; 401/403 invalidates the session
//! - [`layout`] - Sidebar collapse preference
//! - [`config`] - Config file
//! - [`error`] - Error types and CLI error formatting

pub mod config;
pub mod error;
pub mod layout;
pub mod navigation;
pub mod security;
pub mod store;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{Identity, Role};

pub use navigation::{sections_for, sections_for_tag, NavGroup, NavigationSection, SidebarView};

pub use security::{
    is_valid, is_valid_at, AuthState, Clock, CredentialClaims, ExpiryPolicy, FixedClock,
    InvalidationReason, SessionEvent, SessionManager, SystemClock,
};

pub use store::{FileStore, MemoryStore, SessionStore};

pub use transport::{AuthorizedClient, Backend, LoginResponse};

pub use layout::LayoutPreferences;

pub use config::{load_config, Config};

// Re-export error types
pub use error::{
    format_error, BackendError, CredentialError, ErrorBuilder, SessionError, StoreError, UnknownRole,
};

pub use utils::{mask_credential, mask_sensitive};
