// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types and consistent error formatting for workhub.
//!
//! The policy operations (`is_valid`, `sections_for`) never return these;
//! they exist for the typed decoders, the store and the backend seam. The
//! formatting helpers at the bottom are what the CLI prints.

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// A role tag that is not one of the known roles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Why a credential cannot be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CredentialError {
    #[error("no credential held")]
    Missing,

    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("credential expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    /// Only raised under the strict expiry policy.
    #[error("credential asserts no expiry")]
    MissingExpiry,
}

/// Session Store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store contents are not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("timed out after {timeout:?} waiting for lock on {path}; another process may be writing the store")]
    LockTimeout {
        path: std::path::PathBuf,
        timeout: std::time::Duration,
    },
}

/// Session manager failures for operations that require a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors reported by the backend collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(String),
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            BackendError::Transport(_) => None,
        }
    }

    /// 401 and 403 both mean the held credential is no longer accepted.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

// =============================================================================
// CLI ERROR FORMATTING
// =============================================================================

/// Trailer appended to every formatted error.
pub const HELP_HINT: &str = "Run `workhub status` to inspect the stored session.";

/// Formats an error message with title, causes, fixes, and a help hint.
///
/// # Example
///
/// ```
/// use workhub::error::format_error;
///
/// let error = format_error(
///     "Stored session is no longer valid",
///     &["Credential expired", "Credential was revoked by the backend"],
///     &["Log in again: workhub login --token <TOKEN> ..."],
/// );
/// assert!(error.contains("Possible causes:"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = format!("[✗] {}\n\n", title);

    if !causes.is_empty() {
        output.push_str("Possible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
        output.push('\n');
    }

    if !fixes.is_empty() {
        output.push_str("Try these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
        output.push('\n');
    }

    output.push_str(HELP_HINT);
    output
}

/// Builder for constructing formatted error messages.
///
/// ```
/// use workhub::error::ErrorBuilder;
///
/// let error = ErrorBuilder::new("Could not read session store")
///     .cause("Store directory is not writable")
///     .fix("Pass a different directory: workhub --store-dir <DIR> status")
///     .build();
/// assert!(error.contains("Store directory is not writable"));
/// ```
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl ErrorBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    pub fn build(&self) -> String {
        let causes: Vec<&str> = self.causes.iter().map(|s| s.as_str()).collect();
        let fixes: Vec<&str> = self.fixes.iter().map(|s| s.as_str()).collect();
        format_error(&self.title, &causes, &fixes)
    }
}

impl fmt::Display for ErrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

/// CLI message for a credential that failed validation.
pub fn credential_error_message(err: &CredentialError) -> String {
    match err {
        CredentialError::Missing => ErrorBuilder::new("No credential stored")
            .fix("Log in: workhub login --token <TOKEN> --name <NAME> --email <EMAIL> --role <ROLE>")
            .build(),
        CredentialError::Malformed(detail) => ErrorBuilder::new("Credential could not be decoded")
            .cause(format!("Decoder reported: {}", detail))
            .cause("Token was truncated or is not a three-part signed token")
            .fix("Copy the full token issued at login and try again")
            .build(),
        CredentialError::Expired { expired_at } => ErrorBuilder::new("Credential has expired")
            .cause(format!("Expired at {}", expired_at.format("%Y-%m-%d %H:%M:%S UTC")))
            .fix("Log in again to obtain a fresh token")
            .build(),
        CredentialError::MissingExpiry => ErrorBuilder::new("Credential has no expiry")
            .cause("Strict expiry policy rejects tokens without an `exp` claim")
            .fix("Ask the backend to issue tokens with an expiry, or drop --strict")
            .build(),
    }
}
