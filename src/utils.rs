// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Utility functions for workhub.

/// Characters of a credential that may appear in logs.
pub const CREDENTIAL_VISIBLE_PREFIX: usize = 10;

/// Mask a sensitive string for logging.
///
/// Shows only the first `visible_prefix` characters and replaces the rest
/// with "...".
///
/// # Examples
///
/// ```
/// use workhub::utils::mask_sensitive;
///
/// let token = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJhc2hhIn0.c2ln";
/// assert_eq!(mask_sensitive(token, 10), "eyJhbGciOi...");
/// ```
pub fn mask_sensitive(input: &str, visible_prefix: usize) -> String {
    if input.chars().count() <= visible_prefix {
        // Still mask short inputs so the length is not leaked.
        return format!("{}...", input);
    }

    let prefix: String = input.chars().take(visible_prefix).collect();
    format!("{}...", prefix)
}

/// Mask a credential for audit lines. Only the start of the header survives.
pub fn mask_credential(credential: &str) -> String {
    mask_sensitive(credential, CREDENTIAL_VISIBLE_PREFIX)
}
