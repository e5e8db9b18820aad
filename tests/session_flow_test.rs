// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end session flow tests
//!
//! Drives the public API the way the dashboard shell does: restore from a
//! file-backed store at startup, log in, react to backend rejections, and
//! derive the sidebar from whoever is logged in.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

use workhub::store::{TOKEN_KEY, USER_KEY};
use workhub::{
    is_valid_at, sections_for, AuthState, Clock, ExpiryPolicy, FileStore, FixedClock, Identity,
    InvalidationReason, NavigationSection, Role, SessionManager, SessionStore,
};

/// 2024-06-15 12:00:00 UTC
const NOW_2024: i64 = 1_718_452_800;

fn token(payload: &str) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
        URL_SAFE_NO_PAD.encode(payload),
        URL_SAFE_NO_PAD.encode("sig")
    )
}

fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::at_unix(NOW_2024))
}

fn restore(dir: &TempDir) -> SessionManager {
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    SessionManager::restore(store, clock(), ExpiryPolicy::Permissive)
}

// =============================================================================
// Credential validity
// =============================================================================

#[test]
fn test_year_2001_credential_is_expired_in_2024() {
    let now = clock().now();
    assert!(!is_valid_at(Some(&token(r#"{"exp": 1000000000}"#)), now, ExpiryPolicy::Permissive));
}

#[test]
fn test_validity_tracks_expiry_relative_to_clock() {
    let now = clock().now();
    for offset in [-86_400_i64, -1, 0] {
        let t = token(&format!(r#"{{"exp": {}}}"#, NOW_2024 + offset));
        assert!(!is_valid_at(Some(&t), now, ExpiryPolicy::Permissive), "offset {}", offset);
    }
    for offset in [1_i64, 3600, 172_800] {
        let t = token(&format!(r#"{{"exp": {}}}"#, NOW_2024 + offset));
        assert!(is_valid_at(Some(&t), now, ExpiryPolicy::Permissive), "offset {}", offset);
    }
}

#[test]
fn test_malformed_credentials_fail_closed() {
    let now = clock().now();
    for bad in ["", ".", "..", "one.two", "a.b.c.d", "header.%%%.sig"] {
        assert!(!is_valid_at(Some(bad), now, ExpiryPolicy::Permissive), "{:?}", bad);
    }
    assert!(!is_valid_at(None, now, ExpiryPolicy::Permissive));
}

// =============================================================================
// Navigation
// =============================================================================

#[test]
fn test_admin_sidebar_scenario() {
    let view = sections_for(Some(Role::Admin));
    assert_eq!(
        view.primary,
        vec![
            NavigationSection::MyDashboard,
            NavigationSection::Crm,
            NavigationSection::Calendar,
            NavigationSection::Tasks,
            NavigationSection::Meetings,
            NavigationSection::Companies,
            NavigationSection::ClientTracker,
        ]
    );
    assert!(view.analytics.is_empty());
}

#[test]
fn test_super_admin_covers_employee_plus_privileged() {
    let super_admin: HashSet<_> = sections_for(Some(Role::SuperAdmin)).all().into_iter().collect();
    let mut expected: HashSet<_> = sections_for(Some(Role::Employee)).all().into_iter().collect();
    expected.extend([
        NavigationSection::Crm,
        NavigationSection::Reports,
        NavigationSection::TeamPerformance,
    ]);
    assert!(super_admin.is_superset(&expected));
}

#[test]
fn test_client_and_anonymous_views() {
    let client = sections_for(Some(Role::Client));
    assert!(client.contains(NavigationSection::MyProject));
    assert!(client.contains(NavigationSection::Settings));
    assert!(!client.contains(NavigationSection::Crm));
    assert!(!client.contains(NavigationSection::Reports));

    assert_eq!(sections_for(None).all(), vec![NavigationSection::Settings]);
}

// =============================================================================
// Session lifecycle across restarts
// =============================================================================

#[test]
fn test_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let credential = token(&format!(r#"{{"sub":"asha@example.com","exp":{}}}"#, NOW_2024 + 3600));

    let first = restore(&dir);
    first.login(credential.clone(), Identity::new("Asha", "asha@example.com", Role::SuperAdmin));

    let second = restore(&dir);
    assert_eq!(second.state(), AuthState::Authenticated);
    assert_eq!(second.credential(), Some(credential));
    assert_eq!(second.sections().analytics.len(), 2);
}

#[test]
fn test_expired_session_is_cleared_on_restart() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    store.set(TOKEN_KEY, &token(r#"{"exp": 1000000000}"#)).unwrap();
    store
        .set(USER_KEY, r#"{"name":"Asha","email":"asha@example.com","role":"ROLE_ADMIN"}"#)
        .unwrap();

    let manager = restore(&dir);
    assert_eq!(manager.state(), AuthState::Unauthenticated);
    assert_eq!(manager.sections().all(), vec![NavigationSection::Settings]);

    let reopened = FileStore::open(dir.path()).unwrap();
    assert_eq!(reopened.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(reopened.get(USER_KEY).unwrap(), None);
}

#[test]
fn test_rejection_then_restart_stays_logged_out() {
    let dir = TempDir::new().unwrap();
    let manager = restore(&dir);
    manager.login(
        token(&format!(r#"{{"exp":{}}}"#, NOW_2024 + 3600)),
        Identity::new("Ravi", "ravi@client.example", Role::Client),
    );

    assert!(manager.on_session_invalidated(InvalidationReason::Rejected { status: 403 }));
    assert!(!manager.on_session_invalidated(InvalidationReason::Rejected { status: 403 }));

    assert!(!restore(&dir).is_authenticated());
}

#[test]
fn test_stored_identity_uses_camel_case() {
    let dir = TempDir::new().unwrap();
    let manager = restore(&dir);
    manager.login(
        token(&format!(r#"{{"exp":{}}}"#, NOW_2024 + 3600)),
        Identity::new("Asha", "asha@example.com", Role::Employee).with_avatar_url("https://a.example/x.png"),
    );

    let raw = FileStore::open(dir.path()).unwrap().get(USER_KEY).unwrap().unwrap();
    assert!(raw.contains("\"avatarUrl\""));
    assert!(raw.contains("ROLE_EMPLOYEE"));
}
