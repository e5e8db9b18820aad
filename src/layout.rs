// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Persisted layout preferences.

use std::sync::Arc;

use crate::error::StoreError;
use crate::store::{SessionStore, SIDEBAR_COLLAPSED_KEY};

/// Sidebar collapse state, stored as a JSON boolean.
pub struct LayoutPreferences {
    store: Arc<dyn SessionStore>,
    sidebar_collapsed: bool,
}

impl LayoutPreferences {
    /// Read the saved preference. Anything unreadable means expanded.
    pub fn load(store: Arc<dyn SessionStore>) -> Self {
        let sidebar_collapsed = match store.get(SIDEBAR_COLLAPSED_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<bool>(&raw).unwrap_or_else(|e| {
                tracing::debug!("LAYOUT | ignoring unreadable sidebar preference {:?}: {}", raw, e);
                false
            }),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("LAYOUT | could not read sidebar preference: {}", e);
                false
            }
        };

        Self {
            store,
            sidebar_collapsed,
        }
    }

    pub fn is_sidebar_collapsed(&self) -> bool {
        self.sidebar_collapsed
    }

    /// Flip the sidebar and persist the new value. Returns the new value.
    pub fn toggle_sidebar(&mut self) -> Result<bool, StoreError> {
        let collapsed = !self.sidebar_collapsed;
        self.store
            .set(SIDEBAR_COLLAPSED_KEY, &serde_json::to_string(&collapsed)?)?;
        self.sidebar_collapsed = collapsed;
        Ok(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_defaults_to_expanded() {
        let prefs = LayoutPreferences::load(Arc::new(MemoryStore::new()));
        assert!(!prefs.is_sidebar_collapsed());
    }

    #[test]
    fn test_toggle_persists() {
        let store = Arc::new(MemoryStore::new());
        let mut prefs = LayoutPreferences::load(store.clone());

        assert!(prefs.toggle_sidebar().unwrap());
        assert_eq!(store.get(SIDEBAR_COLLAPSED_KEY).unwrap().as_deref(), Some("true"));
        assert!(LayoutPreferences::load(store.clone()).is_sidebar_collapsed());

        assert!(!prefs.toggle_sidebar().unwrap());
        assert!(!LayoutPreferences::load(store).is_sidebar_collapsed());
    }

    #[test]
    fn test_garbage_value_means_expanded() {
        let store = Arc::new(MemoryStore::new());
        store.set(SIDEBAR_COLLAPSED_KEY, "yes please").unwrap();
        assert!(!LayoutPreferences::load(store).is_sidebar_collapsed());
    }
}
