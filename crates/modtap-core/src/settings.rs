// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! User preferences consumed by the session manager.
//!
//! Persistence is left to whoever implements [`SettingsProvider`].

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Colour theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme.
    #[default]
    Light,
    /// Dark theme.
    Dark,
}

/// How register addresses are laid out in the value view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressLayout {
    /// One row per address.
    #[default]
    Table,
    /// Rows labelled by offset from the start address.
    Offset,
    /// Fixed-width grid.
    Grid,
}

/// A snapshot of user preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Colour theme.
    #[serde(default)]
    pub theme: Theme,
    /// Address layout.
    #[serde(default)]
    pub address_layout: AddressLayout,
    /// When set, every write is refused.
    #[serde(default)]
    pub read_only: bool,
}

/// Source of user preferences.
pub trait SettingsProvider: Send + Sync {
    /// Returns the current preferences.
    fn settings(&self) -> Settings;
}

/// In-memory settings that can be changed at runtime.
#[derive(Debug, Default)]
pub struct StaticSettings {
    inner: RwLock<Settings>,
}

impl StaticSettings {
    /// Creates a provider holding `settings`.
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    /// Replaces the settings.
    pub fn replace(&self, settings: Settings) {
        *self.inner.write() = settings;
    }

    /// Toggles the global read-only preference.
    pub fn set_read_only(&self, read_only: bool) {
        self.inner.write().read_only = read_only;
    }
}

impl SettingsProvider for StaticSettings {
    fn settings(&self) -> Settings {
        *self.inner.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_settings_toggle() {
        let provider = StaticSettings::default();
        assert!(!provider.settings().read_only);
        provider.set_read_only(true);
        assert!(provider.settings().read_only);
        assert_eq!(provider.settings().theme, Theme::Light);
    }
}
