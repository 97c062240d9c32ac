//! Config - Grid Settings
//!
//! Every tunable of the engine lives here and is passed in at construction;
//! nothing reads process-wide switches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_SIZE, DEFAULT_CONTAINER_HEIGHT, DEFAULT_ITEM_HEIGHT, DEFAULT_OVERSCAN,
    DEFAULT_PREFETCH_COUNT, RESIZE_DEBOUNCE_MS, SCROLL_SAVE_DEBOUNCE_MS,
};
use crate::error::{Error, Result};
use crate::services::cache::CacheConfig;
use crate::state::layout::{Breakpoint, GridLayout, ResponsiveLayout};
use crate::state::viewport::VirtualScrollConfig;

/// Main grid configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GridSettings {
    /// Viewport defaults
    pub viewport: ViewportSettings,
    /// Lazy cache sizing
    pub cache: CacheSettings,
    /// Scroll persistence
    pub persistence: PersistenceSettings,
    /// Responsive breakpoints
    pub layout: LayoutSettings,
}

/// Viewport defaults used until the container is measured
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSettings {
    /// Row pitch in pixels
    pub item_height: f64,
    /// Extra rows rendered above and below
    pub overscan: usize,
    /// Initial container height in pixels
    pub container_height: f64,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            item_height: DEFAULT_ITEM_HEIGHT,
            overscan: DEFAULT_OVERSCAN,
            container_height: DEFAULT_CONTAINER_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub cache_size: usize,
    pub prefetch_count: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            prefetch_count: DEFAULT_PREFETCH_COUNT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    /// Save and restore scroll positions
    pub enabled: bool,
    /// Trailing debounce for saves
    pub debounce_ms: u64,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: SCROLL_SAVE_DEBOUNCE_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Quiet period before a resize is applied
    pub resize_debounce_ms: u64,
    /// Layout for widths past the last breakpoint
    pub base: GridLayout,
    /// Ascending by `max_width`
    pub breakpoints: Vec<Breakpoint>,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            resize_debounce_ms: RESIZE_DEBOUNCE_MS,
            base: GridLayout::default(),
            breakpoints: vec![
                Breakpoint {
                    max_width: 480.0,
                    columns: 13,
                    cell_size: 8.0,
                },
                Breakpoint {
                    max_width: 768.0,
                    columns: 26,
                    cell_size: 10.0,
                },
            ],
        }
    }
}

impl GridSettings {
    /// Check every section; the first problem is reported
    pub fn validate(&self) -> Result<()> {
        self.viewport_config(0)?;
        self.responsive_layout()?;
        if self.cache.cache_size == 0 {
            return Err(Error::config("cache.cache_size must be at least 1"));
        }
        Ok(())
    }

    /// Viewport config for `total_items` using the base layout's columns
    pub fn viewport_config(&self, total_items: usize) -> Result<VirtualScrollConfig> {
        VirtualScrollConfig::new(
            total_items,
            self.viewport.item_height,
            self.layout.base.columns,
            self.viewport.container_height,
            self.viewport.overscan,
        )
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            cache_size: self.cache.cache_size,
            prefetch_count: self.cache.prefetch_count,
        }
    }

    pub fn responsive_layout(&self) -> Result<ResponsiveLayout> {
        ResponsiveLayout::new(self.layout.breakpoints.clone(), self.layout.base)
    }

    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.persistence.debounce_ms)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.layout.resize_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = GridSettings::default();
        settings.validate().expect("defaults");
        assert_eq!(settings.cache_config(), CacheConfig::default());
        assert_eq!(settings.scroll_debounce(), Duration::from_millis(200));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: GridSettings = toml::from_str(
            r#"
            [cache]
            cache_size = 800

            [persistence]
            enabled = false

            [[layout.breakpoints]]
            max_width = 600.0
            columns = 26
            cell_size = 9.0
            "#,
        )
        .expect("parse");

        assert_eq!(settings.cache.cache_size, 800);
        assert_eq!(settings.cache.prefetch_count, DEFAULT_PREFETCH_COUNT);
        assert!(!settings.persistence.enabled);
        assert_eq!(settings.layout.breakpoints.len(), 1);
        assert_eq!(settings.layout.base, GridLayout::default());
        settings.validate().expect("valid");
    }

    #[test]
    fn test_invalid_sections_are_configuration_errors() {
        let mut settings = GridSettings::default();
        settings.viewport.item_height = 0.0;
        assert!(settings.validate().expect_err("zero height").is_configuration());

        let mut settings = GridSettings::default();
        settings.layout.breakpoints.reverse();
        assert!(settings.validate().expect_err("descending").is_configuration());

        let mut settings = GridSettings::default();
        settings.cache.cache_size = 0;
        assert!(settings.validate().is_err());
    }
}
