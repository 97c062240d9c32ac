//! Layout - Responsive Column Resolution
//!
//! Maps a container width to a column count and cell size through an ordered
//! breakpoint table. Resize signals go through a debouncer so the viewport is
//! only reconfigured once the width settles.

use std::time::{Duration, Instant};

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{DEFAULT_ITEM_HEIGHT, WEEKS_PER_ROW};
use crate::error::{Error, Result};
use crate::helpers::Debouncer;
use crate::state::viewport::checked_columns;

/// Resolved grid layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    #[serde(deserialize_with = "deserialize_columns")]
    pub columns: usize,
    pub cell_size: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            columns: WEEKS_PER_ROW,
            cell_size: DEFAULT_ITEM_HEIGHT,
        }
    }
}

/// Layout used while the container is narrower than `max_width`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub max_width: f64,
    #[serde(deserialize_with = "deserialize_columns")]
    pub columns: usize,
    pub cell_size: f64,
}

impl Breakpoint {
    pub fn layout(&self) -> GridLayout {
        GridLayout {
            columns: self.columns,
            cell_size: self.cell_size,
        }
    }
}

/// Column counts in config files may be written as `13` or `13.0`; anything
/// fractional is a configuration error.
fn deserialize_columns<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    checked_columns(raw).map_err(serde::de::Error::custom)
}

/// Ordered breakpoint table with a base (widest) layout
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsiveLayout {
    breakpoints: Vec<Breakpoint>,
    base: GridLayout,
}

impl ResponsiveLayout {
    /// Validate and build a resolver. The table must already be ascending by
    /// `max_width`; it is not sorted here.
    pub fn new(breakpoints: Vec<Breakpoint>, base: GridLayout) -> Result<Self> {
        check_layout("base", &base)?;
        for (i, bp) in breakpoints.iter().enumerate() {
            if !bp.max_width.is_finite() || bp.max_width <= 0.0 {
                return Err(Error::config(format!(
                    "breakpoint {i}: max_width must be positive, got {}",
                    bp.max_width
                )));
            }
            check_layout(&format!("breakpoint {i}"), &bp.layout())?;
        }
        if let Some(i) = breakpoints
            .windows(2)
            .position(|pair| pair[0].max_width >= pair[1].max_width)
        {
            return Err(Error::config(format!(
                "breakpoints must be in ascending max_width order (entry {} is not below entry {})",
                i,
                i + 1
            )));
        }
        Ok(Self { breakpoints, base })
    }

    /// Single-layout resolver with no breakpoints
    pub fn fixed(base: GridLayout) -> Result<Self> {
        Self::new(Vec::new(), base)
    }

    /// First breakpoint whose `max_width` exceeds `container_width`, otherwise
    /// the base layout
    pub fn resolve(&self, container_width: f64) -> GridLayout {
        self.breakpoints
            .iter()
            .find(|bp| container_width < bp.max_width)
            .map(Breakpoint::layout)
            .unwrap_or(self.base)
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn base(&self) -> GridLayout {
        self.base
    }
}

fn check_layout(name: &str, layout: &GridLayout) -> Result<()> {
    if layout.columns == 0 {
        return Err(Error::config(format!("{name}: columns must be at least 1")));
    }
    if !layout.cell_size.is_finite() || layout.cell_size <= 0.0 {
        return Err(Error::config(format!(
            "{name}: cell_size must be positive, got {}",
            layout.cell_size
        )));
    }
    Ok(())
}

/// Debounced resize observer on top of [`ResponsiveLayout`]
#[derive(Debug, Clone)]
pub struct LayoutResolver {
    layout: ResponsiveLayout,
    debouncer: Debouncer<f64>,
    current: Option<GridLayout>,
}

impl LayoutResolver {
    pub fn new(layout: ResponsiveLayout, delay: Duration) -> Self {
        Self {
            layout,
            debouncer: Debouncer::new(delay),
            current: None,
        }
    }

    /// Resolve immediately, used for the first paint
    pub fn resolve_now(&mut self, container_width: f64) -> GridLayout {
        self.debouncer.cancel();
        let resolved = self.layout.resolve(container_width);
        self.current = Some(resolved);
        resolved
    }

    /// Record a resize tick
    pub fn observe(&mut self, container_width: f64, now: Instant) {
        self.debouncer.push(container_width, now);
    }

    /// Emit the new layout once the width has settled and only if it differs
    /// from the last emitted one
    pub fn poll(&mut self, now: Instant) -> Option<GridLayout> {
        let width = self.debouncer.poll(now)?;
        let resolved = self.layout.resolve(width);
        if self.current == Some(resolved) {
            return None;
        }
        tracing::debug!(
            width,
            columns = resolved.columns,
            cell_size = resolved.cell_size,
            "layout changed"
        );
        self.current = Some(resolved);
        Some(resolved)
    }

    pub fn current(&self) -> Option<GridLayout> {
        self.current
    }

    /// Swap the breakpoint table
    pub fn reconfigure(&mut self, layout: ResponsiveLayout) {
        self.layout = layout;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ResponsiveLayout {
        ResponsiveLayout::new(
            vec![
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
            GridLayout {
                columns: 52,
                cell_size: 12.0,
            },
        )
        .expect("valid table")
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let layout = table();
        assert_eq!(
            layout.resolve(400.0),
            GridLayout {
                columns: 13,
                cell_size: 8.0
            }
        );
        assert_eq!(layout.resolve(600.0).columns, 26);
        assert_eq!(
            layout.resolve(900.0),
            GridLayout {
                columns: 52,
                cell_size: 12.0
            }
        );
    }

    #[test]
    fn test_resolve_boundary_is_exclusive() {
        let layout = table();
        assert_eq!(layout.resolve(479.9).columns, 13);
        assert_eq!(layout.resolve(480.0).columns, 26);
        assert_eq!(layout.resolve(768.0).columns, 52);
    }

    #[test]
    fn test_descending_table_is_rejected() {
        let mut bps = table().breakpoints().to_vec();
        bps.reverse();
        let err = ResponsiveLayout::new(bps, GridLayout::default()).expect_err("descending");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_layouts_are_rejected() {
        let zero_cols = GridLayout {
            columns: 0,
            cell_size: 12.0,
        };
        assert!(ResponsiveLayout::fixed(zero_cols).is_err());
        let bad_cell = Breakpoint {
            max_width: 300.0,
            columns: 4,
            cell_size: 0.0,
        };
        assert!(ResponsiveLayout::new(vec![bad_cell], GridLayout::default()).is_err());
    }

    #[test]
    fn test_columns_deserialize_rejects_fractions() {
        let ok: Breakpoint = toml::from_str("max_width = 480.0\ncolumns = 13.0\ncell_size = 8.0")
            .expect("integral float");
        assert_eq!(ok.columns, 13);
        let bad = toml::from_str::<Breakpoint>("max_width = 480.0\ncolumns = 12.5\ncell_size = 8.0");
        assert!(bad.is_err());
    }

    #[test]
    fn test_resolver_debounces_and_dedupes() {
        let start = Instant::now();
        let ms = Duration::from_millis;
        let mut resolver = LayoutResolver::new(table(), ms(120));
        assert_eq!(resolver.resolve_now(1200.0).columns, 52);

        resolver.observe(700.0, start);
        resolver.observe(650.0, start + ms(50));
        assert_eq!(resolver.poll(start + ms(100)), None);
        assert_eq!(resolver.poll(start + ms(170)).map(|l| l.columns), Some(26));

        // Width changed but the resolved layout did not
        resolver.observe(500.0, start + ms(300));
        assert_eq!(resolver.poll(start + ms(500)), None);
        assert_eq!(resolver.current().map(|l| l.columns), Some(26));
    }

    #[test]
    fn test_reconfigure_swaps_table_and_forgets_current() {
        let start = Instant::now();
        let ms = Duration::from_millis;
        let mut resolver = LayoutResolver::new(table(), ms(120));
        assert_eq!(resolver.resolve_now(600.0).columns, 26);

        let fixed = GridLayout {
            columns: 26,
            cell_size: 10.0,
        };
        resolver.reconfigure(ResponsiveLayout::fixed(fixed).expect("valid"));
        assert_eq!(resolver.current(), None);

        // Equal to the old layout, but emitted again under the new table
        resolver.observe(300.0, start);
        assert_eq!(resolver.poll(start + ms(130)), Some(fixed));
        assert_eq!(resolver.resolve_now(2000.0), fixed);
    }
}
