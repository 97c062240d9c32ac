//! Scroll - Scroll Position Types and Persisted Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::SCROLL_KEY_PREFIX;

/// Scroll offsets emitted to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub top: f64,
    pub left: f64,
}

/// A raw scroll event from the host's scroll listener
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEvent {
    pub top: f64,
    pub left: f64,
    /// Monotonic sequence number assigned by the host (event time stamp or counter)
    pub seq: u64,
}

impl ScrollEvent {
    pub fn new(top: f64, left: f64, seq: u64) -> Self {
        Self { top, left, seq }
    }
}

/// Durable key identifying one (user, grid) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScrollKey(String);

impl ScrollKey {
    /// Build a key from a user id and a grid id.
    ///
    /// Both parts are escaped so that `("a/b", "c")` and `("a", "b/c")` map to
    /// different keys.
    pub fn new(user_id: &str, grid_id: &str) -> Self {
        Self(format!(
            "{SCROLL_KEY_PREFIX}/{}/{}",
            escape_component(user_id),
            escape_component(grid_id)
        ))
    }

    /// Wrap an already-derived key
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScrollKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn escape_component(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            _ => out.push(c),
        }
    }
    out
}

/// One persisted scroll position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedScrollRecord {
    pub key: ScrollKey,
    pub scroll_top: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_index: Option<usize>,
    pub saved_at: DateTime<Utc>,
}

impl PersistedScrollRecord {
    /// Record stamped with the current time
    pub fn now(key: ScrollKey, scroll_top: f64, selected_index: Option<usize>) -> Self {
        Self {
            key,
            scroll_top,
            selected_index,
            saved_at: Utc::now(),
        }
    }
}
