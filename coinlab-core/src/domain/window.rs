//! Rolling window configuration.
//!
//! The window set is fixed at configuration time. Column names such as
//! `ma_30d` are derived from it by the schema module, never parsed back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default trailing windows, in observations.
pub const DEFAULT_WINDOWS: [usize; 6] = [7, 14, 30, 90, 180, 365];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("window set must contain at least one window")]
    Empty,

    #[error("window size must be positive, got {0}")]
    ZeroWindow(usize),
}

/// Sorted, de-duplicated set of positive window sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct WindowSet(Vec<usize>);

impl WindowSet {
    pub fn new(windows: impl IntoIterator<Item = usize>) -> Result<Self, WindowError> {
        let mut sizes: Vec<usize> = windows.into_iter().collect();
        if let Some(&zero) = sizes.iter().find(|&&w| w == 0) {
            return Err(WindowError::ZeroWindow(zero));
        }
        sizes.sort_unstable();
        sizes.dedup();
        if sizes.is_empty() {
            return Err(WindowError::Empty);
        }
        Ok(Self(sizes))
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, window: usize) -> bool {
        self.0.binary_search(&window).is_ok()
    }

    /// Position of `window` inside the set, matching `FeatureRow::windows`.
    pub fn position(&self, window: usize) -> Option<usize> {
        self.0.binary_search(&window).ok()
    }
}

impl Default for WindowSet {
    fn default() -> Self {
        Self(DEFAULT_WINDOWS.to_vec())
    }
}

impl TryFrom<Vec<usize>> for WindowSet {
    type Error = WindowError;

    fn try_from(value: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WindowSet> for Vec<usize> {
    fn from(value: WindowSet) -> Self {
        value.0
    }
}
