//! Spawn configuration for PTY children.

/// Terminal window size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of columns.
    pub cols: u16,
    /// Number of rows.
    pub rows: u16,
}

impl WindowSize {
    /// Create a window size.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Whether either dimension is zero (what a detached terminal reports).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl From<(u16, u16)> for WindowSize {
    fn from((cols, rows): (u16, u16)) -> Self {
        Self::new(cols, rows)
    }
}

/// Configuration for spawning a child in a PTY.
///
/// The child inherits the parent environment and working directory.
#[derive(Debug, Clone, Default)]
pub struct PtyConfig {
    /// Initial window size.
    pub window_size: WindowSize,
}

impl PtyConfig {
    /// Set the initial window size, ignoring empty sizes.
    #[must_use]
    pub fn window_size(mut self, size: impl Into<WindowSize>) -> Self {
        let size = size.into();
        if !size.is_empty() {
            self.window_size = size;
        }
        self
    }
}
