//! Tree configuration

use std::time::Duration;

/// Label shown for the workspace root node unless overridden
pub const DEFAULT_ROOT_LABEL: &str = "File Explorer";

/// Options for opening a [`WorkspaceTree`](crate::tree::WorkspaceTree)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOptions {
    /// Fixed display name of the root node
    pub root_label: String,
    /// Poll interval for poll-based notification backends
    pub poll_interval: Duration,
    /// Back watches with OS change notification
    ///
    /// When disabled, intents only arrive through an
    /// [`IntentSender`](crate::tree::IntentSender).
    pub native_events: bool,
    /// Enumerate the root and first-level directories on a background worker
    pub defer_population: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            root_label: DEFAULT_ROOT_LABEL.to_string(),
            poll_interval: Duration::from_millis(500),
            native_events: true,
            defer_population: false,
        }
    }
}

impl TreeOptions {
    pub fn with_root_label(mut self, label: impl Into<String>) -> Self {
        self.root_label = label.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_native_events(mut self, enabled: bool) -> Self {
        self.native_events = enabled;
        self
    }

    pub fn with_defer_population(mut self, enabled: bool) -> Self {
        self.defer_population = enabled;
        self
    }
}
