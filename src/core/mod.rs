// Core types
pub mod types;
pub use types::*;

// Call stack capture
pub mod stack;

// Lock-order graph and cycle search
pub mod graph;

// Deadlock detector
pub mod detector;
pub use detector::reporter::{DeadlockCallback, default_callback, format_report};
pub use detector::{Detector, DetectorConfig, disable, init_detector, is_enabled, record_op};

// Tracked lock primitives
pub mod locks;

// Logging functionality
#[cfg(feature = "logging")]
pub mod logger;

#[cfg(feature = "logging")]
use anyhow::Context;
use anyhow::Result;
use std::sync::Arc;

/// Lockwatch configuration struct
pub struct Lockwatch {
    #[cfg(feature = "logging")]
    log_path: Option<std::path::PathBuf>,
    callback: DeadlockCallback,
    capture_stacks: bool,
}

impl Default for Lockwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Lockwatch {
    /// Create a new Lockwatch with default settings
    ///
    /// By default:
    /// - Logging is disabled
    /// - Stacks are captured on every acquisition
    /// - The callback prints the report to stderr and exits the process
    pub fn new() -> Self {
        Lockwatch {
            #[cfg(feature = "logging")]
            log_path: None,
            callback: default_callback(),
            capture_stacks: true,
        }
    }

    /// Activate logger and set the path for the log file
    ///
    /// # Arguments
    /// * `path` - Path to the log file. If the path contains "{timestamp}",
    ///   it will be replaced with the current timestamp.
    ///
    /// # Returns
    /// The builder for method chaining
    #[cfg(feature = "logging")]
    pub fn with_log<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.log_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set a custom callback to be invoked when a deadlock is detected
    ///
    /// The callback runs on the thread that detected the violation, before
    /// that thread touches the real lock.
    ///
    /// # Arguments
    /// * `callback` - Function to call with the kind and one info per thread
    ///
    /// # Returns
    /// The builder for method chaining
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(DeadlockKind, Vec<DeadlockInfo>) + Send + Sync + 'static,
    {
        self.callback = Arc::new(callback);
        self
    }

    /// Enable or disable call stack capture
    pub fn capture_stacks(mut self, enabled: bool) -> Self {
        self.capture_stacks = enabled;
        self
    }

    /// Initialize the deadlock detector with the configured settings
    ///
    /// Starting again resets everything recorded so far.
    ///
    /// # Errors
    /// Returns an error if the log file cannot be created
    pub fn start(self) -> Result<()> {
        #[cfg(feature = "logging")]
        let logger = match self.log_path {
            Some(path) => Some(
                logger::EventLogger::with_file(&path)
                    .with_context(|| format!("Failed to initialize logger at {}", path.display()))?,
            ),
            None => None,
        };

        init_detector(DetectorConfig {
            callback: self.callback,
            capture_stacks: self.capture_stacks,
            #[cfg(feature = "logging")]
            logger,
        });

        Ok(())
    }
}
