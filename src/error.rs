// src/error.rs

//! Error types for display-server lifecycle operations.

use thiserror::Error;

/// Failure of a display-server lifecycle operation.
#[derive(Debug, Error)]
pub enum Error {
    /// The bootstrap sequence failed before a usable handle existed.
    ///
    /// Covers every construction step: temporary-directory and
    /// authority-file creation, cookie installation, child spawn, and
    /// the readiness handshake. A half-started display server has no
    /// degraded mode, so none of these are recoverable.
    #[error("display server bootstrap failed: {0:#}")]
    Bootstrap(anyhow::Error),

    /// Waiting for the child process during shutdown failed.
    ///
    /// Indicates a process-tracking bug (wrong pid or no such child)
    /// rather than an ordinary shutdown condition.
    #[error("failed to wait for the display server child process")]
    Wait(#[source] std::io::Error),
}
