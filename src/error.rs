//! Error types for deepa-io
//!
//! # Error Recovery Strategies
//!
//! ## Fatal Errors (Startup Only)
//!
//! - **`Config`**: Configuration file is invalid or an option is out of its
//!   documented range. Fix the configuration and restart.
//! - **`UnknownDevice`**: Device type not recognized. Check the `[device]`
//!   section.
//! - **`Probe`**: The network interface could not be resolved after the
//!   retry window. Check cabling / interface name.
//! - **`Io`** during startup (socket bind): another process may hold the
//!   data port.
//!
//! All of these terminate the daemon with exit code 1 and a one-line cause.
//!
//! ## Runtime Errors (Log and Continue)
//!
//! Malformed datagrams and transient socket errors never surface as `Error`
//! values; the receiver and beacon loops log a diagnostic and keep serving.
//! Nothing propagates across threads.

use thiserror::Error;

/// Errors that can occur in deepa-io
///
/// See module-level documentation for recovery strategies.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown device type: {0}")]
    UnknownDevice(String),

    #[error("Network probe error: {0}")]
    Probe(String),

    #[error("Mutex poisoned")]
    MutexPoisoned,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
