//! deepa-io - PixelPusher network endpoint for pixel matrix devices
//!
//! This library makes any display that implements [`OutputDevice`] act as a
//! PixelPusher-compatible fixture: it broadcasts the discovery beacon that
//! off-the-shelf lighting controllers listen for, receives their UDP pixel
//! frames, and draws the decoded strips into the device with tear-free
//! full-frame commits.

pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod protocol;
pub mod server;

// Re-export commonly used types
pub use crate::core::device::{Canvas, OutputDevice};
pub use config::Config;
pub use error::{Error, Result};
