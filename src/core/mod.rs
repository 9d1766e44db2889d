//! Core abstractions

pub mod device;
