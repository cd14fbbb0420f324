//! # Clicktrack Library
//!
//! This library exposes the Clicktrack modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;
pub mod config;
pub mod tasks;

// Re-export clicktrack_core for convenience
pub use clicktrack_core;
