// ABOUTME: Library root for berth - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod credentials;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod runtime;
pub mod stack;
pub mod types;
