//! Command-line interface module
//!
//! This module is only available when the `cli` feature is enabled.

pub mod main;

pub use main::main;
