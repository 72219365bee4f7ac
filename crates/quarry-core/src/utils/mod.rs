//! Utility functions shared by the quarry crates.
//!
//! - [`text`]: message templating and identifier helpers.

pub mod text;

pub use text::{format_template, is_identifier};
