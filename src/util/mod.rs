//! Utility functions.

pub mod time;

pub use time::{format_countdown, format_relative_time};
