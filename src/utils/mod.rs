//! Logging and shared test helpers.

pub mod log;
pub mod test_utils;
