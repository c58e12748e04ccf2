//! Utility modules
//!
//! - [`validation`]: Username, subject and message-number validation

pub mod validation;

pub use validation::{parse_index, validate_subject, validate_username};
