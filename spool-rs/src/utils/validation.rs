//! Input validation for protocol arguments
//!
//! Usernames double as mailbox directory names, so anything that passes
//! [`validate_username`] is safe to join onto the spool root.

use crate::error::{MailError, Result};

/// Maximum username length
pub const MAX_USERNAME_LEN: usize = 8;

/// Maximum subject length
pub const MAX_SUBJECT_LEN: usize = 80;

/// Validate a username (1-8 characters, `a-z` and `0-9` only)
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(MailError::InvalidInput("Username is empty".to_string()));
    }

    if username.len() > MAX_USERNAME_LEN {
        return Err(MailError::InvalidInput(format!(
            "Username longer than {} characters",
            MAX_USERNAME_LEN
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(MailError::InvalidInput(
            "Username may only contain a-z and 0-9".to_string(),
        ));
    }

    Ok(())
}

/// Validate a message subject
pub fn validate_subject(subject: &str) -> Result<()> {
    if subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(MailError::InvalidInput(format!(
            "Subject longer than {} characters",
            MAX_SUBJECT_LEN
        )));
    }

    if subject.chars().any(char::is_control) {
        return Err(MailError::InvalidInput(
            "Subject contains control characters".to_string(),
        ));
    }

    Ok(())
}

/// Parse a zero-based positional message index
pub fn parse_index(input: &str) -> Result<usize> {
    let input = input.trim();

    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return Err(MailError::InvalidInput(format!(
            "Invalid message number: {:?}",
            input
        )));
    }

    input
        .parse()
        .map_err(|_| MailError::InvalidInput(format!("Message number out of range: {}", input)))
}
