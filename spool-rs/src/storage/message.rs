//! Stored message format
//!
//! A message file holds four newline-separated parts: sender, receiver,
//! subject and the body (which may span many lines). File names carry a
//! microsecond timestamp and a random UUID so they never collide and sort
//! in arrival order.

use crate::error::{MailError, Result};
use uuid::Uuid;

/// Extension of committed message files
pub const MESSAGE_EXT: &str = "msg";

/// Extension of files still being written
pub const PARTIAL_EXT: &str = "tmp";

/// A mail message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub receiver: String,
    pub subject: String,
    pub body: String,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Serialize for storage
    pub fn to_file_contents(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            self.sender, self.receiver, self.subject, self.body
        )
    }

    /// Parse a stored message file
    pub fn parse(contents: &str) -> Result<Self> {
        let mut parts = contents.splitn(4, '\n');

        let (Some(sender), Some(receiver), Some(subject)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(MailError::Storage(
                "Message file is missing header lines".to_string(),
            ));
        };

        Ok(Self {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            subject: subject.to_string(),
            body: parts.next().unwrap_or_default().to_string(),
        })
    }
}

/// Width of the numeric ordering prefix
const PREFIX_WIDTH: usize = 20;

/// Generate a unique, sortable file name whose prefix is at least `floor`
///
/// The prefix is the current time in microseconds unless the clock is
/// behind `floor`, so a clock stepping backwards cannot sort new mail
/// ahead of existing mail.
pub fn generate_file_name(floor: u64) -> String {
    let micros = u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or(0);
    format!(
        "{:0width$}-{}.{}",
        micros.max(floor),
        Uuid::new_v4().simple(),
        MESSAGE_EXT,
        width = PREFIX_WIDTH
    )
}

/// Ordering prefix of a generated file name
pub fn file_name_prefix(name: &str) -> Option<u64> {
    let (prefix, _) = name.split_once('-')?;
    if prefix.len() != PREFIX_WIDTH {
        return None;
    }
    prefix.parse().ok()
}

/// Whether a directory entry name is a committed message file
pub fn is_message_file(name: &str) -> bool {
    name.strip_suffix(MESSAGE_EXT)
        .is_some_and(|stem| stem.ends_with('.') && stem.len() > 1 && !stem.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_contents_layout() {
        let msg = Message::new("alice", "bob", "Hi", "line1\nline2");
        assert_eq!(msg.to_file_contents(), "alice\nbob\nHi\nline1\nline2");
    }

    #[test]
    fn test_parse_multiline_body() {
        let msg = Message::parse("alice\nbob\nHi\nline1\n\nline3").unwrap();
        assert_eq!(msg.sender, "alice");
        assert_eq!(msg.receiver, "bob");
        assert_eq!(msg.subject, "Hi");
        assert_eq!(msg.body, "line1\n\nline3");
    }

    #[test]
    fn test_parse_empty_body() {
        let msg = Message::parse("alice\nbob\nHi\n").unwrap();
        assert_eq!(msg.body, "");

        let msg = Message::parse("alice\nbob\nHi").unwrap();
        assert_eq!(msg.body, "");
    }

    #[test]
    fn test_parse_truncated() {
        assert!(Message::parse("alice\nbob").is_err());
        assert!(Message::parse("").is_err());
    }

    #[test]
    fn test_file_names_are_unique_and_ordered() {
        let first = generate_file_name(0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = generate_file_name(0);

        assert_ne!(first, second);
        assert!(first < second);
        assert!(is_message_file(&first));
    }

    #[test]
    fn test_file_name_respects_floor() {
        let floor = u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap() + 3_600_000_000;
        let name = generate_file_name(floor);

        assert_eq!(file_name_prefix(&name), Some(floor));
        assert!(name > generate_file_name(0));
    }

    #[test]
    fn test_file_name_prefix() {
        assert_eq!(file_name_prefix("00000000000000000042-abc.msg"), Some(42));
        assert_eq!(file_name_prefix("42-abc.msg"), None);
        assert_eq!(file_name_prefix("notes.msg"), None);
    }

    #[test]
    fn test_is_message_file() {
        assert!(is_message_file("00000000000000000001-abc.msg"));
        assert!(!is_message_file("00000000000000000001-abc.msg.tmp"));
        assert!(!is_message_file(".msg"));
        assert!(!is_message_file("notes.txt"));
    }
}
