//! Server responses

use crate::storage::MailboxEntry;
use std::fmt;

/// A reply written to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Greeting sent once after connect
    Banner(String),
    Ok,
    Err,
    /// Privileged command before a successful LOGIN
    LoginRequired,
    /// LIST result
    Listing(Vec<MailboxEntry>),
    /// READ result, carrying the message body
    Message(String),
    /// Terminal token for QUIT
    Quit,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Banner(banner) => f.write_str(banner),
            Response::Ok => f.write_str("OK\n"),
            Response::Err => f.write_str("ERR\n"),
            Response::LoginRequired => f.write_str("ERR\nLogin required\n"),
            Response::Listing(entries) => {
                f.write_str("OK\n")?;
                for entry in entries {
                    writeln!(f, "{}: {} (from {})", entry.index, entry.subject, entry.sender)?;
                }
                writeln!(f, "Total message count: {}", entries.len())
            }
            Response::Message(body) => write!(f, "OK\n{}\n", body),
            Response::Quit => f.write_str("quit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, sender: &str, subject: &str) -> MailboxEntry {
        MailboxEntry {
            index,
            name: format!("{}.msg", index),
            sender: sender.to_string(),
            subject: subject.to_string(),
        }
    }

    #[test]
    fn test_status_responses() {
        assert_eq!(Response::Ok.to_string(), "OK\n");
        assert_eq!(Response::Err.to_string(), "ERR\n");
        assert_eq!(Response::LoginRequired.to_string(), "ERR\nLogin required\n");
        assert_eq!(Response::Quit.to_string(), "quit");
    }

    #[test]
    fn test_listing() {
        let response = Response::Listing(vec![
            entry(0, "alice", "Hello"),
            entry(1, "carol", "Lunch?"),
        ]);

        assert_eq!(
            response.to_string(),
            "OK\n0: Hello (from alice)\n1: Lunch? (from carol)\nTotal message count: 2\n"
        );
    }

    #[test]
    fn test_empty_listing() {
        assert_eq!(
            Response::Listing(Vec::new()).to_string(),
            "OK\nTotal message count: 0\n"
        );
    }

    #[test]
    fn test_message() {
        assert_eq!(
            Response::Message("line1\nline2".to_string()).to_string(),
            "OK\nline1\nline2\n"
        );
    }
}
