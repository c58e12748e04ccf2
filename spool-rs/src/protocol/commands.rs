use crate::error::{MailError, Result};
use crate::protocol::codec::{Frame, BODY_TERMINATOR};
use crate::utils::{parse_index, validate_subject, validate_username};
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: String, password: String },
    Send { receiver: String, subject: String, body: String },
    List,
    Read { index: usize },
    Del { index: usize },
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(frame: &Frame) -> Result<Self> {
        let args = frame.args();

        match frame.verb() {
            "LOGIN" => {
                let [username, password, ..] = args else {
                    return Err(MailError::Protocol(
                        "LOGIN requires username and password".to_string(),
                    ));
                };

                // Username rules are checked by the authentication gate so
                // malformed attempts still count as failures
                Ok(Command::Login {
                    username: username.clone(),
                    password: password.clone(),
                })
            }
            "SEND" => Self::parse_send(args),
            "LIST" => Ok(Command::List),
            "READ" => Ok(Command::Read {
                index: Self::parse_index_arg("READ", args)?,
            }),
            "DEL" => Ok(Command::Del {
                index: Self::parse_index_arg("DEL", args)?,
            }),
            "QUIT" => Ok(Command::Quit),
            verb => Ok(Command::Unknown(verb.to_string())),
        }
    }

    fn parse_send(args: &[String]) -> Result<Self> {
        // The terminator is missing only when the peer hung up mid-command
        let args = match args.split_last() {
            Some((last, rest)) if last == BODY_TERMINATOR => rest,
            _ => args,
        };

        let [receiver, subject, body @ ..] = args else {
            return Err(MailError::Protocol(
                "SEND requires receiver and subject".to_string(),
            ));
        };
        validate_username(receiver)?;
        validate_subject(subject)?;

        // Dot-stuffed body lines
        let body = body
            .iter()
            .map(|line| {
                line.strip_prefix('.')
                    .filter(|rest| rest.starts_with('.'))
                    .unwrap_or(line.as_str())
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Command::Send {
            receiver: receiver.clone(),
            subject: subject.clone(),
            body,
        })
    }

    fn parse_index_arg(verb: &str, args: &[String]) -> Result<usize> {
        let index = args
            .first()
            .ok_or_else(|| MailError::Protocol(format!("{} requires a message number", verb)))?;
        parse_index(index)
    }

    /// Whether the command needs an authenticated session
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Command::Send { .. } | Command::List | Command::Read { .. } | Command::Del { .. }
        )
    }

    pub fn verb(&self) -> &str {
        match self {
            Command::Login { .. } => "LOGIN",
            Command::Send { .. } => "SEND",
            Command::List => "LIST",
            Command::Read { .. } => "READ",
            Command::Del { .. } => "DEL",
            Command::Quit => "QUIT",
            Command::Unknown(verb) => verb,
        }
    }
}

// Keeps passwords out of logs
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Command::Send {
                receiver,
                subject,
                body,
            } => f
                .debug_struct("Send")
                .field("receiver", receiver)
                .field("subject", subject)
                .field("body_len", &body.len())
                .finish(),
            Command::List => f.write_str("List"),
            Command::Read { index } => f.debug_struct("Read").field("index", index).finish(),
            Command::Del { index } => f.debug_struct("Del").field("index", index).finish(),
            Command::Quit => f.write_str("Quit"),
            Command::Unknown(verb) => f.debug_tuple("Unknown").field(verb).finish(),
        }
    }
}
