//! Per-connection protocol state machine
//!
//! A session starts `Unauthenticated`, becomes `Authenticated` after a
//! successful LOGIN and ends `Closed` on QUIT, EOF, a transport error or
//! server shutdown. Exactly one response is written per decoded frame.

use crate::error::{MailError, Result};
use crate::protocol::codec::{Frame, FrameCodec};
use crate::protocol::commands::Command;
use crate::protocol::response::Response;
use crate::security::AuthGate;
use crate::storage::{MailboxListing, MailboxStore, Message};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Session states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated { username: String },
    Closed,
}

pub struct Session {
    peer: SocketAddr,
    state: SessionState,
    /// Failed LOGINs during this connection
    failed_logins: u32,
    storage: Arc<MailboxStore>,
    gate: Arc<AuthGate>,
}

impl Session {
    pub fn new(peer: SocketAddr, storage: Arc<MailboxStore>, gate: Arc<AuthGate>) -> Self {
        Self {
            peer,
            state: SessionState::Unauthenticated,
            failed_logins: 0,
            storage,
            gate,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn failed_logins(&self) -> u32 {
        self.failed_logins
    }

    fn username(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { username } => Some(username),
            _ => None,
        }
    }

    /// Drive the session over `stream` until it closes
    pub async fn run<S>(
        mut self,
        stream: S,
        banner: &str,
        max_frame_bytes: usize,
        cancel: CancellationToken,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(stream, FrameCodec::new(max_frame_bytes));

        framed.send(Response::Banner(banner.to_string())).await?;

        while self.state != SessionState::Closed {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Server shutting down, closing session");
                    break;
                }
                next = framed.next() => next,
            };

            let frame = match next {
                Some(Ok(frame)) => frame,
                None => {
                    info!("Connection closed by peer");
                    break;
                }
                Some(Err(MailError::FrameTooLarge(limit))) => {
                    warn!("Command exceeds {} bytes, closing session", limit);
                    if let Err(e) = framed.send(Response::Err).await {
                        debug!("Failed to report oversized command: {}", e);
                    }
                    break;
                }
                Some(Err(e)) => {
                    warn!("Read error: {}", e);
                    break;
                }
            };

            let response = self.handle_frame(frame).await;
            framed.send(response).await?;
        }

        self.state = SessionState::Closed;

        let mut stream = framed.into_inner();
        if let Err(e) = stream.shutdown().await {
            debug!("Shutdown of connection failed: {}", e);
        }

        info!(
            "Session ended ({} failed LOGIN attempts)",
            self.failed_logins
        );
        Ok(())
    }

    /// Parse and execute one frame
    pub async fn handle_frame(&mut self, frame: Frame) -> Response {
        debug!("{} frame with {} fields", frame.verb(), frame.fields().len());

        match Command::parse(&frame) {
            Ok(command) => self.handle_command(command).await,
            Err(e) => {
                warn!("Rejected {} command: {}", frame.verb(), e);
                Response::Err
            }
        }
    }

    /// Execute a command and build the response
    pub async fn handle_command(&mut self, command: Command) -> Response {
        debug!("Handling {:?} in state {:?}", command, self.state);

        match command {
            Command::Quit => {
                info!("QUIT received");
                self.state = SessionState::Closed;
                Response::Quit
            }
            Command::Login { username, password } => self.handle_login(&username, &password).await,
            Command::Unknown(verb) => {
                warn!("Unknown command: {:?}", verb);
                Response::Err
            }
            command if command.requires_auth() => {
                let Some(username) = self.username().map(str::to_owned) else {
                    warn!("{} refused: not logged in", command.verb());
                    return Response::LoginRequired;
                };

                match self.handle_mailbox_command(&username, command).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("Mailbox command for {} failed: {}", username, e);
                        Response::Err
                    }
                }
            }
            command => {
                warn!("No handler for {}", command.verb());
                Response::Err
            }
        }
    }

    async fn handle_login(&mut self, username: &str, password: &str) -> Response {
        if let Some(current) = self.username() {
            warn!("LOGIN as {} refused: already logged in as {}", username, current);
            return Response::Err;
        }

        let address = self.peer.ip().to_string();

        let outcome = self.gate.authenticate(&address, username, password).await;
        if outcome.is_success() {
            self.state = SessionState::Authenticated {
                username: username.to_string(),
            };
            return Response::Ok;
        }

        self.failed_logins += 1;
        debug!(
            "LOGIN failed ({:?}), {} failures in this session",
            outcome, self.failed_logins
        );
        Response::Err
    }

    async fn handle_mailbox_command(&self, username: &str, command: Command) -> Result<Response> {
        match command {
            Command::Send {
                receiver,
                subject,
                body,
            } => {
                let message = Message::new(username, receiver, subject, body);
                self.storage.send(&message).await?;
                Ok(Response::Ok)
            }
            Command::List => {
                let listing = self.storage.list(username).await?;
                debug!("LIST for {}: {} messages", username, listing.count());

                match listing {
                    MailboxListing::UnknownUser => {
                        info!("LIST for {}: no mailbox yet", username);
                        Ok(Response::Err)
                    }
                    MailboxListing::Entries(entries) => Ok(Response::Listing(entries)),
                }
            }
            Command::Read { index } => {
                let message = self.storage.read(username, index).await?;
                Ok(Response::Message(message.body))
            }
            Command::Del { index } => {
                self.storage.delete(username, index).await?;
                Ok(Response::Ok)
            }
            other => Err(MailError::Protocol(format!(
                "{} is not a mailbox command",
                other.verb()
            ))),
        }
    }
}
