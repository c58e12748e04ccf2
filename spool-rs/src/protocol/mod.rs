//! Mailbox protocol
//!
//! - [`codec`]: Splits the byte stream into command frames
//! - [`commands`]: Command parsing and validation
//! - [`response`]: Reply rendering
//! - [`session`]: Per-connection state machine
//! - [`server`]: Listener and shutdown coordination

pub mod codec;
pub mod commands;
pub mod response;
pub mod server;
pub mod session;

pub use codec::{Frame, FrameCodec};
pub use commands::Command;
pub use response::Response;
pub use server::MailServer;
pub use session::{Session, SessionState};
