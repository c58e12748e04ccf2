//! spool-rs: line-protocol mailbox server
//!
//! Clients connect over TCP, authenticate against a directory service and
//! then send, list, read and delete messages kept in per-user spool
//! directories.
//!
//! # Security Features
//!
//! - Credentials verified by an LDAP bind (or a local Argon2 database)
//! - Failed LOGINs counted per client address in a sliding window
//! - Addresses that reach the limit are blacklisted, with optional expiry
//! - Usernames validated before they are used as directory names
//! - Bounded command size
//!
//! # Example
//!
//! ```no_run
//! use spool_rs::config::Config;
//! use spool_rs::protocol::MailServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let server = MailServer::from_config(&config).await?;
//!
//!     let shutdown = server.shutdown_token();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.cancel();
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`protocol`]: Framing, commands, sessions and the listener
//! - [`storage`]: Mailbox spool and blacklist file
//! - [`security`]: Authentication gate, lockout and directory backends
//! - [`utils`]: Input validation

pub mod config;
pub mod error;
pub mod protocol;
pub mod security;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{MailError, Result};
