//! Filesystem storage
//!
//! - [`mailbox`]: Per-user mailbox directories with positional addressing
//! - [`message`]: Message file format and collision-free file names
//! - [`blacklist`]: Append-only blacklist of client addresses

pub mod blacklist;
pub mod mailbox;
pub mod message;

pub use blacklist::{BlacklistEntry, BlacklistStore};
pub use mailbox::{MailboxEntry, MailboxListing, MailboxStore};
pub use message::Message;
