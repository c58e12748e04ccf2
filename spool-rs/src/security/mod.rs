//! Security module
//!
//! Provides LOGIN authentication and brute-force protection:
//! - [`auth`]: The authentication gate used by sessions
//! - [`directory`]: Directory service trait and backend selection
//! - [`ldap`]: LDAP simple-bind backend
//! - [`local`]: SQLite backend for development
//! - [`lockout`]: Failed-attempt tracking per client address

pub mod auth;
pub mod directory;
pub mod ldap;
pub mod local;
pub mod lockout;

pub use auth::{AuthGate, AuthOutcome};
pub use directory::Directory;
pub use ldap::LdapDirectory;
pub use local::LocalDirectory;
pub use lockout::{LockoutPolicy, LockoutTracker};
