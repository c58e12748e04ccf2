//! LOGIN authentication gate
//!
//! Combines the blacklist, the per-address failure tracker and the
//! directory service:
//!
//! 1. A blacklisted address fails immediately; the directory is not asked.
//! 2. A malformed username fails without asking the directory.
//! 3. Otherwise the directory verifies the credentials.
//! 4. A rejected or unverifiable attempt is counted against the address.
//!    Reaching the limit writes a blacklist entry.
//!
//! # Security
//! - Passwords are never logged
//! - Directory outages count as failures (fail closed)
//! - Blacklist read errors refuse the login

use crate::error::Result;
use crate::security::directory::Directory;
use crate::security::lockout::{LockoutPolicy, LockoutTracker};
use crate::storage::BlacklistStore;
use crate::utils::validate_username;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of a LOGIN attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Credentials verified
    Success,
    /// Credentials rejected or directory unavailable
    Rejected,
    /// This attempt pushed the address over the limit; it is now blacklisted
    LockedOut,
    /// The address was already blacklisted
    Blacklisted,
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success)
    }
}

/// Authentication gate shared by all sessions
pub struct AuthGate {
    directory: Arc<dyn Directory>,
    blacklist: Arc<BlacklistStore>,
    lockout: LockoutTracker,
}

impl AuthGate {
    pub fn new(
        directory: Arc<dyn Directory>,
        blacklist: Arc<BlacklistStore>,
        policy: LockoutPolicy,
    ) -> Self {
        Self {
            directory,
            blacklist,
            lockout: LockoutTracker::new(policy),
        }
    }

    pub fn blacklist(&self) -> &BlacklistStore {
        &self.blacklist
    }

    pub fn lockout(&self) -> &LockoutTracker {
        &self.lockout
    }

    /// Authenticate `username` connecting from `address`
    pub async fn authenticate(&self, address: &str, username: &str, password: &str) -> AuthOutcome {
        info!("LOGIN attempt for {} from {}", username, address);

        match self.blacklist.contains(address).await {
            Ok(false) => {}
            Ok(true) => {
                warn!("LOGIN refused for {}: {} is blacklisted", username, address);
                return AuthOutcome::Blacklisted;
            }
            Err(e) => {
                error!("Blacklist lookup failed, refusing LOGIN: {}", e);
                return AuthOutcome::Rejected;
            }
        }

        if let Err(e) = validate_username(username) {
            warn!("LOGIN failed from {}: {}", address, e);
            return self.reject(address).await;
        }

        match self.directory.verify(username, password).await {
            Ok(true) => {
                info!("LOGIN successful for {} from {}", username, address);
                return AuthOutcome::Success;
            }
            Ok(false) => {
                warn!("LOGIN failed for {} from {} (invalid credentials)", username, address);
            }
            Err(e) => {
                error!(
                    "LOGIN failed for {} from {} ({} directory error: {})",
                    username,
                    address,
                    self.directory.name(),
                    e
                );
            }
        }

        self.reject(address).await
    }

    /// Count a failed attempt and report the outcome
    async fn reject(&self, address: &str) -> AuthOutcome {
        match self.record_failure(address).await {
            Ok(true) => AuthOutcome::LockedOut,
            Ok(false) => {
                debug!(
                    "{} failed attempts from {} in the current window",
                    self.lockout().failures(address).await,
                    address
                );
                AuthOutcome::Rejected
            }
            Err(e) => {
                error!("Failed to blacklist {}: {}", address, e);
                AuthOutcome::Rejected
            }
        }
    }

    /// Count a failure, blacklisting the address once the limit is reached
    async fn record_failure(&self, address: &str) -> Result<bool> {
        if !self.lockout.record_failure(address).await {
            return Ok(false);
        }

        let policy = self.lockout.policy();
        warn!(
            "{} reached {} failed LOGIN attempts, blacklisting",
            address, policy.max_attempts
        );

        self.blacklist.append(address, policy.ban).await?;
        self.lockout.reset(address).await;
        Ok(true)
    }
}
