//! Directory service abstraction
//!
//! The server never stores passwords for its users; it asks a directory
//! service whether a username/password pair binds successfully.

use crate::config::{DirectoryBackend, DirectoryConfig};
use crate::error::Result;
use crate::security::ldap::LdapDirectory;
use crate::security::local::LocalDirectory;
use std::sync::Arc;
use tracing::info;

/// Placeholder replaced by the login name in a bind DN template
pub const USER_PLACEHOLDER: &str = "{user}";

/// Credential verifier
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Check a username/password pair
    ///
    /// `Ok(false)` means the credentials were rejected, `Err` that the
    /// directory could not be asked.
    async fn verify(&self, username: &str, password: &str) -> Result<bool>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Build the bind identity for `username`
pub fn bind_dn(template: &str, username: &str) -> String {
    template.replace(USER_PLACEHOLDER, username)
}

/// Create the directory backend selected in the configuration
pub async fn from_config(config: &DirectoryConfig) -> Result<Arc<dyn Directory>> {
    let directory: Arc<dyn Directory> = match config.backend {
        DirectoryBackend::Ldap => Arc::new(LdapDirectory::new(
            config.ldap_url.clone(),
            config.bind_dn_template.clone(),
            config.starttls,
            config.timeout(),
        )),
        DirectoryBackend::Local => Arc::new(LocalDirectory::new(&config.database_url).await?),
    };

    info!("Using {} directory backend", directory.name());
    Ok(directory)
}
