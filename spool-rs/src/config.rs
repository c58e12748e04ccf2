use crate::error::{MailError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub directory: DirectoryConfig,
    pub lockout: LockoutConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Sent once to every client right after the connection is accepted
    pub banner: String,
    /// Upper bound for one buffered command, SEND bodies included
    pub max_frame_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding one sub-directory per mailbox
    pub spool_path: String,
    /// Defaults to `blacklist.txt` next to the spool root
    pub blacklist_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryBackend {
    Ldap,
    Local,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub backend: DirectoryBackend,
    pub ldap_url: String,
    pub starttls: bool,
    /// `{user}` is replaced by the login name
    pub bind_dn_template: String,
    pub timeout_secs: u64,
    /// Used by the `local` backend only
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LockoutConfig {
    pub max_attempts: u32,
    pub window_secs: u64,
    /// 0 bans permanently
    pub ban_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MailError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Ok(toml::from_str(&content)?)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:6543".to_string(),
            banner: "Welcome to spool-rs!\nPlease enter your commands...\n".to_string(),
            max_frame_bytes: 1024 * 1024, // 1MB
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            spool_path: "./mail-spooler".to_string(),
            blacklist_path: None,
        }
    }
}

impl StorageConfig {
    /// Location of the blacklist file
    pub fn blacklist_file(&self) -> PathBuf {
        if let Some(path) = &self.blacklist_path {
            return PathBuf::from(path);
        }

        match Path::new(&self.spool_path).parent() {
            Some(parent) => parent.join("blacklist.txt"),
            None => Path::new(&self.spool_path).join("blacklist.txt"),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            backend: DirectoryBackend::Ldap,
            ldap_url: "ldap://ldap.technikum-wien.at:389".to_string(),
            starttls: true,
            bind_dn_template: "uid={user},ou=people,dc=technikum-wien,dc=at".to_string(),
            timeout_secs: 10,
            database_url: "sqlite://users.db".to_string(),
        }
    }
}

impl DirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            window_secs: 60,
            ban_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
