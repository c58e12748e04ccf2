//! LDAP simple-bind directory backend
//!
//! Every verification opens a fresh connection, optionally upgrades it with
//! StartTLS, performs a simple bind as the templated DN and unbinds again.

use crate::error::{MailError, Result};
use crate::security::directory::{bind_dn, Directory};
use ldap3::{LdapConnAsync, LdapConnSettings};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// LDAP result code for rejected credentials
const INVALID_CREDENTIALS: u32 = 49;

pub struct LdapDirectory {
    url: String,
    dn_template: String,
    starttls: bool,
    timeout: Duration,
}

impl LdapDirectory {
    pub fn new(url: String, dn_template: String, starttls: bool, timeout: Duration) -> Self {
        Self {
            url,
            dn_template,
            starttls,
            timeout,
        }
    }

    async fn bind(&self, dn: &str, password: &str) -> Result<bool> {
        let settings = LdapConnSettings::new()
            .set_starttls(self.starttls)
            .set_conn_timeout(self.timeout);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.url).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection error: {}", e);
            }
        });

        let result = ldap.simple_bind(dn, password).await?;

        if let Err(e) = ldap.unbind().await {
            debug!("LDAP unbind failed: {}", e);
        }

        match result.rc {
            0 => Ok(true),
            INVALID_CREDENTIALS => Ok(false),
            rc => {
                warn!("LDAP bind for {} returned code {}: {}", dn, rc, result.text);
                Ok(false)
            }
        }
    }
}

#[async_trait::async_trait]
impl Directory for LdapDirectory {
    async fn verify(&self, username: &str, password: &str) -> Result<bool> {
        // An empty simple bind is an anonymous bind and would always succeed
        if password.is_empty() {
            warn!("Refusing empty password for {}", username);
            return Ok(false);
        }

        let dn = bind_dn(&self.dn_template, username);
        debug!("LDAP bind as {} on {}", dn, self.url);

        let verified = timeout(self.timeout, self.bind(&dn, password))
            .await
            .map_err(|_| MailError::Directory(format!("LDAP bind to {} timed out", self.url)))??;

        if verified {
            info!("LDAP bind successful for {}", username);
        } else {
            info!("LDAP bind rejected for {}", username);
        }
        Ok(verified)
    }

    fn name(&self) -> &'static str {
        "ldap"
    }
}
