//! TCP listener
//!
//! Accepts connections and runs one [`Session`] task per client. All
//! sessions hang off the server's cancellation token; cancelling it stops
//! the accept loop, closes the listening socket and waits for every session
//! to finish.

use crate::config::{Config, ServerConfig};
use crate::error::{MailError, Result};
use crate::protocol::session::Session;
use crate::security::{directory, AuthGate, LockoutPolicy};
use crate::storage::{BlacklistStore, MailboxStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

pub struct MailServer {
    config: ServerConfig,
    storage: Arc<MailboxStore>,
    gate: Arc<AuthGate>,
    shutdown: CancellationToken,
}

impl MailServer {
    pub fn new(config: ServerConfig, storage: Arc<MailboxStore>, gate: Arc<AuthGate>) -> Self {
        Self {
            config,
            storage,
            gate,
            shutdown: CancellationToken::new(),
        }
    }

    /// Wire up storage, blacklist and directory from the configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        let directory = directory::from_config(&config.directory).await?;

        let blacklist_path = config.storage.blacklist_file();
        info!("Blacklist file: {}", blacklist_path.display());
        let blacklist = Arc::new(BlacklistStore::new(blacklist_path));

        let gate = AuthGate::new(directory, blacklist, LockoutPolicy::from(&config.lockout));

        info!("Spool directory: {}", config.storage.spool_path);
        let storage = MailboxStore::new(&config.storage.spool_path);

        Ok(Self::new(
            config.server.clone(),
            Arc::new(storage),
            Arc::new(gate),
        ))
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = &self.config.listen_addr;
        TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind {}: {}", addr, e);
            MailError::Io(e)
        })
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("🌐 Mail server listening on {}", listener.local_addr()?);

        let mut sessions = JoinSet::new();

        let result = loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, no longer accepting connections");
                    break Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!("📨 New connection from {}", peer);

                        let session = Session::new(peer, Arc::clone(&self.storage), Arc::clone(&self.gate));
                        let banner = self.config.banner.clone();
                        let max_frame_bytes = self.config.max_frame_bytes;
                        let cancel = self.shutdown.child_token();

                        sessions.spawn(
                            async move {
                                if let Err(e) = session.run(stream, &banner, max_frame_bytes, cancel).await {
                                    warn!("Session error: {}", e);
                                }
                            }
                            .instrument(info_span!("session", %peer)),
                        );
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        break Err(MailError::Io(e));
                    }
                },
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        error!("Session task failed: {}", e);
                    }
                }
            }
        };

        drop(listener);
        self.shutdown.cancel();

        if !sessions.is_empty() {
            info!("Waiting for {} open sessions", sessions.len());
        }
        while let Some(joined) = sessions.join_next().await {
            if let Err(e) = joined {
                error!("Session task failed: {}", e);
            }
        }

        info!("Server stopped");
        result
    }
}
