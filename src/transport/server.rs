//! Transport server module
//!
//! Accepts node-to-node connections on the transport port and hands each one
//! to its own task. With dual mode on, the same port serves TLS and
//! plaintext peers.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::common::Result;
use super::handler::{handle_connection, ConnectionSettings};
use super::hook::ConnectionHook;

/// Inbound transport server
pub struct TransportServer {
    listener: TcpListener,
    hook: Arc<dyn ConnectionHook>,
    settings: Arc<ConnectionSettings>,
}

impl TransportServer {
    /// Bind the transport port
    ///
    /// # Errors
    ///
    /// Returns an error if it cannot bind to the listen address.
    pub async fn bind(
        listen_addr: SocketAddr,
        hook: Arc<dyn ConnectionHook>,
        settings: ConnectionSettings,
    ) -> Result<Self> {
        let listener = TcpListener::bind(listen_addr).await?;
        Ok(Self {
            listener,
            hook,
            settings: Arc::new(settings),
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped
    pub async fn run(self) -> Result<()> {
        info!("Transport server listening on {}", self.local_addr()?);

        let mut tasks = JoinSet::new();

        loop {
            // Reap finished connections
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("Connection task failed: {}", e);
                }
            }

            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("Accepted connection from {}", peer_addr);
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
                    }

                    let hook = Arc::clone(&self.hook);
                    let settings = Arc::clone(&self.settings);
                    tasks.spawn(async move {
                        if let Err(e) = handle_connection(stream, hook.as_ref(), &settings).await {
                            debug!("Connection from {} closed: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}
