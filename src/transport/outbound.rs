//! Outbound routes
//!
//! Each route listens locally for plaintext connections and carries them to
//! a remote node, over TLS unless the node turns out not to speak it.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::common::{PeerAddress, Result};
use crate::config::OutboundRoute;
use super::client::OpportunisticConnector;
use super::forwarder::forward;

/// Local listener bridging to one remote peer
pub struct OutboundListener {
    listener: TcpListener,
    peer: PeerAddress,
    connector: Arc<OpportunisticConnector>,
    buffer_size: usize,
}

impl OutboundListener {
    pub async fn bind(
        route: &OutboundRoute,
        connector: Arc<OpportunisticConnector>,
        buffer_size: usize,
    ) -> Result<Self> {
        let peer = PeerAddress::resolve(&route.peer)?;
        let listener = TcpListener::bind(route.listen).await?;
        Ok(Self { listener, peer, connector, buffer_size })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn peer(&self) -> &PeerAddress {
        &self.peer
    }

    /// Accept local connections until the task is dropped
    pub async fn run(self) -> Result<()> {
        info!("Outbound route {} -> {}", self.local_addr()?, self.peer);
        let peer = Arc::new(self.peer);
        let mut tasks = JoinSet::new();

        loop {
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("Outbound task failed: {}", e);
                }
            }

            let (local, local_addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting local connection: {}", e);
                    continue;
                }
            };

            let peer = Arc::clone(&peer);
            let connector = Arc::clone(&self.connector);
            let buffer_size = self.buffer_size;
            tasks.spawn(async move {
                let remote = match connector.connect(&peer).await {
                    Ok(remote) => remote,
                    Err(e) => {
                        error!("Unable to reach {} for {}: {}", peer, local_addr, e);
                        return;
                    }
                };
                if let Err(e) = forward(local, remote, buffer_size).await {
                    debug!("Outbound connection {} -> {} ended: {}", local_addr, peer, e);
                }
            });
        }
    }
}
