//! Client-side TLS setup
//!
//! [`ClientSslHandler`] waits in the pipeline until the outbound connection
//! opens and then swaps itself for the TLS stage. [`OpportunisticConnector`]
//! drives a whole outbound connection attempt: hooks, connect, handshake.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::common::{PeerAddress, Result, TransportError};
use crate::tls::SslEngineFactory;
use super::hook::ConnectionHook;
use super::pipeline::{ConnectionPipeline, Pipeline, Stage, CLIENT_SSL_HANDLER, SSL_CLIENT};
use super::stream::TransportStream;

/// Builds the client TLS engine once the peer is known
pub struct ClientSslHandler {
    factory: Arc<dyn SslEngineFactory>,
    enforce_hostname_verification: bool,
    resolve_hostname: bool,
}

impl ClientSslHandler {
    pub fn new(
        factory: Arc<dyn SslEngineFactory>,
        enforce_hostname_verification: bool,
        resolve_hostname: bool,
    ) -> Self {
        Self {
            factory,
            enforce_hostname_verification,
            resolve_hostname,
        }
    }

    /// Host name the peer certificate is checked against, if any
    pub fn verification_host<'p>(&self, peer: &'p PeerAddress) -> Option<&'p str> {
        if !self.enforce_hostname_verification {
            return None;
        }
        Some(if self.resolve_hostname { peer.host_name() } else { peer.host_string() })
    }

    /// Create the engine for `peer` and replace this handler with it
    pub fn connect(self, pipeline: &mut dyn Pipeline, peer: &PeerAddress) -> Result<()> {
        let hostname = self.verification_host(peer);
        let port = hostname.map(|_| peer.port());
        let engine = self.factory.create_client_engine(hostname, port)?;
        pipeline.replace(CLIENT_SSL_HANDLER, SSL_CLIENT, Stage::ClientTls(engine))
    }
}

/// Opens outbound connections with TLS or plaintext as the hooks decide
pub struct OpportunisticConnector {
    hook: Arc<dyn ConnectionHook>,
    connect_timeout: Duration,
}

impl OpportunisticConnector {
    pub fn new(hook: Arc<dyn ConnectionHook>, connect_timeout: Duration) -> Self {
        Self { hook, connect_timeout }
    }

    /// Connect to `peer`
    pub async fn connect(&self, peer: &PeerAddress) -> Result<TransportStream<TcpStream>> {
        let mut pipeline = ConnectionPipeline::new();
        self.hook.on_connect(&mut pipeline, peer).await?;

        debug!("Connecting to {} with stages {:?}", peer, pipeline.names());
        let tcp = timeout(self.connect_timeout, TcpStream::connect(peer.socket_addr()))
            .await
            .map_err(|_| {
                TransportError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connecting to {} timed out", peer),
                ))
            })??;
        tcp.set_nodelay(true)?;

        pipeline.fire_connect(peer).map_err(|e| self.hook.on_exception(e))?;
        let stream = pipeline.establish(tcp).await.map_err(|e| self.hook.on_exception(e))?;
        info!("Connected to {} using {}", peer, stream.protocol());
        Ok(stream)
    }
}
