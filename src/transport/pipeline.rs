//! Per-connection processing pipeline
//!
//! A pipeline is the ordered list of named stages a connection's bytes pass
//! through before they reach the application. Stages may insert, replace or
//! remove stages while the connection is being set up; once setup finishes
//! the pipeline is turned into a plaintext or TLS stream.

use std::fmt;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use log::{debug, trace};
use openssl::ssl::Ssl;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_openssl::SslStream;

use crate::common::{PeerAddress, Result, TransportError};
use crate::tls::probe::describe_handshake_failure;
use super::client::ClientSslHandler;
use super::rewind::Rewind;
use super::stream::TransportStream;
use super::unification::PortUnificationStage;

/// Server-side stage that classifies the first bytes of a connection
pub const PORT_UNIFICATION: &str = "port_unification_handler";
/// Server-side TLS record stage
pub const SSL_SERVER: &str = "ssl_server";
/// Client-side stage that builds the TLS engine when the connection opens
pub const CLIENT_SSL_HANDLER: &str = "client_ssl_handler";
/// Client-side TLS record stage
pub const SSL_CLIENT: &str = "ssl_client";

/// A pipeline stage
pub enum Stage {
    /// Classifies plaintext vs TLS, then leaves the pipeline
    PortUnification(PortUnificationStage),
    /// TLS record processing for an accepted connection
    ServerTls(Ssl),
    /// Replaced by [`Stage::ClientTls`] when the connection opens
    ClientSsl(ClientSslHandler),
    /// TLS record processing for an outbound connection
    ClientTls(Ssl),
}

impl Stage {
    fn kind(&self) -> &'static str {
        match self {
            Stage::PortUnification(_) => "port-unification",
            Stage::ServerTls(_) => "server-tls",
            Stage::ClientSsl(_) => "client-ssl-handler",
            Stage::ClientTls(_) => "client-tls",
        }
    }

    fn is_tls(&self) -> bool {
        matches!(self, Stage::ServerTls(_) | Stage::ClientTls(_))
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage({})", self.kind())
    }
}

/// Stage mutation surface seen by pipeline stages
#[cfg_attr(test, mockall::automock)]
pub trait Pipeline: Send {
    /// Insert a stage at the head of the pipeline
    fn add_first(&mut self, name: &'static str, stage: Stage) -> Result<()>;

    /// Insert a stage right after `base`
    fn add_after(&mut self, base: &'static str, name: &'static str, stage: Stage) -> Result<()>;

    /// Replace stage `old` with `stage`, registered as `name`
    fn replace(&mut self, old: &'static str, name: &'static str, stage: Stage) -> Result<()>;

    /// Remove a stage
    fn remove(&mut self, name: &'static str) -> Result<()>;

    /// Hand inbound bytes to whatever follows the stages that were removed
    fn fire_read(&mut self, bytes: Bytes) -> Result<()>;
}

struct Entry {
    name: &'static str,
    // Empty while the stage itself is running
    stage: Option<Stage>,
}

/// Pipeline of a single connection
#[derive(Default)]
pub struct ConnectionPipeline {
    entries: Vec<Entry>,
    forwarded: BytesMut,
}

impl ConnectionPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage names, head first
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name).collect()
    }

    /// Whether a stage with `name` is present
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Bytes forwarded past the classification stages so far
    pub fn forwarded(&self) -> &[u8] {
        &self.forwarded
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    fn check_insert(&self, name: &'static str, stage: &Stage) -> Result<()> {
        if self.contains(name) {
            return Err(TransportError::Pipeline(format!("duplicate stage '{}'", name)));
        }
        if stage.is_tls() && self.entries.iter().any(|e| e.stage.as_ref().map_or(false, Stage::is_tls)) {
            return Err(TransportError::Pipeline(format!("a TLS stage is already present, refusing '{}'", name)));
        }
        Ok(())
    }

    /// Deliver inbound bytes to the head of the pipeline
    ///
    /// While a port unification stage is present it receives the bytes;
    /// otherwise they are forwarded unchanged.
    pub fn receive(&mut self, chunk: &[u8]) -> Result<()> {
        let Some(pos) = self.position(PORT_UNIFICATION) else {
            self.forwarded.extend_from_slice(chunk);
            return Ok(());
        };

        let mut stage = match self.entries[pos].stage.take() {
            Some(Stage::PortUnification(stage)) => stage,
            other => {
                self.entries[pos].stage = other;
                return Err(TransportError::Pipeline(format!("'{}' is not a port unification stage", PORT_UNIFICATION)));
            }
        };

        let result = stage.decode(self, chunk);

        // Still classifying: the stage goes back into its slot
        if let Some(pos) = self.position(PORT_UNIFICATION) {
            if self.entries[pos].stage.is_none() {
                self.entries[pos].stage = Some(Stage::PortUnification(stage));
            }
        }
        result.map(|_| ())
    }

    /// Signal that the connection to `peer` is about to be opened
    ///
    /// A client SSL handler present in the pipeline builds its engine and
    /// replaces itself with the TLS stage before this returns.
    pub fn fire_connect(&mut self, peer: &PeerAddress) -> Result<()> {
        let Some(pos) = self.position(CLIENT_SSL_HANDLER) else {
            return Ok(());
        };

        let handler = match self.entries[pos].stage.take() {
            Some(Stage::ClientSsl(handler)) => handler,
            other => {
                self.entries[pos].stage = other;
                return Err(TransportError::Pipeline(format!("'{}' is not a client SSL handler", CLIENT_SSL_HANDLER)));
            }
        };

        handler.connect(self, peer)
    }

    /// Whether classification is still pending
    pub fn is_classifying(&self) -> bool {
        self.contains(PORT_UNIFICATION)
    }

    /// Finish setup and wrap `io` according to the installed stages
    ///
    /// Forwarded bytes are replayed ahead of `io`; a TLS stage runs its
    /// handshake here. Handshake failures are returned wrapped as decoder
    /// errors.
    pub async fn establish<S>(mut self, io: S) -> Result<TransportStream<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if self.is_classifying() {
            return Err(TransportError::Pipeline("connection set up before classification finished".to_string()));
        }

        let io = Rewind::new(io, self.forwarded.split().freeze());
        let tls = self.entries.drain(..).find_map(|e| match e.stage {
            Some(Stage::ServerTls(ssl)) => Some((ssl, true)),
            Some(Stage::ClientTls(ssl)) => Some((ssl, false)),
            _ => None,
        });

        match tls {
            None => {
                trace!("Establishing plaintext stream");
                Ok(TransportStream::Plain(io))
            }
            Some((ssl, server)) => {
                let mut stream = SslStream::new(ssl, io)?;
                let handshake = if server {
                    Pin::new(&mut stream).accept().await
                } else {
                    Pin::new(&mut stream).connect().await
                };
                handshake.map_err(|e| {
                    TransportError::decoder(TransportError::TlsHandshake(describe_handshake_failure(&e)))
                })?;
                debug!("TLS handshake successful ({})", if server { "server" } else { "client" });
                Ok(TransportStream::Tls(Box::new(stream)))
            }
        }
    }
}

impl Pipeline for ConnectionPipeline {
    fn add_first(&mut self, name: &'static str, stage: Stage) -> Result<()> {
        self.check_insert(name, &stage)?;
        trace!("add_first {} {:?}", name, stage);
        self.entries.insert(0, Entry { name, stage: Some(stage) });
        Ok(())
    }

    fn add_after(&mut self, base: &'static str, name: &'static str, stage: Stage) -> Result<()> {
        let pos = self.position(base)
            .ok_or_else(|| TransportError::Pipeline(format!("no stage named '{}'", base)))?;
        self.check_insert(name, &stage)?;
        trace!("add_after {} {} {:?}", base, name, stage);
        self.entries.insert(pos + 1, Entry { name, stage: Some(stage) });
        Ok(())
    }

    fn replace(&mut self, old: &'static str, name: &'static str, stage: Stage) -> Result<()> {
        let pos = self.position(old)
            .ok_or_else(|| TransportError::Pipeline(format!("no stage named '{}'", old)))?;
        let removed = self.entries.remove(pos);
        if let Err(e) = self.check_insert(name, &stage) {
            self.entries.insert(pos, removed);
            return Err(e);
        }
        trace!("replace {} with {} {:?}", old, name, stage);
        self.entries.insert(pos, Entry { name, stage: Some(stage) });
        Ok(())
    }

    fn remove(&mut self, name: &'static str) -> Result<()> {
        let pos = self.position(name)
            .ok_or(TransportError::StageRemoved(name))?;
        trace!("remove {}", name);
        self.entries.remove(pos);
        Ok(())
    }

    fn fire_read(&mut self, bytes: Bytes) -> Result<()> {
        self.forwarded.extend_from_slice(&bytes);
        Ok(())
    }
}

impl fmt::Debug for ConnectionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPipeline")
            .field("stages", &self.names())
            .field("forwarded", &self.forwarded.len())
            .finish()
    }
}
