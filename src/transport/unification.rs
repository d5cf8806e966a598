//! Server-side port unification
//!
//! The stage sits at the head of every accepted connection while dual mode
//! is on. It buffers the first bytes until a full TLS record header is
//! available, then either splices a TLS stage in after itself or steps
//! aside, and forwards everything it buffered exactly once.

use std::fmt;
use std::sync::Arc;

use bytes::BytesMut;
use log::{debug, error};

use crate::common::{Result, TransportError};
use crate::protocol::{TlsDetector, TLS_RECORD_HEADER_LEN};
use crate::tls::SslEngineFactory;
use super::pipeline::{Pipeline, Stage, PORT_UNIFICATION, SSL_SERVER};

/// Protocol chosen for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tls,
    Plaintext,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tls => "tls",
            Protocol::Plaintext => "plaintext",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification progress
#[derive(Debug)]
pub enum UnificationState {
    /// Bytes received so far, none of them forwarded yet
    Classifying(BytesMut),
    /// Terminal; the buffer has been forwarded or discarded
    Decided,
}

/// Port unification stage
pub struct PortUnificationStage {
    factory: Arc<dyn SslEngineFactory>,
    state: UnificationState,
    tls_version: Option<String>,
}

impl PortUnificationStage {
    pub fn new(factory: Arc<dyn SslEngineFactory>) -> Self {
        Self {
            factory,
            state: UnificationState::Classifying(BytesMut::with_capacity(TLS_RECORD_HEADER_LEN)),
            tls_version: None,
        }
    }

    pub fn state(&self) -> &UnificationState {
        &self.state
    }

    /// Record version announced by a TLS client, once classified as TLS
    pub fn tls_version(&self) -> Option<&str> {
        self.tls_version.as_deref()
    }

    /// Bytes buffered while classifying
    pub fn buffered(&self) -> &[u8] {
        match &self.state {
            UnificationState::Classifying(buf) => buf,
            UnificationState::Decided => &[],
        }
    }

    /// Feed inbound bytes
    ///
    /// Returns `Ok(None)` while fewer than five bytes have arrived; no
    /// pipeline call is made in that case. Once classified the stage is
    /// done: any further call fails with [`TransportError::StageRemoved`].
    pub fn decode(&mut self, pipeline: &mut dyn Pipeline, chunk: &[u8]) -> Result<Option<Protocol>> {
        let buffer = match &mut self.state {
            UnificationState::Classifying(buffer) => buffer,
            UnificationState::Decided => return Err(TransportError::StageRemoved(PORT_UNIFICATION)),
        };

        buffer.extend_from_slice(chunk);
        if buffer.len() < TLS_RECORD_HEADER_LEN {
            return Ok(None);
        }

        // Leaving Classifying is irreversible from here on, success or not
        let buffered = match std::mem::replace(&mut self.state, UnificationState::Decided) {
            UnificationState::Classifying(buffer) => buffer.freeze(),
            UnificationState::Decided => return Err(TransportError::StageRemoved(PORT_UNIFICATION)),
        };

        let protocol = if let Some(info) = TlsDetector::default().protocol_info(&buffered) {
            debug!("TLS client hello announced as {}", info.version.as_deref().unwrap_or("unknown"));
            self.tls_version = info.version;
            let engine = self.factory.create_server_engine().map_err(|e| {
                error!("Unable to create server SSL engine, discarding {} buffered bytes: {}", buffered.len(), e);
                e
            })?;
            pipeline.add_after(PORT_UNIFICATION, SSL_SERVER, Stage::ServerTls(engine))?;
            pipeline.remove(PORT_UNIFICATION)?;
            Protocol::Tls
        } else {
            pipeline.remove(PORT_UNIFICATION)?;
            Protocol::Plaintext
        };

        debug!("Connection classified as {} after {} bytes", protocol, buffered.len());
        metrics::counter!("dual_mode.classified", "protocol" => protocol.as_str()).increment(1);
        pipeline.fire_read(buffered)?;
        Ok(Some(protocol))
    }
}

impl fmt::Debug for PortUnificationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortUnificationStage")
            .field("state", &self.state)
            .finish()
    }
}
