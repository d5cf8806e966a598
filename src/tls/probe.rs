//! Client-side TLS probing
//!
//! Before an outbound connection commits to TLS or plaintext, a throwaway
//! connection to the same peer attempts a TLS handshake. Only three handshake
//! failure messages mean "this peer does not speak TLS"; every other outcome,
//! timeouts included, fails open toward TLS.

use std::io;
use std::pin::Pin;
use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, error, info};
use openssl::ssl::{self, ErrorCode, SslConnector, SslMethod};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;

use crate::common::{PeerAddress, Result, TransportError};

/// Peer answered the handshake with something that is not a TLS record
pub const UNRECOGNIZED_SSL_MESSAGE: &str = "Unsupported or unrecognized SSL message";

/// Peer closed the connection in the middle of the handshake
pub const REMOTE_HOST_TERMINATED: &str = "Remote host terminated the handshake";

/// Peer reset or cleanly closed the connection
pub const CONNECTION_CLOSED_BY_PEER: &str = "Connection closed by peer";

/// Handshake failure messages that identify a peer without TLS
///
/// TLS libraries report a plaintext peer only through these messages, so the
/// match is exact string equality against a [`TransportError::TlsHandshake`].
pub const NON_TLS_SIGNALS: [&str; 3] = [
    UNRECOGNIZED_SSL_MESSAGE,
    REMOTE_HOST_TERMINATED,
    CONNECTION_CLOSED_BY_PEER,
];

// OpenSSL reasons raised when the first bytes back are not a TLS record
const UNRECOGNIZED_RECORD_REASONS: [&str; 6] = [
    "wrong version number",
    "packet length too long",
    "unknown protocol",
    "http request",
    "record layer failure",
    "bad record type",
];

/// Outcome of a TLS probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// Handshake completed
    AcceptsTls,
    /// Peer gave one of the explicit non-TLS signals
    RejectsTls,
    /// Any other failure; treated as accepting TLS
    Indeterminate,
}

impl ProbeResult {
    /// Whether the real connection must use TLS
    pub fn requires_tls(self) -> bool {
        !matches!(self, ProbeResult::RejectsTls)
    }

    fn label(self) -> &'static str {
        match self {
            ProbeResult::AcceptsTls => "accepts_tls",
            ProbeResult::RejectsTls => "rejects_tls",
            ProbeResult::Indeterminate => "indeterminate",
        }
    }
}

/// Returns true if `message` is exactly one of [`NON_TLS_SIGNALS`]
pub fn is_non_tls_signal(message: &str) -> bool {
    NON_TLS_SIGNALS.contains(&message)
}

/// Map a failed probe handshake to a probe result
pub fn classify_probe_failure(err: &TransportError) -> ProbeResult {
    match err {
        TransportError::TlsHandshake(message) if is_non_tls_signal(message) => ProbeResult::RejectsTls,
        _ => ProbeResult::Indeterminate,
    }
}

/// Describe an OpenSSL handshake failure
///
/// Failures caused by a peer that closed, reset, or answered with non-TLS
/// bytes are reported with the matching [`NON_TLS_SIGNALS`] message; anything
/// else keeps OpenSSL's own description.
pub fn describe_handshake_failure(err: &ssl::Error) -> String {
    if err.code() == ErrorCode::ZERO_RETURN {
        return CONNECTION_CLOSED_BY_PEER.to_string();
    }

    if let Some(io_err) = err.io_error() {
        return match io_err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => CONNECTION_CLOSED_BY_PEER.to_string(),
            io::ErrorKind::UnexpectedEof => REMOTE_HOST_TERMINATED.to_string(),
            _ => io_err.to_string(),
        };
    }

    // EOF without an errno (OpenSSL 1.1)
    if err.code() == ErrorCode::SYSCALL {
        return REMOTE_HOST_TERMINATED.to_string();
    }

    if let Some(stack) = err.ssl_error() {
        for entry in stack.errors() {
            let reason = match entry.reason() {
                Some(reason) => reason.to_ascii_lowercase(),
                None => continue,
            };
            if UNRECOGNIZED_RECORD_REASONS.iter().any(|r| reason.contains(r)) {
                return UNRECOGNIZED_SSL_MESSAGE.to_string();
            }
            // EOF reported as an SSL error (OpenSSL 3)
            if reason.contains("unexpected eof") {
                return REMOTE_HOST_TERMINATED.to_string();
            }
        }
    }

    err.to_string()
}

/// A single TLS handshake attempt against a peer
pub trait HandshakeProbe: Send + Sync {
    /// Connect to `peer` and run a TLS handshake on a throwaway connection
    fn handshake<'a>(&'a self, peer: &'a PeerAddress) -> BoxFuture<'a, Result<()>>;
}

/// Probe using a default TLS client context
///
/// The context trusts the system certificate store, not the node's CA: the
/// probe answers "does this peer speak TLS", not "is it trusted".
pub struct DefaultTrustProbe {
    connector: SslConnector,
}

impl DefaultTrustProbe {
    /// Create a probe with the system default trust store
    pub fn new() -> Result<Self> {
        let connector = SslConnector::builder(SslMethod::tls())?.build();
        Ok(Self { connector })
    }
}

impl HandshakeProbe for DefaultTrustProbe {
    fn handshake<'a>(&'a self, peer: &'a PeerAddress) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            debug!("Connecting to address {} and port {}", peer.socket_addr().ip(), peer.port());
            let tcp = TcpStream::connect(peer.socket_addr()).await?;

            let mut config = self.connector.configure()?;
            config.set_verify_hostname(false);
            let ssl = config.into_ssl(peer.host_string())?;
            let mut stream = SslStream::new(ssl, tcp)?;

            debug!("Trying handshake with {}", peer);
            Pin::new(&mut stream).connect().await
                .map_err(|e| TransportError::TlsHandshake(describe_handshake_failure(&e)))?;

            // close_notify is a courtesy; the probe result is already known
            let _ = stream.shutdown().await;
            Ok(())
        })
    }
}

/// Probe `peer` and classify the outcome
///
/// The whole connect + handshake runs under `probe_timeout`; running out of
/// time is indeterminate, never a rejection.
pub async fn probe_peer(
    probe: &dyn HandshakeProbe,
    peer: &PeerAddress,
    probe_timeout: Duration,
) -> ProbeResult {
    let result = match timeout(probe_timeout, probe.handshake(peer)).await {
        Ok(Ok(())) => ProbeResult::AcceptsTls,
        Ok(Err(e)) => {
            let result = classify_probe_failure(&e);
            match result {
                ProbeResult::RejectsTls => error!("Unable to handshake with {}: {}", peer, e),
                _ => debug!("Ignoring TLS probe failure for {}: {}", peer, e),
            }
            result
        }
        Err(_) => {
            debug!("TLS probe to {} timed out after {:?}", peer, probe_timeout);
            ProbeResult::Indeterminate
        }
    };

    metrics::counter!("dual_mode.probe", "result" => result.label()).increment(1);
    info!("TLS probe of {}: {}", peer, result.label());
    result
}
