//! Inbound connection handler
//!
//! Runs one accepted connection from pipeline setup to the end of
//! forwarding.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::common::{Result, TransportError};
use crate::config::NodeConfig;
use super::forwarder::forward;
use super::hook::ConnectionHook;
use super::pipeline::ConnectionPipeline;
use super::stream::TransportStream;

// Read size while classifying; a record header is only five bytes
const CLASSIFY_READ_SIZE: usize = 1024;

/// Per-connection settings shared by every inbound connection
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Local service receiving the application traffic
    pub target: SocketAddr,
    pub buffer_size: usize,
    pub connect_timeout: Duration,
    pub classification_timeout: Duration,
}

impl ConnectionSettings {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            target: config.target,
            buffer_size: config.buffer_size,
            connect_timeout: Duration::from_secs(config.connection_timeout),
            classification_timeout: Duration::from_millis(config.classification_timeout_ms),
        }
    }
}

/// Handle a single accepted connection
///
/// Errors raised while the pipeline is set up go through the hook's
/// exception handling before they are returned; the connection is closed
/// when this returns.
pub async fn handle_connection(
    mut client: TcpStream,
    hook: &dyn ConnectionHook,
    settings: &ConnectionSettings,
) -> Result<()> {
    let mut pipeline = ConnectionPipeline::new();
    hook.on_accept(&mut pipeline).map_err(|e| hook.on_exception(e))?;

    if pipeline.is_classifying() {
        match timeout(settings.classification_timeout, classify(&mut client, &mut pipeline)).await {
            Ok(Ok(())) => {}
            Ok(Err(TransportError::Io(e))) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!("Connection closed before it could be classified");
                return Ok(());
            }
            Ok(Err(e)) => return Err(hook.on_exception(TransportError::decoder(e))),
            Err(_) => {
                debug!("No record header within {:?}, closing", settings.classification_timeout);
                return Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "classification timed out",
                )));
            }
        }
    }

    let stream = pipeline.establish(client).await.map_err(|e| hook.on_exception(e))?;
    log_peer_certificate(&stream);

    let target = timeout(settings.connect_timeout, TcpStream::connect(settings.target))
        .await
        .map_err(|_| TransportError::Io(io::Error::new(io::ErrorKind::TimedOut, "Connection timed out")))??;

    debug!("Forwarding {} connection to {}", stream.protocol(), settings.target);
    forward(stream, target, settings.buffer_size).await?;
    Ok(())
}

async fn classify(client: &mut TcpStream, pipeline: &mut ConnectionPipeline) -> Result<()> {
    let mut buffer = [0u8; CLASSIFY_READ_SIZE];
    while pipeline.is_classifying() {
        let n = client.read(&mut buffer).await?;
        if n == 0 {
            return Err(TransportError::Io(io::ErrorKind::UnexpectedEof.into()));
        }
        pipeline.receive(&buffer[..n])?;
    }
    Ok(())
}

fn log_peer_certificate(stream: &TransportStream<TcpStream>) {
    if let TransportStream::Tls(tls) = stream {
        if let Some(cert) = tls.ssl().peer_certificate() {
            let subject = cert.subject_name()
                .entries()
                .filter_map(|e| e.data().as_utf8().ok().map(|v| v.to_string()))
                .collect::<Vec<_>>()
                .join(", ");
            info!("Client certificate subject: {}", subject);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use openssl::ssl::Ssl;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use crate::config::DualModeConfig;
    use crate::tls::{DefaultTrustProbe, SslEngineFactory};
    use crate::transport::errors::ErrorReporter;
    use crate::transport::hook::DualModeTransport;

    struct NoKeyMaterial;

    impl SslEngineFactory for NoKeyMaterial {
        fn create_server_engine(&self) -> Result<Ssl> {
            Err(TransportError::Other("no key material".to_string()))
        }

        fn create_client_engine(&self, _hostname: Option<&str>, _port: Option<u16>) -> Result<Ssl> {
            Err(TransportError::Other("no key material".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        seen: Mutex<Vec<(String, bool)>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, cause: &TransportError, critical: bool) {
            self.seen.lock().unwrap().push((cause.to_string(), critical));
        }
    }

    #[tokio::test]
    async fn test_server_engine_failure_reported_and_closed() {
        let reporter = Arc::new(RecordingReporter::default());
        let hook = DualModeTransport::new(
            Arc::new(DualModeConfig::new(true)),
            Arc::new(NoKeyMaterial),
            Arc::new(DefaultTrustProbe::new().unwrap()),
            reporter.clone(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (accepted, _) = listener.accept().await.unwrap();
        client.write_all(&[0x16, 0x03, 0x01, 0x00, 0x05]).await.unwrap();

        let settings = ConnectionSettings {
            target: addr,
            buffer_size: 1024,
            connect_timeout: Duration::from_secs(1),
            classification_timeout: Duration::from_secs(5),
        };
        let err = handle_connection(accepted, &hook, &settings).await.unwrap_err();

        // Returned and reported without the decoder wrapper
        assert!(matches!(err, TransportError::Other(_)));
        let seen = reporter.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.contains("no key material"));
        assert!(!seen[0].0.starts_with("Decoder error"));
        assert!(!seen[0].1);

        // The accepted socket was dropped: the client sees EOF or a reset
        let mut buf = [0u8; 16];
        let read = timeout(Duration::from_secs(5), client.read(&mut buf)).await.unwrap();
        assert!(matches!(read, Ok(0) | Err(_)));
    }
}
