//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use openssl::ssl::{SslConnector, SslMethod};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_openssl::SslStream;

use dual_mode_transport::config::{ClientCertMode, DualModeConfig};
use dual_mode_transport::tls::test_support::{self_signed, IdentityFiles};
use dual_mode_transport::tls::{DefaultTrustProbe, OpensslEngineFactory};
use dual_mode_transport::transport::{
    ConnectionSettings, DualModeTransport, LogErrorReporter, TransportServer,
};

pub const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Node certificate, key and CA written to a temporary directory
pub struct Identity {
    pub dir: tempfile::TempDir,
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: PathBuf,
}

/// Self-signed identity for `localhost` / 127.0.0.1, acting as its own CA
pub fn identity() -> Identity {
    let dir = tempfile::tempdir().unwrap();
    let IdentityFiles { cert, key, ca } = self_signed(dir.path()).unwrap();
    Identity { dir, cert, key, ca }
}

pub fn engine_factory(identity: &Identity, mode: ClientCertMode) -> Arc<OpensslEngineFactory> {
    Arc::new(OpensslEngineFactory::new(&identity.cert, &identity.key, &identity.ca, mode).unwrap())
}

pub fn dual_mode_transport(identity: &Identity, enabled: bool) -> Arc<DualModeTransport> {
    Arc::new(
        DualModeTransport::new(
            Arc::new(DualModeConfig::new(enabled)),
            engine_factory(identity, ClientCertMode::None),
            Arc::new(DefaultTrustProbe::new().unwrap()),
            Arc::new(LogErrorReporter),
        )
        .with_probe_timeout(Duration::from_secs(2)),
    )
}

/// Echo service standing in for the application behind the transport
pub async fn spawn_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.into_split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Plaintext-only node: echoes lines, hangs up on anything that looks like TLS
pub async fn spawn_plaintext_node() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    let n = match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    if buf[0] == 0x16 {
                        return;
                    }
                    if stream.write_all(&buf[..n]).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    addr
}

/// Start a transport server on an ephemeral port forwarding to `target`
pub async fn spawn_transport_server(hook: Arc<DualModeTransport>, target: SocketAddr) -> SocketAddr {
    let settings = ConnectionSettings {
        target,
        buffer_size: 4096,
        connect_timeout: IO_TIMEOUT,
        classification_timeout: IO_TIMEOUT,
    };
    let server = TransportServer::bind("127.0.0.1:0".parse().unwrap(), hook, settings)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

/// TLS client trusting the identity's CA and checking `localhost`
pub async fn tls_client(identity: &Identity, addr: SocketAddr) -> SslStream<TcpStream> {
    let mut connector = SslConnector::builder(SslMethod::tls()).unwrap();
    connector.set_ca_file(&identity.ca).unwrap();
    let ssl = connector.build().configure().unwrap().into_ssl("localhost").unwrap();

    let tcp = TcpStream::connect(addr).await.unwrap();
    let mut stream = SslStream::new(ssl, tcp).unwrap();
    Pin::new(&mut stream).connect().await.unwrap();
    stream
}
