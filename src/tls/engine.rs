//! SSL engine creation
//!
//! An engine is a fresh [`Ssl`] session bound to one connection. Server and
//! client engines come from contexts that are built once and shared by every
//! connection.

use log::{debug, info};
use openssl::ssl::{
    Ssl, SslAcceptor, SslConnector, SslFiletype, SslMethod, SslVerifyMode,
};
use std::path::Path;

use crate::common::Result;
use crate::config::{ClientCertMode, NodeConfig};

/// Source of per-connection TLS engines
///
/// Implementations are shared across all connections and must allow
/// concurrent engine creation.
pub trait SslEngineFactory: Send + Sync {
    /// Create an engine for an accepted connection
    fn create_server_engine(&self) -> Result<Ssl>;

    /// Create an engine for an outbound connection
    ///
    /// With a `hostname` the peer certificate must match it; without one no
    /// hostname verification takes place.
    fn create_client_engine(&self, hostname: Option<&str>, port: Option<u16>) -> Result<Ssl>;
}

/// OpenSSL-backed engine factory using the node certificate
pub struct OpensslEngineFactory {
    acceptor: SslAcceptor,
    connector: SslConnector,
}

impl OpensslEngineFactory {
    /// Build server and client contexts from certificate files
    ///
    /// # Parameters
    ///
    /// * `cert_path` - Node certificate, presented on both sides
    /// * `key_path` - Node private key
    /// * `ca_cert_path` - CA used to verify peers
    /// * `client_cert_mode` - Verification of inbound client certificates
    pub fn new(
        cert_path: &Path,
        key_path: &Path,
        ca_cert_path: &Path,
        client_cert_mode: ClientCertMode,
    ) -> Result<Self> {
        let acceptor = create_tls_acceptor(cert_path, key_path, ca_cert_path, client_cert_mode)?;
        let connector = create_tls_connector(cert_path, key_path, ca_cert_path)?;
        Ok(Self { acceptor, connector })
    }

    /// Build the factory from the node configuration
    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        Self::new(&config.cert, &config.key, &config.ca_cert, config.client_cert_mode)
    }
}

impl SslEngineFactory for OpensslEngineFactory {
    fn create_server_engine(&self) -> Result<Ssl> {
        Ok(Ssl::new(self.acceptor.context())?)
    }

    fn create_client_engine(&self, hostname: Option<&str>, port: Option<u16>) -> Result<Ssl> {
        let mut config = self.connector.configure()?;
        match hostname {
            Some(hostname) => {
                debug!("Creating client engine for {}:{}", hostname, port.map_or(-1, i32::from));
                config.set_verify_hostname(true);
                Ok(config.into_ssl(hostname)?)
            }
            None => {
                debug!("Creating client engine without hostname verification");
                config.set_verify_hostname(false);
                config.set_use_server_name_indication(false);
                Ok(config.into_ssl("")?)
            }
        }
    }
}

/// Create the server-side TLS context
pub fn create_tls_acceptor(
    cert_path: &Path,
    key_path: &Path,
    ca_cert_path: &Path,
    client_cert_mode: ClientCertMode,
) -> Result<SslAcceptor> {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())?;

    acceptor.set_certificate_chain_file(cert_path)?;
    acceptor.set_private_key_file(key_path, SslFiletype::PEM)?;
    acceptor.check_private_key()?;

    // Set verification mode based on client certificate mode
    match client_cert_mode {
        ClientCertMode::Required => {
            info!("Client certificates required (will be verified)");
            acceptor.set_ca_file(ca_cert_path)?;
            acceptor.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
        },
        ClientCertMode::Optional => {
            info!("Client certificates optional (will be verified if provided)");
            acceptor.set_ca_file(ca_cert_path)?;
            acceptor.set_verify(SslVerifyMode::PEER);
        },
        ClientCertMode::None => {
            info!("Client certificates not required (no verification)");
            acceptor.set_verify(SslVerifyMode::NONE);
        },
    }

    Ok(acceptor.build())
}

/// Create the client-side TLS context, trusting only the configured CA
pub fn create_tls_connector(
    cert_path: &Path,
    key_path: &Path,
    ca_cert_path: &Path,
) -> Result<SslConnector> {
    let mut connector = SslConnector::builder(SslMethod::tls())?;
    connector.set_ca_file(ca_cert_path)?;
    connector.set_certificate_chain_file(cert_path)?;
    connector.set_private_key_file(key_path, SslFiletype::PEM)?;
    connector.check_private_key()?;
    Ok(connector.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::test_support::self_signed;
    use std::pin::Pin;
    use tokio_openssl::SslStream;

    async fn handshake(factory: &OpensslEngineFactory, hostname: Option<&str>) -> bool {
        let (client_io, server_io) = tokio::io::duplex(16 * 1024);
        let mut server = SslStream::new(factory.create_server_engine().unwrap(), server_io).unwrap();
        let mut client = SslStream::new(factory.create_client_engine(hostname, Some(9300)).unwrap(), client_io).unwrap();

        let (server_result, client_result) = tokio::join!(
            Pin::new(&mut server).accept(),
            Pin::new(&mut client).connect(),
        );
        server_result.is_ok() && client_result.is_ok()
    }

    #[test]
    fn test_missing_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pem");
        assert!(OpensslEngineFactory::new(&missing, &missing, &missing, ClientCertMode::None).is_err());
    }

    #[tokio::test]
    async fn test_mutual_tls_with_hostname() {
        let dir = tempfile::tempdir().unwrap();
        let id = self_signed(dir.path()).unwrap();
        let factory = OpensslEngineFactory::new(&id.cert, &id.key, &id.ca, ClientCertMode::Required).unwrap();

        assert!(handshake(&factory, Some("localhost")).await);
    }

    #[tokio::test]
    async fn test_hostname_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let id = self_signed(dir.path()).unwrap();
        let factory = OpensslEngineFactory::new(&id.cert, &id.key, &id.ca, ClientCertMode::None).unwrap();

        assert!(!handshake(&factory, Some("node-9.elsewhere")).await);
        // Without a hostname only the chain is checked
        assert!(handshake(&factory, None).await);
    }
}
