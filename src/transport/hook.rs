//! Connection setup hooks
//!
//! The runtime loops call into a [`ConnectionHook`] for every accepted and
//! every outbound connection; [`DualModeTransport`] is the hook that puts
//! the TLS or dual-mode stages in place.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use log::debug;

use crate::common::{PeerAddress, Result, TransportError};
use crate::config::{DualModeConfig, NodeConfig};
use crate::tls::{probe_peer, DefaultTrustProbe, HandshakeProbe, SslEngineFactory};
use super::client::ClientSslHandler;
use super::errors::{ErrorReporter, ExceptionHandler, LogErrorReporter};
use super::pipeline::{Pipeline, Stage, CLIENT_SSL_HANDLER, PORT_UNIFICATION, SSL_SERVER};
use super::unification::PortUnificationStage;

/// Capability invoked by the runtime while connections are set up
pub trait ConnectionHook: Send + Sync {
    /// Install stages on a freshly accepted connection
    fn on_accept(&self, pipeline: &mut dyn Pipeline) -> Result<()>;

    /// Install stages before an outbound connection to `peer` is opened
    fn on_connect<'a>(
        &'a self,
        pipeline: &'a mut dyn Pipeline,
        peer: &'a PeerAddress,
    ) -> BoxFuture<'a, Result<()>>;

    /// Handle a failure during setup; the connection is closed afterwards
    fn on_exception(&self, err: TransportError) -> TransportError;
}

/// TLS transport that can also serve and reach plaintext nodes
pub struct DualModeTransport {
    dual_mode: Arc<DualModeConfig>,
    factory: Arc<dyn SslEngineFactory>,
    probe: Arc<dyn HandshakeProbe>,
    reporter: Arc<dyn ErrorReporter>,
    enforce_hostname_verification: bool,
    resolve_hostname: bool,
    probe_timeout: Duration,
}

impl DualModeTransport {
    pub fn new(
        dual_mode: Arc<DualModeConfig>,
        factory: Arc<dyn SslEngineFactory>,
        probe: Arc<dyn HandshakeProbe>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            dual_mode,
            factory,
            probe,
            reporter,
            enforce_hostname_verification: true,
            resolve_hostname: true,
            probe_timeout: Duration::from_millis(5000),
        }
    }

    /// Build the transport from node configuration
    ///
    /// Probing uses [`DefaultTrustProbe`] and errors go to the log.
    pub fn from_config(
        config: &NodeConfig,
        dual_mode: Arc<DualModeConfig>,
        factory: Arc<dyn SslEngineFactory>,
    ) -> Result<Self> {
        let probe = Arc::new(DefaultTrustProbe::new()?);
        Ok(Self::new(dual_mode, factory, probe, Arc::new(LogErrorReporter))
            .with_hostname_verification(config.enforce_hostname_verification, config.resolve_hostname)
            .with_probe_timeout(Duration::from_millis(config.probe_timeout_ms)))
    }

    pub fn with_hostname_verification(mut self, enforce: bool, resolve_hostname: bool) -> Self {
        self.enforce_hostname_verification = enforce;
        self.resolve_hostname = resolve_hostname;
        self
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn dual_mode(&self) -> &Arc<DualModeConfig> {
        &self.dual_mode
    }

    fn client_handler(&self) -> ClientSslHandler {
        ClientSslHandler::new(
            Arc::clone(&self.factory),
            self.enforce_hostname_verification,
            self.resolve_hostname,
        )
    }
}

impl ConnectionHook for DualModeTransport {
    fn on_accept(&self, pipeline: &mut dyn Pipeline) -> Result<()> {
        if self.dual_mode.is_enabled() {
            let stage = PortUnificationStage::new(Arc::clone(&self.factory));
            pipeline.add_first(PORT_UNIFICATION, Stage::PortUnification(stage))
        } else {
            let engine = self.factory.create_server_engine()?;
            pipeline.add_first(SSL_SERVER, Stage::ServerTls(engine))
        }
    }

    fn on_connect<'a>(
        &'a self,
        pipeline: &'a mut dyn Pipeline,
        peer: &'a PeerAddress,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.dual_mode.is_enabled() {
                let result = probe_peer(self.probe.as_ref(), peer, self.probe_timeout).await;
                if !result.requires_tls() {
                    debug!("Peer {} does not speak TLS, connecting in plaintext", peer);
                    return Ok(());
                }
            }
            pipeline.add_first(CLIENT_SSL_HANDLER, Stage::ClientSsl(self.client_handler()))
        })
    }

    fn on_exception(&self, err: TransportError) -> TransportError {
        ExceptionHandler::new(self.reporter.as_ref()).on_exception(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::probe::CONNECTION_CLOSED_BY_PEER;
    use crate::transport::pipeline::MockPipeline;
    use openssl::ssl::{Ssl, SslContext, SslMethod};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ContextFactory;

    impl SslEngineFactory for ContextFactory {
        fn create_server_engine(&self) -> Result<Ssl> {
            let ctx = SslContext::builder(SslMethod::tls())?.build();
            Ok(Ssl::new(&ctx)?)
        }

        fn create_client_engine(&self, _hostname: Option<&str>, _port: Option<u16>) -> Result<Ssl> {
            self.create_server_engine()
        }
    }

    /// Probe that fails with a fixed message and counts its calls
    struct ScriptedProbe {
        message: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(message: Option<&'static str>) -> Self {
            Self { message, calls: AtomicUsize::new(0) }
        }
    }

    impl HandshakeProbe for ScriptedProbe {
        fn handshake<'a>(&'a self, _peer: &'a PeerAddress) -> BoxFuture<'a, Result<()>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                match self.message {
                    Some(message) => Err(TransportError::TlsHandshake(message.to_string())),
                    None => Ok(()),
                }
            })
        }
    }

    fn transport(enabled: bool, probe: Arc<ScriptedProbe>) -> DualModeTransport {
        DualModeTransport::new(
            Arc::new(DualModeConfig::new(enabled)),
            Arc::new(ContextFactory),
            probe,
            Arc::new(LogErrorReporter),
        )
        .with_probe_timeout(Duration::from_millis(500))
    }

    fn peer() -> PeerAddress {
        PeerAddress::from("127.0.0.1:9300".parse::<std::net::SocketAddr>().unwrap())
    }

    #[test]
    fn test_accept_with_dual_mode_installs_unification() {
        let mut pipeline = MockPipeline::new();
        pipeline.expect_add_first()
            .withf(|name, stage| name == PORT_UNIFICATION && matches!(stage, Stage::PortUnification(_)))
            .times(1)
            .returning(|_, _| Ok(()));

        transport(true, Arc::new(ScriptedProbe::new(None))).on_accept(&mut pipeline).unwrap();
    }

    #[test]
    fn test_accept_without_dual_mode_installs_tls() {
        let mut pipeline = MockPipeline::new();
        pipeline.expect_add_first()
            .withf(|name, stage| name == SSL_SERVER && matches!(stage, Stage::ServerTls(_)))
            .times(1)
            .returning(|_, _| Ok(()));

        transport(false, Arc::new(ScriptedProbe::new(None))).on_accept(&mut pipeline).unwrap();
    }

    #[tokio::test]
    async fn test_connection_closed_by_peer_means_plaintext() {
        let probe = Arc::new(ScriptedProbe::new(Some(CONNECTION_CLOSED_BY_PEER)));
        let mut pipeline = MockPipeline::new();
        pipeline.expect_add_first().times(0);

        transport(true, Arc::clone(&probe)).on_connect(&mut pipeline, &peer()).await.unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_probe_failure_keeps_tls() {
        let probe = Arc::new(ScriptedProbe::new(Some("certificate verify failed")));
        let mut pipeline = MockPipeline::new();
        pipeline.expect_add_first()
            .withf(|name, stage| name == CLIENT_SSL_HANDLER && matches!(stage, Stage::ClientSsl(_)))
            .times(1)
            .returning(|_, _| Ok(()));

        transport(true, probe).on_connect(&mut pipeline, &peer()).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_probe_without_dual_mode() {
        let probe = Arc::new(ScriptedProbe::new(Some(CONNECTION_CLOSED_BY_PEER)));
        let mut pipeline = MockPipeline::new();
        pipeline.expect_add_first()
            .withf(|name, _| name == CLIENT_SSL_HANDLER)
            .times(1)
            .returning(|_, _| Ok(()));

        transport(false, Arc::clone(&probe)).on_connect(&mut pipeline, &peer()).await.unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }
}
