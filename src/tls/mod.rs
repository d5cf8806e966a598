//! TLS handling module
//!
//! Engine creation for both connection directions and the client-side probe
//! that decides whether a peer speaks TLS at all.

mod engine;
pub mod probe;

pub use engine::{create_tls_acceptor, create_tls_connector, OpensslEngineFactory, SslEngineFactory};
pub use probe::{probe_peer, DefaultTrustProbe, HandshakeProbe, ProbeResult};

#[doc(hidden)]
pub mod test_support;
