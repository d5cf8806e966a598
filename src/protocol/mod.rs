//! Protocol detection module
//!
//! Classifies a connection from its first bytes, the way NGINX and HAProxy
//! sniff TLS on shared ports.

mod detector;

pub use detector::{
    is_tls, DetectionResult, ProtocolInfo, TlsDetector,
    MAX_TLS_RECORD_LEN, TLS_HANDSHAKE_CONTENT_TYPE, TLS_RECORD_HEADER_LEN,
};
