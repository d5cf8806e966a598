//! Transport module
//!
//! Connection setup for the node transport: the per-connection pipeline,
//! server-side port unification, client-side opportunistic TLS, and the
//! loops that accept and open connections.

pub mod pipeline;
pub mod unification;
pub mod client;
pub mod hook;
pub mod errors;
mod rewind;
mod stream;
mod handler;
mod forwarder;
mod server;
mod outbound;

pub use client::{ClientSslHandler, OpportunisticConnector};
pub use errors::{ErrorReporter, ExceptionHandler, LogErrorReporter};
pub use forwarder::{forward, Transferred};
pub use handler::{handle_connection, ConnectionSettings};
pub use hook::{ConnectionHook, DualModeTransport};
pub use outbound::OutboundListener;
pub use pipeline::{
    ConnectionPipeline, Pipeline, Stage,
    CLIENT_SSL_HANDLER, PORT_UNIFICATION, SSL_CLIENT, SSL_SERVER,
};
pub use rewind::Rewind;
pub use server::TransportServer;
pub use stream::TransportStream;
pub use unification::{PortUnificationStage, Protocol, UnificationState};
