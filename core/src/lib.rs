//! Root of the `replay-core` library.
//!
//! Intercepts outbound HTTP calls and answers them from recorded fixtures,
//! going live (and optionally recording) only when the session mode allows.

// Library code reports through tracing, never directly to the terminal.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
pub mod engine;
pub mod error;
pub mod identifier;
pub mod loader;
pub mod queue;
pub mod recorder;
pub mod session;
pub mod stub;
pub mod transport;
pub mod value;
pub mod writer;

pub use config::Mode;
pub use config::ReplayConfig;
pub use engine::Interceptor;
pub use error::ReplayError;
pub use error::Result;
pub use identifier::Identifier;
pub use identifier::Signature;
pub use queue::Lookup;
pub use queue::StubQueue;
pub use recorder::Recorder;
pub use session::ReplaySession;
pub use stub::Stub;
pub use stub::StubResponse;
pub use transport::HttpRequest;
pub use transport::HttpResponse;
pub use transport::LiveTransport;
pub use transport::ReqwestTransport;
pub use transport::TransportError;
pub use value::JsonValue;
pub use writer::FixtureWriter;
