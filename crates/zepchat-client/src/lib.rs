//! ZepChat client
//!
//! This crate provides:
//! - An observable value with replay-last-value subscriptions
//! - A stream consumer that turns a token-streamed HTTP response into
//!   incrementally published `{loading, text}` state
//! - A chat session controller that keeps the conversation log

pub mod consumer;
pub mod decode;
pub mod error;
pub mod observable;
pub mod session;
pub mod state;
pub mod transport;

// Re-export commonly used types
pub use consumer::StreamConsumer;
pub use decode::{DecodeError, Utf8StreamDecoder};
pub use error::{Result, StreamError};
pub use observable::{Observable, Subscription};
pub use session::{ChatSession, ChatTurn, IgnoreReason, Phase, Role, SubmitOutcome};
pub use state::StreamState;
pub use transport::{
    ByteStream, HttpTransport, RequestDescriptor, Transport, TransportResponse, build_http_client,
    direct_http_client,
};
pub use zepchat_contracts::{ChatRequest, ChatSettings};
