//! # strand-client
//!
//! Network side of the Strand timeline engine.
//!
//! - **Stream ingestion**: [`StreamClient`] POSTs a turn and decodes the
//!   chunked `data:` frames into [`strand_events::ChatEvent`]s
//! - **Orchestration**: [`TurnOrchestrator`] applies optimistic state, folds
//!   events through the reducer and publishes snapshots over `watch`
//! - **Side channel**: [`ConnectionManager`] keeps a socket alive with
//!   heartbeat, exponential backoff and an offline queue

#![deny(unsafe_code)]

pub mod errors;
pub mod orchestrator;
pub mod stream;
pub mod ws;

pub use errors::{ClientError, Result};
pub use orchestrator::{DefaultRequestBuilder, RequestBuilder, TurnOrchestrator};
pub use stream::{EventStream, StreamClient, decode_events};
pub use ws::{ConnectionManager, ConnectionState, Endpoint, NetworkPresence, PresenceHub, Subscription};
