//! # strand-core
//!
//! Foundation types, errors, branded IDs, and utilities for the Strand
//! streaming timeline engine.
//!
//! This crate provides the shared vocabulary that all other Strand crates depend on:
//!
//! - **Branded IDs**: `TurnId`, `MessageId`, `FrameId` as newtypes for type safety
//! - **Errors**: `StrandError` taxonomy via `thiserror` (transport, protocol, cancellation, connection loss)
//! - **Backoff**: exponential reconnect delay arithmetic
//! - **Logging**: `tracing` subscriber setup for binaries and tests
//! - **Time**: millisecond wall-clock helper used for item timestamps

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod retry;
pub mod time;

pub use errors::{Result, StrandError};
pub use ids::{FrameId, MessageId, TurnId};
