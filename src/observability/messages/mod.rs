// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! * `engine` - engine lifecycle and per-frame submission/delivery events
//! * `stage` - per-stage scheduling events
//! * `graph` - workflow validation and graph construction events

pub mod engine;
pub mod graph;
pub mod stage;

use tracing::Span;

/// A message that knows its own log level and structured fields.
pub trait StructuredLog {
    /// Emit the message as a `tracing` event.
    fn log(&self);

    /// Build a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
