// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structured logging for the engine.
//!
//! Every diagnostic and operational event is a message struct with a `Display`
//! implementation and a [`messages::StructuredLog`] implementation, so call sites
//! never carry format strings and the emitted events always carry the same
//! structured fields.
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - engine lifecycle, submission, delivery, parameter updates
//! * `messages::stage` - admission, invocation, release and reorder events
//! * `messages::graph` - workflow validation and graph construction
//!
//! # Usage
//!
//! ```rust
//! use frameflow::observability::messages::{stage::StageSkipped, StructuredLog};
//!
//! let msg = StageSkipped {
//!     stage: "tracker",
//!     source_id: 0,
//!     sequence_id: 7,
//!     reason: "input 'boxes' failed upstream",
//! };
//! msg.log();
//! assert!(msg.to_string().contains("tracker"));
//! ```

pub mod messages;
