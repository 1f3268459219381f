// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// A frame could not be accepted, or its result could not be awaited.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("input slot '{0}' is not a workflow input")]
    UnknownInputSlot(String),

    #[error("source id {source_id} is out of range (workflow has {source_number} sources)")]
    SourceOutOfRange { source_id: u32, source_number: u32 },

    #[error("exceeded max running count: {limit} frames already in flight")]
    Backpressure { limit: usize },

    #[error("async predict requires a frame callback to be set first")]
    MissingCallback,

    #[error("engine is shutting down")]
    ShuttingDown,

    #[error("frame {0} was dropped before delivery")]
    Disconnected(u64),
}

impl SubmitError {
    /// Numeric code compatible with frame error codes.
    pub fn code(&self) -> i32 {
        match self {
            SubmitError::Backpressure { .. } => -1001,
            _ => -1000,
        }
    }
}
