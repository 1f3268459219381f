// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-frame failure records.
//!
//! Stage failures never abort the run. They are attached to the affected
//! frame (and to the placeholder vectors written in place of real output) and
//! summed into the delivered frame's error code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a per-frame failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The parameter handed to the invocation was unusable.
    BadParameter,
    /// The stage legitimately produced nothing. Not counted as a failure.
    NoResult,
    /// The stage reported an internal failure.
    InternalFailure,
    /// The invocation exceeded its configured deadline.
    Timeout,
    /// A flow output slot had no data when the frame completed.
    OutputNotReady,
    /// The frame input was malformed.
    InputInvalid,
}

impl ErrorKind {
    /// Stable numeric code reported to callers.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::NoResult => 0,
            ErrorKind::BadParameter => -1,
            ErrorKind::InputInvalid => -1000,
            ErrorKind::InternalFailure => -2000,
            ErrorKind::Timeout => -2001,
            ErrorKind::OutputNotReady => -2002,
        }
    }

    /// Whether this kind turns the owning frame into `Failed`.
    pub fn is_failure(self) -> bool {
        !matches!(self, ErrorKind::NoResult)
    }
}

/// A failure recorded on a frame, a vector, or a single item.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind:?} ({code}): {message}")]
pub struct StageFailure {
    pub kind: ErrorKind,
    pub code: i32,
    pub message: String,
}

impl StageFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalFailure, message)
    }

    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadParameter, message)
    }

    pub fn no_result(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoResult, message)
    }

    pub fn timeout(stage: &str, limit: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("stage '{}' exceeded its {:?} deadline", stage, limit),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_kinds() {
        assert_eq!(StageFailure::internal("boom").code, -2000);
        assert_eq!(StageFailure::bad_parameter("nope").code, -1);
        assert_eq!(StageFailure::no_result("empty").code, 0);
        assert!(!ErrorKind::NoResult.is_failure());
        assert!(ErrorKind::Timeout.is_failure());
    }

    #[test]
    fn test_display_includes_message() {
        let failure = StageFailure::internal("detector crashed");
        assert!(failure.to_string().contains("detector crashed"));
        assert!(failure.to_string().contains("-2000"));
    }
}
