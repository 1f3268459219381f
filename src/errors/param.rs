// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// A parameter update was refused. The stage keeps its previous parameter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("no stage named '{0}'")]
    UnknownStage(String),

    #[error("stage '{stage}' rejected parameter: {reason}")]
    Rejected { stage: String, reason: String },

    #[error("parameter could not be decoded: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for ParamError {
    fn from(err: serde_json::Error) -> Self {
        ParamError::Decode(err.to_string())
    }
}
