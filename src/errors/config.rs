// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while reading workflow files from disk.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read workflow file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML workflow: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON workflow: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML workflow: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported workflow file extension for '{0}' (expected yaml, yml, json or toml)")]
    UnsupportedFormat(PathBuf),

    #[error("workflow validation failed:\n{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n"))]
    Invalid(Vec<crate::errors::GraphError>),
}
