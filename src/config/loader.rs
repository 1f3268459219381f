// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{DEFAULT_SOURCE_NUMBER, DEFAULT_WORKFLOW_NAME, FALLBACK_CONCURRENCY};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Static description of a workflow: its stages and how their slots connect.
///
/// Slots are named data channels. A slot is produced either by the frame
/// input (`inputs`) or by exactly one stage, and may be consumed by any
/// number of stages. `outputs` lists the slots delivered to the caller.
///
/// # Example
/// ```yaml
/// name: face_pipeline
/// source_number: 2
/// inputs: [image, boxes]
/// outputs: [tracked_boxes, scores]
/// engine:
///   max_concurrency: 4
///   max_inflight_frames: 64
/// stages:
///   - name: box_filter
///     kind: box_filter
///     inputs: [boxes]
///     outputs: [filtered_boxes]
///     parameter:
///       threshold: 2500.0
///   - name: tracker
///     kind: passthrough
///     inputs: [filtered_boxes]
///     outputs: [tracked_boxes]
///     timeout_ms: 200
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_workflow_name")]
    pub name: String,
    #[serde(default = "default_source_number")]
    pub source_number: u32,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    #[serde(default)]
    pub engine: EngineOptions,
    pub stages: Vec<StageConfig>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            name: default_workflow_name(),
            source_number: default_source_number(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            engine: EngineOptions::default(),
            stages: Vec::new(),
        }
    }
}

fn default_workflow_name() -> String {
    DEFAULT_WORKFLOW_NAME.to_string()
}

fn default_source_number() -> u32 {
    DEFAULT_SOURCE_NUMBER
}

/// Engine-wide scheduling options.
///
/// # Fields
/// * `worker_threads` - size of the runtime's async worker pool (defaults to tokio's choice)
/// * `max_concurrency` - stage invocations allowed in flight across all stages
/// * `max_inflight_frames` - submissions beyond this many unfinished frames are rejected
/// * `reorder_capacity` - when set, a reorder lane holding more completed frames
///   than this flushes them instead of waiting for a missing lower id
/// * `release_intermediate` - drop intermediate slot data once every consumer took it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineOptions {
    pub worker_threads: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub max_inflight_frames: Option<usize>,
    pub reorder_capacity: Option<usize>,
    #[serde(default)]
    pub release_intermediate: bool,
}

impl EngineOptions {
    /// Configured concurrency, or available parallelism, never below one.
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrency
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(FALLBACK_CONCURRENCY)
            })
            .max(1)
    }
}

/// Configuration for a single stage.
///
/// # Fields
/// * `name` - unique name, used for parameter updates and per-frame overrides
/// * `kind` - registry key selecting the implementation
/// * `inputs` / `outputs` - slot names, in the order the stage sees them
/// * `parameter` - initial parameter; when absent the stage's own default is used
/// * `timeout_ms` - optional per-invocation deadline
/// * `skip_on_failed_input` - do not invoke the stage when an input slot failed
/// * `options` - implementation-specific settings passed to `initialize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub parameter: Option<serde_json::Value>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub skip_on_failed_input: bool,
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
}

impl StageConfig {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameter: None,
            timeout_ms: None,
            skip_on_failed_input: false,
            options: HashMap::new(),
        }
    }

    pub fn inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn parameter(mut self, value: serde_json::Value) -> Self {
        self.parameter = Some(value);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn skip_on_failed_input(mut self, skip: bool) -> Self {
        self.skip_on_failed_input = skip;
        self
    }
}

/// Serialization format of a workflow file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Some(ConfigFormat::Yaml),
            Some("json") => Some(ConfigFormat::Json),
            Some("toml") => Some(ConfigFormat::Toml),
            _ => None,
        }
    }
}

/// Parse a workflow from text in the given format.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<WorkflowConfig, ConfigError> {
    let cfg = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };
    Ok(cfg)
}

/// Load a workflow file; the format follows the file extension.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<WorkflowConfig, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, format)
}

/// Load a workflow file and check that it describes a buildable graph.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<WorkflowConfig, ConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_workflow(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}
