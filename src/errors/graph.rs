// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Malformed workflow. Fatal at build time: no engine is created.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The workflow declares no stages at all.
    #[error("workflow '{workflow}' declares no stages")]
    EmptyWorkflow { workflow: String },

    /// Two stages share the same name.
    #[error("duplicate stage name: '{stage}'")]
    DuplicateStage { stage: String },

    /// A slot is produced twice, either by two stages or by a stage and the frame input.
    #[error("output slot '{slot}' is produced by both '{first}' and '{second}'")]
    DuplicateOutput {
        slot: String,
        first: String,
        second: String,
    },

    /// A stage consumes a slot that neither the frame input nor any stage produces.
    #[error("stage '{stage}' consumes slot '{slot}' which is never produced")]
    UnproducedInput { stage: String, slot: String },

    /// A declared flow output is never produced.
    #[error("workflow output '{slot}' is never produced")]
    UnproducedOutput { slot: String },

    /// The stage dependency graph contains a cycle.
    #[error("cyclic dependency detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// No factory is registered for the stage's kind.
    #[error("stage '{stage}' has unknown kind '{kind}'")]
    UnknownStageKind { stage: String, kind: String },

    /// A stage implementation refused to initialize.
    #[error("stage '{stage}' failed to initialize: {reason}")]
    StageInitFailed { stage: String, reason: String },

    /// Two built descriptors disagree for per-source instances of the same stage.
    #[error("stage '{stage}' reported inconsistent capability descriptors across instances")]
    InconsistentDescriptor { stage: String },

    /// The worker pool could not be started.
    #[error("engine runtime could not be started: {reason}")]
    RuntimeUnavailable { reason: String },
}
