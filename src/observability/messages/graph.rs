// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for workflow validation and graph construction.

use crate::errors::GraphError;
use crate::observability::messages::StructuredLog;
use crate::traits::StageDescriptor;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// The workflow was bound into an acyclic graph.
///
/// # Log Level
/// `info!` - Startup event
pub struct GraphBuilt<'a> {
    pub workflow: &'a str,
    pub stage_count: usize,
    pub slot_count: usize,
    pub entry_stages: usize,
    pub terminal_stages: usize,
}

impl Display for GraphBuilt<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Workflow '{}' built: {} stages over {} slots ({} entry, {} terminal)",
            self.workflow, self.stage_count, self.slot_count, self.entry_stages, self.terminal_stages
        )
    }
}

impl StructuredLog for GraphBuilt<'_> {
    fn log(&self) {
        tracing::info!(
            workflow = self.workflow,
            stage_count = self.stage_count,
            slot_count = self.slot_count,
            entry_stages = self.entry_stages,
            terminal_stages = self.terminal_stages,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("graph_built", span_name = name, workflow = self.workflow)
    }
}

/// Building the engine failed. Startup aborts.
///
/// # Log Level
/// `error!` - Fatal at build time
pub struct GraphRejected<'a> {
    pub workflow: &'a str,
    pub error: &'a GraphError,
}

impl Display for GraphRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Workflow '{}' rejected: {}", self.workflow, self.error)
    }
}

impl StructuredLog for GraphRejected<'_> {
    fn log(&self) {
        tracing::error!(workflow = self.workflow, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("graph_rejected", span_name = name, workflow = self.workflow)
    }
}

/// A stage's instances were created and initialized.
///
/// # Log Level
/// `debug!` - Startup detail
pub struct StageInitialized<'a> {
    pub stage: &'a str,
    pub kind: &'a str,
    pub instances: usize,
    pub descriptor: StageDescriptor,
}

impl Display for StageInitialized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' ({}) ready with {} instance(s): thread_safe={}, needs_reorder={}, source_context_dependent={}",
            self.stage,
            self.kind,
            self.instances,
            self.descriptor.thread_safe,
            self.descriptor.needs_reorder,
            self.descriptor.source_context_dependent
        )
    }
}

impl StructuredLog for StageInitialized<'_> {
    fn log(&self) {
        tracing::debug!(
            stage = self.stage,
            kind = self.kind,
            instances = self.instances,
            thread_safe = self.descriptor.thread_safe,
            needs_reorder = self.descriptor.needs_reorder,
            source_context_dependent = self.descriptor.source_context_dependent,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("stage_initialized", span_name = name, stage = self.stage)
    }
}
