// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for engine lifecycle and per-frame events.
//!
//! * Engine start and shutdown
//! * Frame submission, rejection, completion and delivery
//! * Parameter updates and profiling toggles

use crate::data::{FrameStatus, SequenceId, SourceId};
use crate::errors::{ParamError, SubmitError};
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Engine built and dispatch loops running.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use frameflow::observability::messages::engine::EngineStarted;
///
/// let msg = EngineStarted {
///     workflow: "faces",
///     stage_count: 3,
///     source_number: 2,
///     max_concurrency: 8,
///     max_inflight_frames: Some(64),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct EngineStarted<'a> {
    pub workflow: &'a str,
    pub stage_count: usize,
    pub source_number: u32,
    pub max_concurrency: usize,
    pub max_inflight_frames: Option<usize>,
}

impl Display for EngineStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Engine started for workflow '{}': {} stages, {} sources, max_concurrency={}",
            self.workflow, self.stage_count, self.source_number, self.max_concurrency
        )
    }
}

impl StructuredLog for EngineStarted<'_> {
    fn log(&self) {
        tracing::info!(
            workflow = self.workflow,
            stage_count = self.stage_count,
            source_number = self.source_number,
            max_concurrency = self.max_concurrency,
            max_inflight_frames = ?self.max_inflight_frames,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "engine",
            span_name = name,
            workflow = self.workflow,
            stage_count = self.stage_count,
            source_number = self.source_number,
        )
    }
}

/// Engine drained and stopped; every stage instance has been finalized.
///
/// # Log Level
/// `info!` - Important operational event
pub struct EngineStopped<'a> {
    pub workflow: &'a str,
    pub frames_submitted: u64,
    pub instances_finalized: usize,
}

impl Display for EngineStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Engine for workflow '{}' stopped after {} frames, {} stage instances finalized",
            self.workflow, self.frames_submitted, self.instances_finalized
        )
    }
}

impl StructuredLog for EngineStopped<'_> {
    fn log(&self) {
        tracing::info!(
            workflow = self.workflow,
            frames_submitted = self.frames_submitted,
            instances_finalized = self.instances_finalized,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("engine_stopped", span_name = name, workflow = self.workflow)
    }
}

/// A frame was accepted and assigned its sequence ids.
///
/// # Log Level
/// `debug!` - Per-frame event
pub struct FrameSubmitted {
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    pub global_sequence_id: u64,
    pub blocking: bool,
}

impl Display for FrameSubmitted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Frame {}:{} submitted ({}), global id {}",
            self.source_id,
            self.sequence_id,
            if self.blocking { "sync" } else { "async" },
            self.global_sequence_id
        )
    }
}

impl StructuredLog for FrameSubmitted {
    fn log(&self) {
        tracing::debug!(
            source_id = self.source_id,
            sequence_id = self.sequence_id,
            global_sequence_id = self.global_sequence_id,
            blocking = self.blocking,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "frame",
            span_name = name,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
        )
    }
}

/// A submission was refused before a sequence id was assigned.
///
/// # Log Level
/// `warn!` - The caller must retry or drop the frame
pub struct SubmissionRejected<'a> {
    pub source_id: SourceId,
    pub error: &'a SubmitError,
}

impl Display for SubmissionRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Frame from source {} rejected: {}",
            self.source_id, self.error
        )
    }
}

impl StructuredLog for SubmissionRejected<'_> {
    fn log(&self) {
        tracing::warn!(
            source_id = self.source_id,
            code = self.error.code(),
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "submission_rejected",
            span_name = name,
            source_id = self.source_id,
        )
    }
}

/// A per-frame override names a stage the workflow does not have.
///
/// # Log Level
/// `warn!` - The override is ignored
pub struct UnknownOverride<'a> {
    pub stage: &'a str,
    pub source_id: SourceId,
}

impl Display for UnknownOverride<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignoring override for unknown stage '{}' on a frame from source {}",
            self.stage, self.source_id
        )
    }
}

impl StructuredLog for UnknownOverride<'_> {
    fn log(&self) {
        tracing::warn!(stage = self.stage, source_id = self.source_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("unknown_override", span_name = name, stage = self.stage)
    }
}

/// Every stage finished for a frame.
///
/// # Log Level
/// `debug!` for complete frames, `warn!` for failed ones
pub struct FrameCompleted {
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    pub status: FrameStatus,
    pub error_code: i32,
    pub duration: Duration,
}

impl Display for FrameCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Frame {}:{} finished as {:?} (code {}) in {:?}",
            self.source_id, self.sequence_id, self.status, self.error_code, self.duration
        )
    }
}

impl StructuredLog for FrameCompleted {
    fn log(&self) {
        if self.status == FrameStatus::Failed {
            tracing::warn!(
                source_id = self.source_id,
                sequence_id = self.sequence_id,
                error_code = self.error_code,
                duration_ms = self.duration.as_millis() as u64,
                "{}", self
            );
        } else {
            tracing::debug!(
                source_id = self.source_id,
                sequence_id = self.sequence_id,
                duration_ms = self.duration.as_millis() as u64,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "frame_completed",
            span_name = name,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
            status = ?self.status,
        )
    }
}

/// A user callback panicked while handling a delivery.
///
/// # Log Level
/// `error!` - Delivery continues with the next frame
pub struct CallbackPanicked<'a> {
    pub callback: &'a str,
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
}

impl Display for CallbackPanicked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} callback panicked for frame {}:{}",
            self.callback, self.source_id, self.sequence_id
        )
    }
}

impl StructuredLog for CallbackPanicked<'_> {
    fn log(&self) {
        tracing::error!(
            callback = self.callback,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("callback_panicked", span_name = name, callback = self.callback)
    }
}

/// A stage accepted a new parameter.
///
/// # Log Level
/// `info!` - Configuration change
pub struct ParameterUpdated<'a> {
    pub stage: &'a str,
    pub instances: usize,
}

impl Display for ParameterUpdated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Parameter of stage '{}' updated on {} instance(s)",
            self.stage, self.instances
        )
    }
}

impl StructuredLog for ParameterUpdated<'_> {
    fn log(&self) {
        tracing::info!(stage = self.stage, instances = self.instances, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("parameter_updated", span_name = name, stage = self.stage)
    }
}

/// A parameter update was refused; the previous value stays in effect.
///
/// # Log Level
/// `warn!` - Reported to the caller as well
pub struct ParameterRejected<'a> {
    pub stage: &'a str,
    pub error: &'a ParamError,
}

impl Display for ParameterRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Parameter update for stage '{}' rejected: {}",
            self.stage, self.error
        )
    }
}

impl StructuredLog for ParameterRejected<'_> {
    fn log(&self) {
        tracing::warn!(stage = self.stage, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("parameter_rejected", span_name = name, stage = self.stage)
    }
}

/// Profiling switched on or off.
///
/// # Log Level
/// `info!` - Configuration change
pub struct ProfilingToggled {
    pub enabled: bool,
    pub instances_notified: usize,
}

impl Display for ProfilingToggled {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Profiling {} ({} stage instances notified)",
            if self.enabled { "enabled" } else { "disabled" },
            self.instances_notified
        )
    }
}

impl StructuredLog for ProfilingToggled {
    fn log(&self) {
        tracing::info!(
            enabled = self.enabled,
            instances_notified = self.instances_notified,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("profiling", span_name = name, enabled = self.enabled)
    }
}
