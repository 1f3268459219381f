// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for per-stage scheduling events.
//!
//! * Admission into a stage and invocation outcome
//! * Skips, deadlines and panics
//! * Reorder-buffer release and overflow
//! * Instance finalization

use crate::data::{SequenceId, SourceId};
use crate::errors::StageFailure;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A frame entered a stage's execution queue with its parameter snapshot.
///
/// # Log Level
/// `trace!` - High-volume scheduling detail
pub struct StageAdmitted<'a> {
    pub stage: &'a str,
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
}

impl Display for StageAdmitted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Frame {}:{} admitted to stage '{}'",
            self.source_id, self.sequence_id, self.stage
        )
    }
}

impl StructuredLog for StageAdmitted<'_> {
    fn log(&self) {
        tracing::trace!(
            stage = self.stage,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "stage_admitted",
            span_name = name,
            stage = self.stage,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
        )
    }
}

/// A stage invocation is about to run on a worker.
///
/// # Log Level
/// `trace!` - High-volume scheduling detail
pub struct StageInvocationStarted<'a> {
    pub stage: &'a str,
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    pub input_count: usize,
}

impl Display for StageInvocationStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Invoking stage '{}' for frame {}:{} with {} input vector(s)",
            self.stage, self.source_id, self.sequence_id, self.input_count
        )
    }
}

impl StructuredLog for StageInvocationStarted<'_> {
    fn log(&self) {
        tracing::trace!(
            stage = self.stage,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
            input_count = self.input_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "stage_invocation",
            span_name = name,
            stage = self.stage,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
        )
    }
}

/// A stage invocation returned outputs.
///
/// # Log Level
/// `trace!` - High-volume scheduling detail
pub struct StageInvocationCompleted<'a> {
    pub stage: &'a str,
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    pub duration: Duration,
}

impl Display for StageInvocationCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' finished frame {}:{} in {:?}",
            self.stage, self.source_id, self.sequence_id, self.duration
        )
    }
}

impl StructuredLog for StageInvocationCompleted<'_> {
    fn log(&self) {
        tracing::trace!(
            stage = self.stage,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
            duration_us = self.duration.as_micros() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "stage_invocation_completed",
            span_name = name,
            stage = self.stage,
            duration = ?self.duration,
        )
    }
}

/// A stage reported a failure for a frame. Downstream stages receive INVALID placeholders.
///
/// # Log Level
/// `warn!` - Recorded on the frame, the run continues
pub struct StageInvocationFailed<'a> {
    pub stage: &'a str,
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    pub failure: &'a StageFailure,
}

impl Display for StageInvocationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' failed for frame {}:{}: {}",
            self.stage, self.source_id, self.sequence_id, self.failure
        )
    }
}

impl StructuredLog for StageInvocationFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            stage = self.stage,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
            code = self.failure.code,
            kind = ?self.failure.kind,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "stage_failed",
            span_name = name,
            stage = self.stage,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
        )
    }
}

/// An invocation ran past its deadline. The frame moves on; the execution slot
/// stays occupied until the invocation returns.
///
/// # Log Level
/// `error!` - Likely a stuck stage
pub struct StageTimedOut<'a> {
    pub stage: &'a str,
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    pub timeout: Duration,
}

impl Display for StageTimedOut<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' exceeded {:?} on frame {}:{}",
            self.stage, self.timeout, self.source_id, self.sequence_id
        )
    }
}

impl StructuredLog for StageTimedOut<'_> {
    fn log(&self) {
        tracing::error!(
            stage = self.stage,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
            timeout_ms = self.timeout.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("stage_timed_out", span_name = name, stage = self.stage)
    }
}

/// A stage was not invoked for a frame (failed input or a disable override).
///
/// # Log Level
/// `debug!` - Expected control flow
pub struct StageSkipped<'a> {
    pub stage: &'a str,
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    pub reason: &'a str,
}

impl Display for StageSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' skipped for frame {}:{}: {}",
            self.stage, self.source_id, self.sequence_id, self.reason
        )
    }
}

impl StructuredLog for StageSkipped<'_> {
    fn log(&self) {
        tracing::debug!(
            stage = self.stage,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("stage_skipped", span_name = name, stage = self.stage)
    }
}

/// A stage's output for a frame became visible to successors.
///
/// # Log Level
/// `trace!` - High-volume scheduling detail
pub struct StageOutputReleased<'a> {
    pub stage: &'a str,
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    /// Completed outputs still held back behind a missing lower id
    pub held: usize,
}

impl Display for StageOutputReleased<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' released frame {}:{} ({} held)",
            self.stage, self.source_id, self.sequence_id, self.held
        )
    }
}

impl StructuredLog for StageOutputReleased<'_> {
    fn log(&self) {
        tracing::trace!(
            stage = self.stage,
            source_id = self.source_id,
            sequence_id = self.sequence_id,
            held = self.held,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("stage_released", span_name = name, stage = self.stage)
    }
}

/// The reorder buffer exceeded its capacity and flushed past a missing id.
///
/// # Log Level
/// `warn!` - Output order is no longer guaranteed for the skipped ids
pub struct ReorderOverflow<'a> {
    pub stage: &'a str,
    pub source_id: SourceId,
    pub capacity: usize,
    pub missing_from: SequenceId,
    pub flushed: usize,
}

impl Display for ReorderOverflow<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Reorder buffer of stage '{}' (source {}) exceeded {} entries waiting for id {}; flushed {}",
            self.stage, self.source_id, self.capacity, self.missing_from, self.flushed
        )
    }
}

impl StructuredLog for ReorderOverflow<'_> {
    fn log(&self) {
        tracing::warn!(
            stage = self.stage,
            source_id = self.source_id,
            capacity = self.capacity,
            missing_from = self.missing_from,
            flushed = self.flushed,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("reorder_overflow", span_name = name, stage = self.stage)
    }
}

/// Box filter applied its area threshold.
///
/// # Log Level
/// `trace!` - High-volume stage detail
pub struct BoxesFiltered<'a> {
    pub stage: &'a str,
    pub total: usize,
    pub filtered: usize,
    pub threshold: f32,
}

impl Display for BoxesFiltered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' filtered {}/{} boxes below area {}",
            self.stage, self.filtered, self.total, self.threshold
        )
    }
}

impl StructuredLog for BoxesFiltered<'_> {
    fn log(&self) {
        tracing::trace!(
            stage = self.stage,
            total = self.total,
            filtered = self.filtered,
            threshold = self.threshold as f64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("box_filter", span_name = name, stage = self.stage)
    }
}

/// Every instance of a stage has been finalized.
///
/// # Log Level
/// `debug!` - Shutdown detail
pub struct StageFinalized<'a> {
    pub stage: &'a str,
    pub instances: usize,
}

impl Display for StageFinalized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' finalized ({} instance(s))",
            self.stage, self.instances
        )
    }
}

impl StructuredLog for StageFinalized<'_> {
    fn log(&self) {
        tracing::debug!(stage = self.stage, instances = self.instances, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("stage_finalized", span_name = name, stage = self.stage)
    }
}
