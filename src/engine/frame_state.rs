// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::config::{StageNode, WorkflowGraph};
use crate::engine::gauge::FramePermit;
use crate::data::{FrameOutput, FrameStatus, InputFrame, ItemVector, SequenceId, SourceId};
use crate::errors::{ErrorKind, StageFailure};

/// Where a finished frame goes.
pub(crate) enum Delivery {
    /// A caller blocked in sync predict.
    Blocking(oneshot::Sender<FrameOutput>),
    /// The engine-wide frame callback.
    Callback,
}

/// What applying one stage's outputs changed.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Applied {
    /// Successor stages whose last predecessor just finished
    pub ready: Vec<usize>,
    pub complete: bool,
}

/// Accumulating state of one submitted frame.
pub(crate) struct FrameState {
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    pub global_sequence_id: u64,
    input: Arc<InputFrame>,
    slots: Vec<Option<ItemVector>>,
    pending_readers: Vec<usize>,
    pending_predecessors: Vec<usize>,
    remaining_stages: usize,
    failures: Vec<(String, StageFailure)>,
    status: FrameStatus,
    delivery: Option<Delivery>,
    permit: Option<FramePermit>,
    submitted_at: Instant,
}

pub(crate) type SharedFrame = Arc<Mutex<FrameState>>;

impl FrameState {
    pub fn new(
        graph: &WorkflowGraph,
        input: Arc<InputFrame>,
        sequence_id: SequenceId,
        global_sequence_id: u64,
        delivery: Delivery,
    ) -> Self {
        let mut slots = vec![None; graph.slot_names().len()];
        let mut failures = Vec::new();
        for &slot in graph.flow_inputs() {
            let name = graph.slot_name(slot);
            slots[slot] = Some(match input.slots.get(name) {
                Some(vector) => vector.clone(),
                None => {
                    let failure = StageFailure::new(
                        ErrorKind::InputInvalid,
                        format!("input slot '{}' missing from frame", name),
                    );
                    failures.push((graph.producer_name(slot).to_string(), failure.clone()));
                    ItemVector::new().with_error(failure)
                }
            });
        }

        Self {
            source_id: input.source_id,
            sequence_id,
            global_sequence_id,
            slots,
            pending_readers: (0..graph.slot_names().len())
                .map(|slot| graph.consumers(slot).len())
                .collect(),
            pending_predecessors: graph.stages().iter().map(|s| s.predecessors.len()).collect(),
            remaining_stages: graph.stages().len(),
            failures,
            status: FrameStatus::Submitted,
            delivery: Some(delivery),
            permit: None,
            submitted_at: Instant::now(),
            input,
        }
    }

    /// Attach the in-flight permit, released once the frame is delivered.
    pub fn with_permit(mut self, permit: FramePermit) -> Self {
        self.permit = Some(permit);
        self
    }

    pub fn take_permit(&mut self) -> Option<FramePermit> {
        self.permit.take()
    }

    pub fn input(&self) -> &InputFrame {
        &self.input
    }

    pub fn is_async(&self) -> bool {
        matches!(self.delivery, Some(Delivery::Callback))
    }

    #[cfg(test)]
    pub fn status(&self) -> FrameStatus {
        self.status
    }

    /// Snapshot the vectors bound to `stage`'s inputs, in declaration order.
    ///
    /// Items are shared, not copied. With `release` set, an intermediate slot is
    /// dropped once its last consumer took its snapshot.
    pub fn take_inputs(&mut self, graph: &WorkflowGraph, stage: &StageNode, release: bool) -> Vec<ItemVector> {
        self.status = FrameStatus::Running;
        let inputs = stage
            .input_slots
            .iter()
            .map(|&slot| {
                self.slots[slot].clone().unwrap_or_else(|| {
                    ItemVector::new().with_error(StageFailure::new(
                        ErrorKind::OutputNotReady,
                        format!("slot '{}' has no data", graph.slot_name(slot)),
                    ))
                })
            })
            .collect();

        let mut seen = Vec::with_capacity(stage.input_slots.len());
        for &slot in &stage.input_slots {
            if seen.contains(&slot) {
                continue;
            }
            seen.push(slot);
            self.pending_readers[slot] = self.pending_readers[slot].saturating_sub(1);
            if release && self.pending_readers[slot] == 0 && !graph.is_flow_output(slot) {
                self.slots[slot] = None;
            }
        }

        inputs
    }

    /// Store `stage`'s released outputs and advance the dependency counters.
    pub fn apply(
        &mut self,
        graph: &WorkflowGraph,
        stage: &StageNode,
        outputs: Vec<ItemVector>,
        failure: Option<StageFailure>,
        release: bool,
    ) -> Applied {
        for (&slot, vector) in stage.output_slots.iter().zip(outputs) {
            let unread = self.pending_readers[slot] == 0 && !graph.is_flow_output(slot);
            if !(release && unread) {
                self.slots[slot] = Some(vector);
            }
        }
        if let Some(failure) = failure {
            self.failures.push((stage.name.clone(), failure));
        }

        let mut applied = Applied::default();
        for &succ in &stage.successors {
            self.pending_predecessors[succ] -= 1;
            if self.pending_predecessors[succ] == 0 {
                applied.ready.push(succ);
            }
        }

        self.remaining_stages -= 1;
        if self.remaining_stages == 0 {
            self.status = if self.failures.iter().any(|(_, f)| f.kind.is_failure()) {
                FrameStatus::Failed
            } else {
                FrameStatus::Complete
            };
            applied.complete = true;
        }
        applied
    }

    /// Build the caller-facing output and hand over the delivery target.
    ///
    /// Returns `None` when the frame was already finished.
    pub fn finish(&mut self, graph: &WorkflowGraph) -> Option<(FrameOutput, Delivery, Duration)> {
        let delivery = self.delivery.take()?;

        let outputs = graph
            .flow_outputs()
            .iter()
            .map(|&slot| {
                let name = graph.slot_name(slot).to_string();
                let vector = self.slots[slot].clone().unwrap_or_else(|| {
                    let failure = StageFailure::new(
                        ErrorKind::OutputNotReady,
                        format!("output slot '{}' was never written", name),
                    );
                    self.failures.push((name.clone(), failure.clone()));
                    ItemVector::new().with_error(failure)
                });
                (name, vector)
            })
            .collect();

        let error_code = self.failures.iter().map(|(_, f)| f.code).sum();
        let error_detail = self
            .failures
            .iter()
            .map(|(stage, f)| format!("{}: {}", stage, f.message))
            .collect::<Vec<_>>()
            .join("; ");
        if self.failures.iter().any(|(_, f)| f.kind.is_failure()) {
            self.status = FrameStatus::Failed;
        }

        let output = FrameOutput {
            source_id: self.source_id,
            sequence_id: self.sequence_id,
            global_sequence_id: self.global_sequence_id,
            status: self.status,
            outputs,
            error_code,
            error_detail,
            failures: self.failures.clone(),
            input: self.input.clone(),
        };
        self.status = FrameStatus::Delivered;
        Some((output, delivery, self.submitted_at.elapsed()))
    }
}
