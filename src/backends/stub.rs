// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::data::{Item, Parameter, SequenceId, SourceId};
use crate::errors::{ParamError, StageFailure};
use crate::traits::{Stage, StageDescriptor, StageInit, StageInput, StageResult};

/// One observed invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Source the instance was created for, `None` for shared instances
    pub instance_source: Option<SourceId>,
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    /// Parameter snapshot the invocation ran with
    pub parameter: Parameter,
}

/// Shared observation point for every instance built from one factory.
#[derive(Default)]
pub struct StageProbe {
    invocations: Mutex<Vec<Invocation>>,
    completions: Mutex<Vec<(SourceId, SequenceId)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    active_per_source: Mutex<Vec<(SourceId, usize)>>,
    max_active_per_source: AtomicUsize,
    pub initialized: AtomicUsize,
    pub finalized: AtomicUsize,
    pub profiling: AtomicBool,
    pub parameter_updates: AtomicUsize,
}

impl StageProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self, source_id: SourceId) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let mut per_source = self.active_per_source.lock().unwrap();
        let count = match per_source.iter_mut().find(|(s, _)| *s == source_id) {
            Some((_, count)) => {
                *count += 1;
                *count
            }
            None => {
                per_source.push((source_id, 1));
                1
            }
        };
        self.max_active_per_source.fetch_max(count, Ordering::SeqCst);
    }

    fn exit(&self, source_id: SourceId) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        let mut per_source = self.active_per_source.lock().unwrap();
        if let Some((_, count)) = per_source.iter_mut().find(|(s, _)| *s == source_id) {
            *count -= 1;
        }
    }

    /// Invocations in the order they started.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Sequence ids of `source_id` in the order the stage saw them.
    pub fn sequence_for(&self, source_id: SourceId) -> Vec<SequenceId> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.source_id == source_id)
            .map(|i| i.sequence_id)
            .collect()
    }

    /// (source, sequence) pairs in the order invocations returned.
    pub fn completions(&self) -> Vec<(SourceId, SequenceId)> {
        self.completions.lock().unwrap().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_per_source(&self) -> usize {
        self.max_active_per_source.load(Ordering::SeqCst)
    }
}

/// Forces invocations to return in a fixed order of sequence ids.
///
/// Each invocation blocks until every id listed before its own has passed.
/// Ids not listed pass immediately.
pub struct CompletionGate {
    order: Vec<SequenceId>,
    next: Mutex<usize>,
    turn: Condvar,
}

impl CompletionGate {
    pub fn new(order: Vec<SequenceId>) -> Arc<Self> {
        Arc::new(Self {
            order,
            next: Mutex::new(0),
            turn: Condvar::new(),
        })
    }

    fn pass(&self, sequence_id: SequenceId) {
        let Some(position) = self.order.iter().position(|&s| s == sequence_id) else {
            return;
        };
        let mut next = self.next.lock().unwrap();
        while *next != position {
            next = self.turn.wait(next).unwrap();
        }
        *next += 1;
        self.turn.notify_all();
    }
}

pub type DelayFn = Arc<dyn Fn(SourceId, SequenceId) -> Duration + Send + Sync>;

/// Identity stage (output `i` = input `i`) that reports everything it sees to a
/// [`StageProbe`].
pub struct RecordingStage {
    probe: Arc<StageProbe>,
    descriptor: StageDescriptor,
    instance_source: Option<SourceId>,
    delay: Option<DelayFn>,
    gate: Option<Arc<CompletionGate>>,
    fail_on: HashSet<SequenceId>,
    hang_on: HashSet<SequenceId>,
}

impl RecordingStage {
    pub fn new(probe: Arc<StageProbe>, descriptor: StageDescriptor) -> Self {
        Self {
            probe,
            descriptor,
            instance_source: None,
            delay: None,
            gate: None,
            fail_on: HashSet::new(),
            hang_on: HashSet::new(),
        }
    }

    pub fn thread_safe() -> Self {
        Self::new(
            StageProbe::new(),
            StageDescriptor {
                thread_safe: true,
                ..Default::default()
            },
        )
    }

    pub fn with_delay(mut self, delay: DelayFn) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_gate(mut self, gate: Arc<CompletionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn failing_on(mut self, sequence_ids: impl IntoIterator<Item = SequenceId>) -> Self {
        self.fail_on = sequence_ids.into_iter().collect();
        self
    }

    /// Sleep far past any test deadline on these ids.
    pub fn hanging_on(mut self, sequence_ids: impl IntoIterator<Item = SequenceId>) -> Self {
        self.hang_on = sequence_ids.into_iter().collect();
        self
    }

    fn run_one(&self, frame: &StageInput) -> StageResult {
        self.probe.enter(frame.source_id);
        let parameter = frame.parameter.as_ref().clone();

        if let Some(delay) = &self.delay {
            std::thread::sleep(delay(frame.source_id, frame.sequence_id));
        }
        if self.hang_on.contains(&frame.sequence_id) {
            std::thread::sleep(Duration::from_millis(400));
        }
        if let Some(gate) = &self.gate {
            gate.pass(frame.sequence_id);
        }

        self.probe.invocations.lock().unwrap().push(Invocation {
            instance_source: self.instance_source,
            source_id: frame.source_id,
            sequence_id: frame.sequence_id,
            parameter,
        });
        self.probe
            .completions
            .lock()
            .unwrap()
            .push((frame.source_id, frame.sequence_id));
        self.probe.exit(frame.source_id);

        if self.fail_on.contains(&frame.sequence_id) {
            return Err(StageFailure::internal(format!(
                "forced failure on frame {}",
                frame.sequence_id
            )));
        }
        Ok(frame.inputs.clone())
    }
}

impl Stage for RecordingStage {
    fn initialize(&mut self, init: &StageInit) -> Result<(), StageFailure> {
        self.instance_source = init.source_id;
        self.probe.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn process(&self, batch: &[StageInput]) -> Vec<StageResult> {
        batch.iter().map(|frame| self.run_one(frame)).collect()
    }

    fn update_parameter(&self, value: &Parameter) -> Result<(), ParamError> {
        if value.as_value().get("reject").is_some() {
            return Err(ParamError::Rejected {
                stage: "recorder".to_string(),
                reason: "asked to reject".to_string(),
            });
        }
        self.probe.parameter_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn parameter(&self) -> Parameter {
        Parameter::new(serde_json::json!({ "generation": 0 }))
    }

    fn version(&self) -> String {
        "recorder-1.0".to_string()
    }

    fn finalize(&self) {
        self.probe.finalized.fetch_add(1, Ordering::SeqCst);
    }

    fn descriptor(&self) -> StageDescriptor {
        self.descriptor
    }

    fn on_profiling_changed(&self, enabled: bool) {
        self.probe.profiling.store(enabled, Ordering::SeqCst);
    }
}

/// Emits one score per box, keeping INVALID and FILTERED positions in place.
pub struct ScoreStage;

impl Stage for ScoreStage {
    fn process(&self, batch: &[StageInput]) -> Vec<StageResult> {
        batch
            .iter()
            .map(|frame| {
                let boxes = frame
                    .inputs
                    .first()
                    .ok_or_else(|| StageFailure::internal("no boxes"))?;
                Ok(vec![boxes.map_valid("score", |i, _| {
                    Item::valid("score", 1.0_f32 / (i as f32 + 1.0))
                })])
            })
            .collect()
    }

    fn version(&self) -> String {
        "score-1.0".to_string()
    }

    fn descriptor(&self) -> StageDescriptor {
        StageDescriptor {
            thread_safe: true,
            ..Default::default()
        }
    }
}

/// A stage whose initialization always fails.
pub struct BrokenStage;

impl Stage for BrokenStage {
    fn initialize(&mut self, init: &StageInit) -> Result<(), StageFailure> {
        Err(StageFailure::internal(format!(
            "{} cannot load its model",
            init.name
        )))
    }

    fn process(&self, batch: &[StageInput]) -> Vec<StageResult> {
        batch.iter().map(|f| Ok(f.inputs.clone())).collect()
    }

    fn version(&self) -> String {
        "broken-0.0".to_string()
    }

    fn descriptor(&self) -> StageDescriptor {
        StageDescriptor::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_orders_completion() {
        let gate = CompletionGate::new(vec![1, 0]);
        let g = gate.clone();
        let first = std::thread::spawn(move || g.pass(0));
        std::thread::sleep(Duration::from_millis(30));
        assert!(!first.is_finished());
        gate.pass(1);
        first.join().unwrap();
        assert_eq!(*gate.next.lock().unwrap(), 2);
    }
}
