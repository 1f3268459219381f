// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Frame dispatch across the workflow graph.
//!
//! A frame moves through each stage in four steps:
//!
//! 1. **Offer** - the last predecessor released its outputs (entry stages are
//!    offered at submission); the frame joins the stage's lane for its source
//! 2. **Admit** - the lane policy lets it in; inputs and the parameter are
//!    snapshotted and the invocation is queued on the stage's dispatch loop
//! 3. **Complete** - a worker returned outputs (or a failure, or the deadline passed)
//! 4. **Release** - the lane lets the outputs become visible; they are merged into
//!    the frame and newly ready successors are offered
//!
//! Every lane step runs under the stage's lane mutex, never across a stage
//! invocation. Releasing offers to successors while still holding the lane, so
//! visibility order is exactly release order. Successors always sit later in the
//! topological order, so lane mutexes are only ever nested in that order.
//!
//! Dispatch loops run one per stage. A thread-safe stage spawns each invocation
//! as it arrives; any other stage awaits each invocation before taking the next
//! one. All invocations share one semaphore sized by `max_concurrency` and run on
//! the blocking pool, because stage code is synchronous.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Instant;

use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::config::WorkflowGraph;
use crate::data::{
    DisableMode, FrameOutput, InputFrame, ItemVector, SequenceId, SourceId, StageOverride,
    StageRelease,
};
use crate::engine::frame_state::{Delivery, FrameState, SharedFrame};
use crate::engine::gauge::{FrameGauge, FramePermit};
use crate::engine::profiler::Profiler;
use crate::engine::stage_runner::{Completion, Invocation, StageLane, StageRunner};
use crate::engine::{lock, FrameCallback, StageCallback};
use crate::errors::{StageFailure, SubmitError};
use crate::observability::messages::{
    engine::{CallbackPanicked, FrameCompleted, FrameSubmitted, SubmissionRejected, UnknownOverride},
    stage::{
        ReorderOverflow, StageAdmitted, StageInvocationCompleted, StageInvocationFailed,
        StageInvocationStarted, StageOutputReleased, StageSkipped, StageTimedOut,
    },
    StructuredLog,
};
use crate::traits::{StageInput, StageResult};

/// Items handed to the delivery thread, in the order they were produced.
pub(crate) enum Delivered {
    /// The permit is released when the frame is handed to the callback.
    Frame(FrameOutput, Option<FramePermit>),
    Stage(usize, StageRelease),
}

pub(crate) struct SchedulerOptions {
    pub source_number: u32,
    pub max_concurrency: usize,
    pub max_inflight_frames: Option<usize>,
    pub release_intermediate: bool,
}

enum Admission {
    Dispatched,
    Resolved(Completion),
}

pub(crate) struct Scheduler {
    pub graph: Arc<WorkflowGraph>,
    pub runners: Vec<StageRunner>,
    pub profiler: Profiler,
    pub gauge: FrameGauge,
    pub frame_callback: OnceLock<FrameCallback>,
    pub stage_callbacks: RwLock<HashMap<usize, StageCallback>>,
    options: SchedulerOptions,
    semaphore: Arc<Semaphore>,
    sequences: Vec<AtomicU64>,
    global_sequence: AtomicU64,
    deliveries: Mutex<Option<mpsc::UnboundedSender<Delivered>>>,
}

impl Scheduler {
    pub fn new(
        graph: Arc<WorkflowGraph>,
        runners: Vec<StageRunner>,
        options: SchedulerOptions,
    ) -> (Self, mpsc::UnboundedReceiver<Delivered>) {
        let (deliveries, delivery_queue) = mpsc::unbounded_channel();
        let stage_count = runners.len();
        let scheduler = Self {
            profiler: Profiler::new(stage_count),
            gauge: FrameGauge::new(options.max_inflight_frames),
            frame_callback: OnceLock::new(),
            stage_callbacks: RwLock::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(options.max_concurrency)),
            sequences: (0..options.source_number).map(|_| AtomicU64::new(0)).collect(),
            global_sequence: AtomicU64::new(0),
            graph,
            runners,
            options,
            deliveries: Mutex::new(Some(deliveries)),
        };
        (scheduler, delivery_queue)
    }

    pub fn source_number(&self) -> u32 {
        self.options.source_number
    }

    pub fn max_inflight_frames(&self) -> Option<usize> {
        self.options.max_inflight_frames
    }

    /// Hand `delivered` to the delivery thread. Fails once deliveries are closed.
    fn deliver(&self, delivered: Delivered) -> Result<(), Delivered> {
        match lock(&self.deliveries).as_ref() {
            Some(sender) => sender.send(delivered).map_err(|e| e.0),
            None => Err(delivered),
        }
    }

    /// Drop the delivery sender so the delivery thread ends after draining.
    pub fn close_deliveries(&self) {
        lock(&self.deliveries).take();
    }

    /// Wait until no stage invocation holds a concurrency permit.
    pub async fn wait_idle(&self) {
        let all = u32::try_from(self.options.max_concurrency).unwrap_or(u32::MAX);
        let _idle = self.semaphore.acquire_many(all).await;
    }

    pub fn runner(&self, name: &str) -> Option<&StageRunner> {
        self.graph
            .stage_by_name(name)
            .map(|node| &self.runners[node.index])
    }

    /// Accept a frame, assign its ids and offer it to the entry stages.
    ///
    /// Everything that can reject a frame is checked before a sequence id is
    /// taken, so ordered lanes never wait for an id that will not arrive.
    pub fn submit(
        &self,
        input: Arc<InputFrame>,
        delivery: Delivery,
    ) -> Result<(SourceId, SequenceId), SubmitError> {
        let source_id = input.source_id;
        let blocking = matches!(delivery, Delivery::Blocking(_));

        let permit = match self.check(&input, blocking) {
            Ok(permit) => permit,
            Err(error) => {
                SubmissionRejected {
                    source_id,
                    error: &error,
                }
                .log();
                return Err(error);
            }
        };

        let sequence_id = self.sequences[source_id as usize].fetch_add(1, Ordering::SeqCst);
        let global_sequence_id = self.global_sequence.fetch_add(1, Ordering::SeqCst);
        FrameSubmitted {
            source_id,
            sequence_id,
            global_sequence_id,
            blocking,
        }
        .log();

        let frame: SharedFrame = Arc::new(Mutex::new(
            FrameState::new(&self.graph, input, sequence_id, global_sequence_id, delivery)
                .with_permit(permit),
        ));

        for &index in self.graph.topological_order() {
            if self.graph.stage(index).is_entry() {
                self.offer(index, &frame);
            }
        }

        Ok((source_id, sequence_id))
    }

    fn check(&self, input: &InputFrame, blocking: bool) -> Result<FramePermit, SubmitError> {
        if input.source_id >= self.options.source_number {
            return Err(SubmitError::SourceOutOfRange {
                source_id: input.source_id,
                source_number: self.options.source_number,
            });
        }
        for slot in input.slots.keys() {
            let known = self
                .graph
                .slot_index(slot)
                .is_some_and(|index| self.graph.flow_inputs().contains(&index));
            if !known {
                return Err(SubmitError::UnknownInputSlot(slot.clone()));
            }
        }
        for stage in input.overrides.keys() {
            if self.graph.stage_by_name(stage).is_none() {
                UnknownOverride {
                    stage,
                    source_id: input.source_id,
                }
                .log();
            }
        }
        if !blocking && self.frame_callback.get().is_none() {
            return Err(SubmitError::MissingCallback);
        }
        self.gauge.acquire()
    }

    /// The frame is ready for `stage`: every predecessor released it.
    fn offer(&self, stage: usize, frame: &SharedFrame) {
        let runner = &self.runners[stage];
        let (source_id, sequence_id) = {
            let state = lock(frame);
            (state.source_id, state.sequence_id)
        };
        let mut lanes = lock(&runner.lanes);
        let lane = &mut lanes[source_id as usize];
        lane.offer(sequence_id, frame.clone());
        self.drive(runner, source_id, lane);
    }

    /// Admit and release everything the lane allows.
    fn drive(&self, runner: &StageRunner, source_id: SourceId, lane: &mut StageLane) {
        loop {
            let mut progressed = false;

            while let Some((sequence_id, frame)) = lane.next_admission() {
                progressed = true;
                if let Admission::Resolved(completion) =
                    self.admit(runner, source_id, sequence_id, frame)
                {
                    lane.exit();
                    lane.complete(sequence_id, completion);
                }
            }

            if let Some(overflow) = lane.check_overflow() {
                ReorderOverflow {
                    stage: &runner.name,
                    source_id,
                    capacity: lane.capacity().unwrap_or(overflow.flushed),
                    missing_from: overflow.missing_from,
                    flushed: overflow.flushed,
                }
                .log();
            }

            while let Some((sequence_id, completion)) = lane.next_release() {
                progressed = true;
                StageOutputReleased {
                    stage: &runner.name,
                    source_id,
                    sequence_id,
                    held: lane.held(),
                }
                .log();
                self.release(runner, source_id, sequence_id, completion);
            }

            if !progressed {
                break;
            }
        }
    }

    /// Snapshot inputs and parameter, then either queue an invocation or resolve
    /// the stage for this frame without running it.
    fn admit(
        &self,
        runner: &StageRunner,
        source_id: SourceId,
        sequence_id: SequenceId,
        frame: SharedFrame,
    ) -> Admission {
        let node = self.graph.stage(runner.index);
        let (inputs, stage_override) = {
            let mut state = lock(&frame);
            let inputs = state.take_inputs(&self.graph, node, self.options.release_intermediate);
            (inputs, state.input().overrides.get(&node.name).cloned())
        };
        StageAdmitted {
            stage: &runner.name,
            source_id,
            sequence_id,
        }
        .log();

        let placeholder_len = inputs.first().map_or(0, ItemVector::len);
        let output_names: Vec<&str> = node
            .output_slots
            .iter()
            .map(|&slot| self.graph.slot_name(slot))
            .collect();

        let parameter = match stage_override {
            Some(StageOverride::Disable(mode)) => {
                StageSkipped {
                    stage: &runner.name,
                    source_id,
                    sequence_id,
                    reason: "disabled for this frame",
                }
                .log();
                return Admission::Resolved(Completion {
                    frame,
                    outputs: disabled_outputs(mode, inputs, &output_names),
                    failure: None,
                });
            }
            Some(StageOverride::Parameter(parameter)) => Arc::new(parameter),
            None => runner.snapshot_parameter(),
        };

        if runner.skip_on_failed_input {
            if let Some(upstream) = inputs.iter().find(|v| v.is_failed()).and_then(|v| v.error()) {
                StageSkipped {
                    stage: &runner.name,
                    source_id,
                    sequence_id,
                    reason: "an input failed upstream",
                }
                .log();
                let upstream = upstream.clone();
                return Admission::Resolved(Completion {
                    frame,
                    outputs: placeholders(&output_names, placeholder_len, Some(&upstream)),
                    failure: None,
                });
            }
        }

        let invocation = Invocation {
            frame,
            input: StageInput {
                source_id,
                sequence_id,
                inputs,
                parameter,
            },
        };
        match runner.dispatch(invocation) {
            Ok(()) => Admission::Dispatched,
            Err(invocation) => {
                let failure = StageFailure::internal("engine is shutting down");
                Admission::Resolved(Completion {
                    frame: invocation.frame,
                    outputs: placeholders(&output_names, placeholder_len, Some(&failure)),
                    failure: Some(failure),
                })
            }
        }
    }

    /// Record an invocation's result. `exited` is false when the deadline passed
    /// and the invocation is still running.
    fn complete(
        &self,
        stage: usize,
        frame: SharedFrame,
        input: (SourceId, SequenceId, usize),
        result: StageResult,
        exited: bool,
    ) {
        let runner = &self.runners[stage];
        let node = self.graph.stage(stage);
        let (source_id, sequence_id, placeholder_len) = input;
        let output_names: Vec<&str> = node
            .output_slots
            .iter()
            .map(|&slot| self.graph.slot_name(slot))
            .collect();

        let result = result.and_then(|outputs| {
            if outputs.len() == output_names.len() {
                Ok(outputs)
            } else {
                Err(StageFailure::internal(format!(
                    "returned {} output vectors, expected {}",
                    outputs.len(),
                    output_names.len()
                )))
            }
        });

        let completion = match result {
            Ok(outputs) => Completion {
                frame,
                outputs,
                failure: None,
            },
            Err(failure) => {
                let recorded = failure.kind.is_failure();
                if recorded {
                    StageInvocationFailed {
                        stage: &runner.name,
                        source_id,
                        sequence_id,
                        failure: &failure,
                    }
                    .log();
                }
                Completion {
                    frame,
                    outputs: placeholders(&output_names, placeholder_len, Some(&failure)),
                    failure: recorded.then_some(failure),
                }
            }
        };

        let mut lanes = lock(&runner.lanes);
        let lane = &mut lanes[source_id as usize];
        if exited {
            lane.exit();
        }
        lane.complete(sequence_id, completion);
        self.drive(runner, source_id, lane);
    }

    /// A timed-out invocation finally returned; its execution slot is free.
    fn exit(&self, stage: usize, source_id: SourceId) {
        let runner = &self.runners[stage];
        let mut lanes = lock(&runner.lanes);
        let lane = &mut lanes[source_id as usize];
        lane.exit();
        self.drive(runner, source_id, lane);
    }

    /// Make a stage's outputs visible: merge them into the frame, notify the
    /// stage callback, offer ready successors and finish the frame when it was
    /// the last stage.
    fn release(
        &self,
        runner: &StageRunner,
        source_id: SourceId,
        sequence_id: SequenceId,
        completion: Completion,
    ) {
        let node = self.graph.stage(runner.index);
        let Completion {
            frame,
            outputs,
            failure,
        } = completion;

        let stage_callback = lock_read(&self.stage_callbacks).contains_key(&runner.index);
        let release_copy = stage_callback.then(|| StageRelease {
            stage: runner.name.clone(),
            source_id,
            sequence_id,
            outputs: node
                .output_slots
                .iter()
                .map(|&slot| self.graph.slot_name(slot).to_string())
                .zip(outputs.iter().cloned())
                .collect(),
            failure: failure.clone(),
        });

        let (applied, is_async) = {
            let mut state = lock(&frame);
            let applied = state.apply(
                &self.graph,
                node,
                outputs,
                failure,
                self.options.release_intermediate,
            );
            (applied, state.is_async())
        };

        if let (Some(release), true) = (release_copy, is_async) {
            let _ = self.deliver(Delivered::Stage(runner.index, release));
        }

        for &successor in &applied.ready {
            self.offer(successor, &frame);
        }

        if applied.complete {
            self.finish(&frame);
        }
    }

    fn finish(&self, frame: &SharedFrame) {
        let (finished, permit) = {
            let mut state = lock(frame);
            (state.finish(&self.graph), state.take_permit())
        };
        let Some((output, delivery, duration)) = finished else {
            return;
        };
        FrameCompleted {
            source_id: output.source_id,
            sequence_id: output.sequence_id,
            status: output.status,
            error_code: output.error_code,
            duration,
        }
        .log();

        match delivery {
            Delivery::Blocking(sender) => {
                drop(permit);
                let _ = sender.send(output);
            }
            Delivery::Callback => {
                let _ = self.deliver(Delivered::Frame(output, permit));
            }
        }
    }

    /// Dispatch loop of one stage.
    pub async fn run_stage(
        self: Arc<Self>,
        stage: usize,
        mut queue: mpsc::UnboundedReceiver<Invocation>,
        cancel: CancellationToken,
    ) {
        let thread_safe = self.runners[stage].descriptor.thread_safe;
        loop {
            let invocation = tokio::select! {
                _ = cancel.cancelled() => break,
                next = queue.recv() => match next {
                    Some(invocation) => invocation,
                    None => break,
                },
            };
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            if thread_safe {
                let scheduler = self.clone();
                tokio::spawn(async move { scheduler.invoke(stage, invocation, permit).await });
            } else {
                self.invoke(stage, invocation, permit).await;
            }
        }
    }

    async fn invoke(&self, stage: usize, invocation: Invocation, permit: OwnedSemaphorePermit) {
        let runner = &self.runners[stage];
        let Invocation { frame, input } = invocation;
        let source_id = input.source_id;
        let sequence_id = input.sequence_id;
        let placeholder_len = input.inputs.first().map_or(0, ItemVector::len);
        let instance = runner.instance_for(source_id);

        let start_msg = StageInvocationStarted {
            stage: &runner.name,
            source_id,
            sequence_id,
            input_count: input.inputs.len(),
        };
        start_msg.log();
        let span = start_msg.span("stage_invocation");

        let started = Instant::now();
        let mut handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _entered = span.enter();
            instance.process(std::slice::from_ref(&input))
        });

        let joined = match runner.timeout {
            None => Ok((&mut handle).await),
            Some(limit) => tokio::time::timeout(limit, &mut handle).await.map_err(|_| limit),
        };

        match joined {
            Ok(joined) => {
                let result = single_result(joined);
                let elapsed = started.elapsed();
                self.profiler.record(stage, elapsed, result.is_err());
                StageInvocationCompleted {
                    stage: &runner.name,
                    source_id,
                    sequence_id,
                    duration: elapsed,
                }
                .log();
                self.complete(stage, frame, (source_id, sequence_id, placeholder_len), result, true);
            }
            Err(limit) => {
                StageTimedOut {
                    stage: &runner.name,
                    source_id,
                    sequence_id,
                    timeout: limit,
                }
                .log();
                self.profiler.record(stage, limit, true);
                self.complete(
                    stage,
                    frame,
                    (source_id, sequence_id, placeholder_len),
                    Err(StageFailure::timeout(&runner.name, limit)),
                    false,
                );
                let _ = handle.await;
                self.exit(stage, source_id);
            }
        }
    }

    /// Finalize every stage instance. Returns how many were finalized.
    pub fn finalize_all(&self) -> usize {
        self.runners.iter().map(StageRunner::finalize).sum()
    }
}

/// Delivery thread body: runs callbacks in the order frames and stage releases
/// were produced.
pub(crate) fn run_deliveries(scheduler: Arc<Scheduler>, mut queue: mpsc::UnboundedReceiver<Delivered>) {
    while let Some(delivered) = queue.blocking_recv() {
        match delivered {
            Delivered::Frame(output, permit) => {
                drop(permit);
                if let Some(callback) = scheduler.frame_callback.get() {
                    let (source_id, sequence_id) = (output.source_id, output.sequence_id);
                    if catch_unwind(AssertUnwindSafe(|| callback(output))).is_err() {
                        CallbackPanicked {
                            callback: "frame",
                            source_id,
                            sequence_id,
                        }
                        .log();
                    }
                }
            }
            Delivered::Stage(stage, release) => {
                let callback = lock_read(&scheduler.stage_callbacks).get(&stage).cloned();
                if let Some(callback) = callback {
                    let (source_id, sequence_id) = (release.source_id, release.sequence_id);
                    if catch_unwind(AssertUnwindSafe(|| callback(release))).is_err() {
                        CallbackPanicked {
                            callback: "stage",
                            source_id,
                            sequence_id,
                        }
                        .log();
                    }
                }
            }
        }
    }
}

fn lock_read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn single_result(joined: Result<Vec<StageResult>, JoinError>) -> StageResult {
    match joined {
        Ok(results) if results.len() == 1 => results
            .into_iter()
            .next()
            .unwrap_or_else(|| Err(StageFailure::internal("stage returned no result"))),
        Ok(results) => Err(StageFailure::internal(format!(
            "stage returned {} results for a single frame",
            results.len()
        ))),
        Err(error) if error.is_panic() => Err(StageFailure::internal("stage panicked")),
        Err(error) => Err(StageFailure::internal(format!("stage invocation aborted: {}", error))),
    }
}

/// INVALID vectors standing in for outputs that were not computed.
///
/// The stage never produced a payload, so each item's type tag is the name of
/// the output slot it fills.
fn placeholders(names: &[&str], len: usize, error: Option<&StageFailure>) -> Vec<ItemVector> {
    names
        .iter()
        .map(|name| ItemVector::placeholder(name, len, error.cloned()))
        .collect()
}

fn disabled_outputs(mode: DisableMode, inputs: Vec<ItemVector>, names: &[&str]) -> Vec<ItemVector> {
    let len = inputs.first().map_or(0, ItemVector::len);
    match mode {
        DisableMode::PassThrough if inputs.len() == names.len() => inputs,
        DisableMode::BestEffortPassThrough => names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                inputs
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| ItemVector::placeholder(name, len, None))
            })
            .collect(),
        DisableMode::Predefined(vectors) if vectors.len() == names.len() => vectors,
        _ => placeholders(names, len, None),
    }
}
