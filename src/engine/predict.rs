// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::{consts::BACKPRESSURE_RETRY_MS, WorkflowConfig, WorkflowGraph};
use crate::data::{FrameOutput, InputFrame, Parameter, SequenceId, StageRelease};
use crate::engine::builder::EngineBuilder;
use crate::engine::frame_state::Delivery;
use crate::engine::lock;
use crate::engine::profiler::StageStats;
use crate::engine::scheduler::Scheduler;
use crate::errors::{ParamError, SubmitError};
use crate::observability::messages::{
    engine::{EngineStopped, ProfilingToggled},
    StructuredLog,
};
use crate::traits::{FrameSource, StageDescriptor};

/// Receives every frame submitted with [`Engine::async_predict`].
pub type FrameCallback = Arc<dyn Fn(FrameOutput) + Send + Sync>;

/// Receives one stage's released outputs for asynchronously submitted frames.
pub type StageCallback = Arc<dyn Fn(StageRelease) + Send + Sync>;

/// A running workflow.
///
/// Dropping the engine shuts it down: accepted frames are delivered first.
pub struct Engine {
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) runtime: Mutex<Option<Runtime>>,
    pub(crate) delivery_thread: Mutex<Option<JoinHandle<()>>>,
    pub(crate) cancel: CancellationToken,
}

impl Engine {
    pub fn builder(config: WorkflowConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Run one frame through the workflow and wait for its outputs.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context, since
    /// it blocks the calling thread. Use [`Engine::async_predict`] there.
    pub fn sync_predict(&self, frame: impl Into<Arc<InputFrame>>) -> Result<FrameOutput, SubmitError> {
        let (sender, receiver) = oneshot::channel();
        let (_, sequence_id) = self
            .scheduler
            .submit(frame.into(), Delivery::Blocking(sender))?;
        receiver
            .blocking_recv()
            .map_err(|_| SubmitError::Disconnected(sequence_id))
    }

    /// Submit a frame without waiting. Its outputs go to the frame callback.
    ///
    /// Returns the frame's sequence id within its source.
    pub fn async_predict(&self, frame: impl Into<Arc<InputFrame>>) -> Result<SequenceId, SubmitError> {
        self.scheduler
            .submit(frame.into(), Delivery::Callback)
            .map(|(_, sequence_id)| sequence_id)
    }

    /// Register the frame callback. Only the first registration takes effect;
    /// returns whether this one did.
    ///
    /// Callbacks run on a single delivery thread, one at a time, in the order
    /// frames finished. They must not call [`Engine::shutdown`].
    pub fn set_callback<F>(&self, callback: F) -> bool
    where
        F: Fn(FrameOutput) + Send + Sync + 'static,
    {
        self.scheduler.frame_callback.set(Arc::new(callback)).is_ok()
    }

    /// Register (or replace) the callback for one stage's released outputs.
    pub fn set_stage_callback<F>(&self, stage: &str, callback: F) -> Result<(), ParamError>
    where
        F: Fn(StageRelease) + Send + Sync + 'static,
    {
        let node = self
            .scheduler
            .graph
            .stage_by_name(stage)
            .ok_or_else(|| ParamError::UnknownStage(stage.to_string()))?;
        self.scheduler
            .stage_callbacks
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(node.index, Arc::new(callback));
        Ok(())
    }

    /// Replace a stage's parameter. Frames admitted afterwards see the new value;
    /// frames already admitted keep the one they were admitted with.
    pub fn update_parameter(&self, stage: &str, parameter: Parameter) -> Result<(), ParamError> {
        self.scheduler
            .runner(stage)
            .ok_or_else(|| ParamError::UnknownStage(stage.to_string()))?
            .update_parameter(parameter)
    }

    pub fn parameter(&self, stage: &str) -> Option<Parameter> {
        self.scheduler
            .runner(stage)
            .map(|runner| runner.snapshot_parameter().as_ref().clone())
    }

    pub fn version(&self, stage: &str) -> Option<String> {
        self.scheduler
            .runner(stage)
            .map(|runner| runner.instance_for(0).version())
    }

    pub fn descriptor(&self, stage: &str) -> Option<StageDescriptor> {
        self.scheduler.runner(stage).map(|runner| runner.descriptor)
    }

    /// Turn per-stage statistics on or off and tell every stage instance.
    pub fn set_profiling(&self, enabled: bool) {
        self.scheduler.profiler.set_enabled(enabled);
        let mut notified = 0;
        for runner in &self.scheduler.runners {
            for instance in runner.instances() {
                instance.on_profiling_changed(enabled);
                notified += 1;
            }
        }
        ProfilingToggled {
            enabled,
            instances_notified: notified,
        }
        .log();
    }

    pub fn is_profiling(&self) -> bool {
        self.scheduler.profiler.is_enabled()
    }

    /// Statistics collected while profiling was on, keyed by stage name.
    pub fn stage_stats(&self) -> HashMap<String, StageStats> {
        self.scheduler
            .runners
            .iter()
            .map(|runner| {
                (
                    runner.name.clone(),
                    self.scheduler.profiler.snapshot(runner.index),
                )
            })
            .collect()
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.scheduler.graph
    }

    pub fn source_number(&self) -> u32 {
        self.scheduler.source_number()
    }

    /// Frames accepted and not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.scheduler.gauge.in_flight()
    }

    /// Feed every frame of `source` through [`Engine::async_predict`] until the
    /// source is exhausted. Waits and retries while the in-flight limit is hit.
    ///
    /// Returns the number of frames submitted.
    pub async fn pump<S: FrameSource>(&self, mut source: S) -> Result<u64, SubmitError> {
        let mut submitted = 0;
        while let Some(frame) = source.next_frame().await {
            let frame = Arc::new(frame);
            loop {
                match self.async_predict(frame.clone()) {
                    Ok(_) => break,
                    Err(SubmitError::Backpressure { .. }) => {
                        tokio::time::sleep(Duration::from_millis(BACKPRESSURE_RETRY_MS)).await;
                    }
                    Err(error) => return Err(error),
                }
            }
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Stop accepting frames, deliver the accepted ones, then finalize every
    /// stage instance. Later calls do nothing.
    pub fn shutdown(&self) {
        let Some(runtime) = lock(&self.runtime).take() else {
            return;
        };
        let (scheduler, cancel) = (&self.scheduler, &self.cancel);
        block_on(&runtime, async {
            scheduler.gauge.close_and_wait().await;
            cancel.cancel();
            scheduler.wait_idle().await;
        });
        self.scheduler.close_deliveries();
        if let Some(handle) = lock(&self.delivery_thread).take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
        let finalized = self.scheduler.finalize_all();
        EngineStopped {
            workflow: self.scheduler.graph.name(),
            frames_submitted: self.scheduler.gauge.submitted(),
            instances_finalized: finalized,
        }
        .log();
        runtime.shutdown_background();
    }
}

/// Drive `future` on the engine runtime. A caller already inside an async
/// context waits on a scoped thread instead.
fn block_on<F>(runtime: &Runtime, future: F) -> F::Output
where
    F: Future + Send,
    F::Output: Send,
{
    if Handle::try_current().is_err() {
        return runtime.block_on(future);
    }
    std::thread::scope(|scope| match scope.spawn(|| runtime.block_on(future)).join() {
        Ok(output) => output,
        Err(panic) => std::panic::resume_unwind(panic),
    })
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("workflow", &self.scheduler.graph.name())
            .field("stages", &self.scheduler.runners.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
