// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::config::{StageConfig, StageRegistry, WorkflowConfig, WorkflowGraph};
use crate::engine::predict::Engine;
use crate::engine::scheduler::{run_deliveries, Scheduler, SchedulerOptions};
use crate::engine::stage_runner::StageRunner;
use crate::errors::GraphError;
use crate::observability::messages::{
    engine::EngineStarted,
    graph::{GraphBuilt, GraphRejected},
    StructuredLog,
};
use crate::traits::Stage;

/// Builds an [`Engine`] from a workflow description.
///
/// ```
/// use frameflow::config::{StageConfig, WorkflowConfig};
/// use frameflow::engine::Engine;
///
/// let config = WorkflowConfig {
///     inputs: vec!["boxes".into()],
///     outputs: vec!["kept".into()],
///     stages: vec![StageConfig::new("filter", "box_filter").inputs(["boxes"]).outputs(["kept"])],
///     ..Default::default()
/// };
///
/// let engine = Engine::builder(config).build().unwrap();
/// assert_eq!(engine.version("filter").as_deref().map(|v| v.starts_with("box_filter")), Some(true));
/// ```
pub struct EngineBuilder {
    config: WorkflowConfig,
    registry: StageRegistry,
}

impl EngineBuilder {
    /// A builder that knows the built-in stage kinds.
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            registry: StageRegistry::with_builtins(),
        }
    }

    /// Use `registry` instead of the built-in one.
    pub fn registry(mut self, registry: StageRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Add a stage kind on top of the current registry.
    pub fn register<F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&StageConfig) -> Result<Box<dyn Stage>, String> + Send + Sync + 'static,
    {
        self.registry.register(kind, factory);
        self
    }

    /// Validate the workflow, initialize every stage and start the runtime.
    ///
    /// Stages initialized before a failure are finalized again.
    pub fn build(self) -> Result<Engine, GraphError> {
        let Self { config, registry } = self;

        let graph = match WorkflowGraph::build(&config) {
            Ok(graph) => graph,
            Err(error) => {
                GraphRejected {
                    workflow: &config.name,
                    error: &error,
                }
                .log();
                return Err(error);
            }
        };
        GraphBuilt {
            workflow: graph.name(),
            stage_count: graph.stages().len(),
            slot_count: graph.slot_names().len(),
            entry_stages: graph.entry_stages().count(),
            terminal_stages: graph.terminal_stages().count(),
        }
        .log();

        let source_number = config.source_number.max(1);
        let options = &config.engine;

        let mut runners = Vec::with_capacity(graph.stages().len());
        let mut queues = Vec::with_capacity(graph.stages().len());
        for (node, stage_config) in graph.stages().iter().zip(&config.stages) {
            match StageRunner::create(
                node,
                stage_config,
                &registry,
                source_number,
                options.reorder_capacity,
            ) {
                Ok((runner, queue)) => {
                    runners.push(runner);
                    queues.push(queue);
                }
                Err(error) => {
                    for runner in &runners {
                        runner.finalize();
                    }
                    GraphRejected {
                        workflow: graph.name(),
                        error: &error,
                    }
                    .log();
                    return Err(error);
                }
            }
        }

        let max_concurrency = options.effective_concurrency();
        let (scheduler, delivery_queue) = Scheduler::new(
            Arc::new(graph),
            runners,
            SchedulerOptions {
                source_number,
                max_concurrency,
                max_inflight_frames: options.max_inflight_frames,
                release_intermediate: options.release_intermediate,
            },
        );
        let scheduler = Arc::new(scheduler);

        // Created last. Dropping a runtime inside an async context panics, so
        // every later failure shuts it down in the background.
        let mut runtime = tokio::runtime::Builder::new_multi_thread();
        runtime.enable_all().thread_name("frameflow-worker");
        if let Some(threads) = options.worker_threads {
            runtime.worker_threads(threads.max(1));
        }
        let runtime = match runtime.build() {
            Ok(runtime) => runtime,
            Err(e) => {
                scheduler.finalize_all();
                return Err(GraphError::RuntimeUnavailable {
                    reason: e.to_string(),
                });
            }
        };

        let delivery_thread = {
            let scheduler = scheduler.clone();
            std::thread::Builder::new()
                .name("frameflow-delivery".into())
                .spawn(move || run_deliveries(scheduler, delivery_queue))
        };
        let delivery_thread = match delivery_thread {
            Ok(handle) => handle,
            Err(e) => {
                scheduler.finalize_all();
                runtime.shutdown_background();
                return Err(GraphError::RuntimeUnavailable {
                    reason: e.to_string(),
                });
            }
        };

        let cancel = CancellationToken::new();
        for (stage, queue) in queues.into_iter().enumerate() {
            runtime.spawn(scheduler.clone().run_stage(stage, queue, cancel.clone()));
        }

        EngineStarted {
            workflow: scheduler.graph.name(),
            stage_count: scheduler.runners.len(),
            source_number,
            max_concurrency,
            max_inflight_frames: scheduler.max_inflight_frames(),
        }
        .log();

        Ok(Engine {
            scheduler,
            runtime: Mutex::new(Some(runtime)),
            delivery_thread: Mutex::new(Some(delivery_thread)),
            cancel,
        })
    }
}
