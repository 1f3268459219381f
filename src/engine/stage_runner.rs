// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::{StageConfig, StageNode, StageRegistry};
use crate::data::{ItemVector, Parameter, SourceId};
use crate::engine::frame_state::SharedFrame;
use crate::engine::lane::{Lane, LanePolicy};
use crate::engine::lock;
use crate::errors::{GraphError, ParamError, StageFailure};
use crate::observability::messages::{
    engine::{ParameterRejected, ParameterUpdated},
    graph::StageInitialized,
    stage::StageFinalized,
    StructuredLog,
};
use crate::traits::{Stage, StageDescriptor, StageInit, StageInput};

/// Outputs waiting in a lane for release.
pub(crate) struct Completion {
    pub frame: SharedFrame,
    pub outputs: Vec<ItemVector>,
    /// This stage's own failure, recorded on the frame at release
    pub failure: Option<StageFailure>,
}

pub(crate) type StageLane = Lane<SharedFrame, Completion>;

/// An admitted frame on its way to a worker.
pub(crate) struct Invocation {
    pub frame: SharedFrame,
    pub input: StageInput,
}

/// Runtime side of one workflow stage: its instances, current parameter,
/// per-source lanes and dispatch queue.
pub(crate) struct StageRunner {
    pub index: usize,
    pub name: String,
    pub descriptor: StageDescriptor,
    pub timeout: Option<Duration>,
    pub skip_on_failed_input: bool,
    /// One mutex for every source lane of this stage
    pub lanes: Mutex<Vec<StageLane>>,
    instances: Vec<Arc<dyn Stage>>,
    parameter: Mutex<Arc<Parameter>>,
    dispatch: mpsc::UnboundedSender<Invocation>,
}

impl StageRunner {
    /// Create and initialize the stage's instances.
    ///
    /// Source context dependent stages get one instance per source; every other
    /// stage shares a single instance.
    pub fn create(
        node: &StageNode,
        config: &StageConfig,
        registry: &StageRegistry,
        source_number: u32,
        reorder_capacity: Option<usize>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Invocation>), GraphError> {
        let build = || -> Result<Box<dyn Stage>, GraphError> {
            registry
                .create(config)
                .ok_or_else(|| GraphError::UnknownStageKind {
                    stage: node.name.clone(),
                    kind: node.kind.clone(),
                })?
                .map_err(|reason| GraphError::StageInitFailed {
                    stage: node.name.clone(),
                    reason,
                })
        };

        let first = build()?;
        let descriptor = first.descriptor();
        let per_source = descriptor.source_context_dependent;

        let mut uninitialized = vec![first];
        if per_source {
            for _ in 1..source_number {
                let instance = build()?;
                if instance.descriptor() != descriptor {
                    return Err(GraphError::InconsistentDescriptor {
                        stage: node.name.clone(),
                    });
                }
                uninitialized.push(instance);
            }
        }

        let mut instances: Vec<Arc<dyn Stage>> = Vec::with_capacity(uninitialized.len());
        for (source, mut instance) in uninitialized.into_iter().enumerate() {
            let init = StageInit {
                name: node.name.clone(),
                source_id: per_source.then_some(source as SourceId),
                options: config.options.clone(),
            };
            if let Err(failure) = instance.initialize(&init) {
                for ready in &instances {
                    ready.finalize();
                }
                return Err(GraphError::StageInitFailed {
                    stage: node.name.clone(),
                    reason: failure.message,
                });
            }
            instances.push(Arc::from(instance));
        }

        let parameter = match &config.parameter {
            Some(value) => {
                let parameter = Parameter::new(value.clone());
                if let Some(error) = instances
                    .iter()
                    .find_map(|i| i.update_parameter(&parameter).err())
                {
                    for instance in &instances {
                        instance.finalize();
                    }
                    return Err(GraphError::StageInitFailed {
                        stage: node.name.clone(),
                        reason: error.to_string(),
                    });
                }
                parameter
            }
            None => instances[0].parameter(),
        };

        StageInitialized {
            stage: &node.name,
            kind: &node.kind,
            instances: instances.len(),
            descriptor,
        }
        .log();

        let policy = LanePolicy::from_descriptor(&descriptor, reorder_capacity);
        let lanes = (0..source_number).map(|_| Lane::new(policy)).collect();
        let (dispatch, queue) = mpsc::unbounded_channel();

        Ok((
            Self {
                index: node.index,
                name: node.name.clone(),
                descriptor,
                timeout: config.timeout_ms.map(Duration::from_millis),
                skip_on_failed_input: config.skip_on_failed_input,
                lanes: Mutex::new(lanes),
                instances,
                parameter: Mutex::new(Arc::new(parameter)),
                dispatch,
            },
            queue,
        ))
    }

    /// The instance that serves frames of `source_id`.
    pub fn instance_for(&self, source_id: SourceId) -> Arc<dyn Stage> {
        let index = if self.instances.len() > 1 {
            (source_id as usize).min(self.instances.len() - 1)
        } else {
            0
        };
        self.instances[index].clone()
    }

    pub fn instances(&self) -> &[Arc<dyn Stage>] {
        &self.instances
    }

    /// Current parameter, taken at admission. The lock is not held across invocations.
    pub fn snapshot_parameter(&self) -> Arc<Parameter> {
        lock(&self.parameter).clone()
    }

    /// Offer `value` to every instance; swap it in only if all accept.
    ///
    /// Instances that accepted before a later one refused are handed the previous
    /// value again.
    pub fn update_parameter(&self, value: Parameter) -> Result<(), ParamError> {
        let previous = self.snapshot_parameter();
        for (position, instance) in self.instances.iter().enumerate() {
            if let Err(error) = instance.update_parameter(&value) {
                for accepted in &self.instances[..position] {
                    let _ = accepted.update_parameter(&previous);
                }
                ParameterRejected {
                    stage: &self.name,
                    error: &error,
                }
                .log();
                return Err(error);
            }
        }
        *lock(&self.parameter) = Arc::new(value);
        ParameterUpdated {
            stage: &self.name,
            instances: self.instances.len(),
        }
        .log();
        Ok(())
    }

    pub fn dispatch(&self, invocation: Invocation) -> Result<(), Invocation> {
        self.dispatch.send(invocation).map_err(|e| e.0)
    }

    pub fn finalize(&self) -> usize {
        for instance in &self.instances {
            instance.finalize();
        }
        StageFinalized {
            stage: &self.name,
            instances: self.instances.len(),
        }
        .log();
        self.instances.len()
    }
}
