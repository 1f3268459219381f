// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The contract every processing stage implements.
//!
//! A stage is a detector, tracker, scorer or filter. The engine knows nothing
//! about what it computes; it only calls the methods below and schedules
//! invocations according to the stage's [`StageDescriptor`].
//!
//! # Example
//!
//! ```rust
//! use frameflow::data::{Item, ItemVector, Parameter};
//! use frameflow::traits::{Stage, StageDescriptor, StageInput, StageResult};
//!
//! /// Scores every valid box with a constant.
//! struct ConstantScorer;
//!
//! impl Stage for ConstantScorer {
//!     fn process(&self, batch: &[StageInput]) -> Vec<StageResult> {
//!         batch
//!             .iter()
//!             .map(|frame| {
//!                 let scores = frame.inputs[0].map_valid("score", |_, _| Item::valid("score", 1.0_f32));
//!                 Ok(vec![scores])
//!             })
//!             .collect()
//!     }
//!
//!     fn version(&self) -> String {
//!         "constant_scorer-1.0".to_string()
//!     }
//!
//!     fn descriptor(&self) -> StageDescriptor {
//!         StageDescriptor { thread_safe: true, ..Default::default() }
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::{ItemVector, Parameter, SequenceId, SourceId};
use crate::errors::{ParamError, StageFailure};

/// Scheduling capabilities a stage declares once. They never change during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageDescriptor {
    /// Any number of frames may run through the stage concurrently.
    pub thread_safe: bool,
    /// Outputs must become visible in sequence-id order.
    pub needs_reorder: bool,
    /// Frames of one source must arrive in submission order, one at a time,
    /// on a dedicated instance.
    pub source_context_dependent: bool,
}

/// Everything a stage receives at initialization.
#[derive(Debug, Clone)]
pub struct StageInit {
    /// Unique name of the stage within the workflow.
    pub name: String,
    /// Instance owner when the stage is source context dependent.
    pub source_id: Option<SourceId>,
    /// Free-form options from the workflow file.
    pub options: HashMap<String, serde_json::Value>,
}

/// One frame's inputs for one invocation.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    /// One vector per declared input slot, in declaration order.
    pub inputs: Vec<ItemVector>,
    /// Parameter snapshot taken when the frame was admitted.
    pub parameter: Arc<Parameter>,
}

/// One vector per declared output slot, or a failure for the whole frame.
pub type StageResult = Result<Vec<ItemVector>, StageFailure>;

/// A pluggable processing unit of the workflow graph.
///
/// `process` receives a batch of frames and must return exactly one result per
/// frame, in the same order. A stage may be stateful (a tracker keeps history);
/// when it is, it declares `source_context_dependent` and the engine
/// guarantees per-source submission order and a dedicated instance per source.
///
/// Failures for individual positions are reported with INVALID items so the
/// returned vectors keep the length downstream stages expect.
pub trait Stage: Send + Sync {
    /// One-time setup before the first invocation.
    fn initialize(&mut self, _init: &StageInit) -> Result<(), StageFailure> {
        Ok(())
    }

    fn process(&self, batch: &[StageInput]) -> Vec<StageResult>;

    /// Validate (and optionally absorb) a new parameter. An error leaves the
    /// previous parameter in effect.
    fn update_parameter(&self, _value: &Parameter) -> Result<(), ParamError> {
        Ok(())
    }

    /// The parameter the stage starts with.
    fn parameter(&self) -> Parameter {
        Parameter::null()
    }

    fn version(&self) -> String;

    fn finalize(&self) {}

    /// Queried once, before `initialize`. Must not change afterwards.
    fn descriptor(&self) -> StageDescriptor;

    fn on_profiling_changed(&self, _enabled: bool) {}
}
