// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use crate::data::param::Parameter;
use crate::data::vector::ItemVector;
use crate::errors::StageFailure;

/// Logical origin of frames (one camera, one stream).
pub type SourceId = u32;

/// Per-source submission counter. Starts at 0 and increases by one per frame.
pub type SequenceId = u64;

/// How a disabled stage fills its outputs for one frame.
#[derive(Debug, Clone)]
pub enum DisableMode {
    /// Copy input `i` to output `i`. Needs equal arity, otherwise behaves like `Invalid`.
    PassThrough,
    /// Copy inputs by position; outputs without a matching input are INVALID.
    BestEffortPassThrough,
    /// Use caller-supplied vectors. Needs one per output, otherwise behaves like `Invalid`.
    Predefined(Vec<ItemVector>),
    /// Every output is an empty vector of INVALID state.
    Invalid,
}

/// Per-frame instruction for one stage.
#[derive(Debug, Clone)]
pub enum StageOverride {
    /// Use this parameter instead of the stage's stored one, for this frame only.
    Parameter(Parameter),
    /// Do not invoke the stage for this frame.
    Disable(DisableMode),
}

/// One frame's worth of input for one source.
///
/// ```
/// use frameflow::data::{InputFrame, Item, ItemVector, StageOverride, DisableMode};
///
/// let frame = InputFrame::new(0)
///     .with_slot("boxes", ItemVector::from_items(vec![Item::valid("box", [0u32, 0, 10, 10])]))
///     .with_override("tracker", StageOverride::Disable(DisableMode::PassThrough));
///
/// assert_eq!(frame.slots.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InputFrame {
    pub source_id: SourceId,
    pub slots: HashMap<String, ItemVector>,
    pub overrides: HashMap<String, StageOverride>,
}

impl InputFrame {
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            ..Default::default()
        }
    }

    pub fn with_slot(mut self, name: impl Into<String>, vector: ItemVector) -> Self {
        self.slots.insert(name.into(), vector);
        self
    }

    pub fn with_override(mut self, stage: impl Into<String>, stage_override: StageOverride) -> Self {
        self.overrides.insert(stage.into(), stage_override);
        self
    }
}

/// Frame lifecycle: `Submitted -> Running -> {Complete | Failed} -> Delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStatus {
    Submitted,
    Running,
    Complete,
    Failed,
    Delivered,
}

impl FrameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FrameStatus::Complete | FrameStatus::Failed)
    }
}

/// Merged result of one frame.
///
/// `error_code` is the sum of the codes of every failure recorded on the frame
/// and `error_detail` joins their messages. Partial results of stages that
/// succeeded stay in `outputs`.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    pub global_sequence_id: u64,
    pub status: FrameStatus,
    pub outputs: Vec<(String, ItemVector)>,
    pub error_code: i32,
    pub error_detail: String,
    pub failures: Vec<(String, StageFailure)>,
    /// The caller's original input, shared and never modified.
    pub input: Arc<InputFrame>,
}

impl FrameOutput {
    pub fn output(&self, slot: &str) -> Option<&ItemVector> {
        self.outputs
            .iter()
            .find(|(name, _)| name == slot)
            .map(|(_, v)| v)
    }

    pub fn is_failed(&self) -> bool {
        self.status == FrameStatus::Failed
    }
}

/// Outputs of a single stage for a single frame, as released to successors.
#[derive(Debug, Clone)]
pub struct StageRelease {
    pub stage: String,
    pub source_id: SourceId,
    pub sequence_id: SequenceId,
    pub outputs: Vec<(String, ItemVector)>,
    pub failure: Option<StageFailure>,
}
