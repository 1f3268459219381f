// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Data carried through a workflow.
//!
//! * [`Item`] - the atomic unit (one box, one score) with a state tag
//! * [`ItemVector`] - an ordered, index-aligned collection of items
//! * [`Parameter`] - an opaque, serializable per-stage configuration value
//! * [`InputFrame`] / [`FrameOutput`] - what callers submit and receive

mod frame;
mod item;
mod param;
mod vector;

pub use frame::{
    DisableMode, FrameOutput, FrameStatus, InputFrame, SequenceId, SourceId, StageOverride,
    StageRelease,
};
pub use item::{Item, ItemRef, ItemState, Payload};
pub use param::Parameter;
pub use vector::ItemVector;
