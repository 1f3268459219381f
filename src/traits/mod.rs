// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod source;
pub mod stage;

pub use source::FrameSource;
pub use stage::{Stage, StageDescriptor, StageInit, StageInput, StageResult};
