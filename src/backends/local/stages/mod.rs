// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod box_filter;
pub mod passthrough;

pub use box_filter::{BBox, BoxFilterParam, BoxFilterStage};
pub use passthrough::PassthroughStage;
