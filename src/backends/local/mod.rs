// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod factory;
pub mod stages;

pub use factory::LocalStageFactory;
pub use stages::*;
