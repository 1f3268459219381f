// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod graph;
mod param;
mod stage;
mod submit;

pub use config::ConfigError;
pub use graph::GraphError;
pub use param::ParamError;
pub use stage::{ErrorKind, StageFailure};
pub use submit::SubmitError;
