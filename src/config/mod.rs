// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod dependency_graph;
mod loader;
mod registry;
mod validation;

#[cfg(test)]
mod integration_tests;
pub mod consts;

pub use dependency_graph::{SlotProducer, StageNode, WorkflowGraph};
pub use loader::{
    load_and_validate_config, load_config, parse_config, ConfigFormat, EngineOptions,
    StageConfig, WorkflowConfig,
};
pub use registry::{StageFactory, StageRegistry};
pub use validation::validate_workflow;
