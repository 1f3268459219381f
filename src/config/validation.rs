// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural validation of workflow configurations.
//!
//! A workflow is valid when its stages can be bound into an acyclic graph in which
//! every consumed slot has exactly one producer. Checks run in this order:
//!
//! 1. **Uniqueness**: stage names are unique, and no slot has two producers
//!    (the frame input counts as a producer for every flow input slot)
//! 2. **References**: every stage input and every flow output is produced somewhere
//! 3. **Cycle detection**: DFS over the stage dependency edges, reporting the cycle path
//!
//! Errors from the first two groups are accumulated so a user sees every problem at
//! once. Cycle detection needs a resolvable graph and is skipped when anything
//! earlier failed.
//!
//! # Example
//! ```rust
//! use frameflow::config::{validate_workflow, EngineOptions, StageConfig, WorkflowConfig};
//! use frameflow::errors::GraphError;
//!
//! let config = WorkflowConfig {
//!     name: "demo".into(),
//!     source_number: 1,
//!     inputs: vec!["boxes".into()],
//!     outputs: vec!["scores".into()],
//!     engine: EngineOptions::default(),
//!     stages: vec![StageConfig::new("scorer", "passthrough")
//!         .inputs(["detections"])
//!         .outputs(["scores"])],
//! };
//!
//! let errors = validate_workflow(&config).unwrap_err();
//! assert_eq!(
//!     errors,
//!     vec![GraphError::UnproducedInput {
//!         stage: "scorer".into(),
//!         slot: "detections".into(),
//!     }]
//! );
//! ```

use crate::config::WorkflowConfig;
use crate::errors::GraphError;
use std::collections::{HashMap, HashSet};

/// Producer name recorded for slots fed by the frame input.
pub(crate) const FRAME_INPUT: &str = "<input>";

/// Validates a workflow, returning every error found.
pub fn validate_workflow(config: &WorkflowConfig) -> Result<(), Vec<GraphError>> {
    if config.stages.is_empty() {
        return Err(vec![GraphError::EmptyWorkflow {
            workflow: config.name.clone(),
        }]);
    }

    let mut errors = Vec::new();

    if let Err(duplicates) = validate_unique_names(config) {
        errors.extend(duplicates);
    }

    if let Err(duplicates) = validate_unique_producers(config) {
        errors.extend(duplicates);
    }

    if let Err(unresolved) = validate_slot_references(config) {
        errors.extend(unresolved);
    }

    if errors.is_empty() {
        if let Err(cycle) = validate_acyclic(config) {
            errors.push(cycle);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_unique_names(config: &WorkflowConfig) -> Result<(), Vec<GraphError>> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();

    for stage in &config.stages {
        if !seen.insert(stage.name.as_str()) {
            errors.push(GraphError::DuplicateStage {
                stage: stage.name.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Every slot may be written by exactly one party. Flow inputs are written by the
/// frame itself, so a stage re-declaring one of them is as much a conflict as two
/// stages declaring the same output.
fn validate_unique_producers(config: &WorkflowConfig) -> Result<(), Vec<GraphError>> {
    let mut producers: HashMap<&str, &str> = HashMap::new();
    let mut errors = Vec::new();

    for slot in &config.inputs {
        if let Some(first) = producers.insert(slot.as_str(), FRAME_INPUT) {
            errors.push(GraphError::DuplicateOutput {
                slot: slot.clone(),
                first: first.to_string(),
                second: FRAME_INPUT.to_string(),
            });
        }
    }

    for stage in &config.stages {
        for slot in &stage.outputs {
            match producers.get(slot.as_str()) {
                Some(first) => errors.push(GraphError::DuplicateOutput {
                    slot: slot.clone(),
                    first: first.to_string(),
                    second: stage.name.clone(),
                }),
                None => {
                    producers.insert(slot.as_str(), stage.name.as_str());
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_slot_references(config: &WorkflowConfig) -> Result<(), Vec<GraphError>> {
    let produced: HashSet<&str> = config
        .inputs
        .iter()
        .map(String::as_str)
        .chain(
            config
                .stages
                .iter()
                .flat_map(|s| s.outputs.iter().map(String::as_str)),
        )
        .collect();
    let mut errors = Vec::new();

    for stage in &config.stages {
        for slot in &stage.inputs {
            if !produced.contains(slot.as_str()) {
                errors.push(GraphError::UnproducedInput {
                    stage: stage.name.clone(),
                    slot: slot.clone(),
                });
            }
        }
    }

    for slot in &config.outputs {
        if !produced.contains(slot.as_str()) {
            errors.push(GraphError::UnproducedOutput { slot: slot.clone() });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// DFS with a recursion stack over producer -> consumer edges.
///
/// Stages are visited in declaration order so the reported path is stable. A gray
/// node hit again closes the cycle; the path runs from its first occurrence on the
/// stack to the repeated node, e.g. `a -> b -> a`. A stage consuming its own output
/// yields `a -> a`.
fn validate_acyclic(config: &WorkflowConfig) -> Result<(), GraphError> {
    let producer_of: HashMap<&str, &str> = config
        .stages
        .iter()
        .flat_map(|s| s.outputs.iter().map(move |o| (o.as_str(), s.name.as_str())))
        .collect();

    let mut successors: HashMap<&str, Vec<&str>> = config
        .stages
        .iter()
        .map(|s| (s.name.as_str(), Vec::new()))
        .collect();

    for stage in &config.stages {
        for slot in &stage.inputs {
            if let Some(producer) = producer_of.get(slot.as_str()) {
                if let Some(edges) = successors.get_mut(producer) {
                    if !edges.contains(&stage.name.as_str()) {
                        edges.push(stage.name.as_str());
                    }
                }
            }
        }
    }

    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();
    let mut path = Vec::new();

    for stage in &config.stages {
        if visited.contains(stage.name.as_str()) {
            continue;
        }
        if let Some(cycle) = dfs_cycle(
            stage.name.as_str(),
            &successors,
            &mut visited,
            &mut on_stack,
            &mut path,
        ) {
            return Err(GraphError::Cycle { path: cycle });
        }
    }

    Ok(())
}

fn dfs_cycle<'a>(
    node: &'a str,
    successors: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    on_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    on_stack.insert(node);
    path.push(node);

    if let Some(next) = successors.get(node) {
        for &succ in next {
            if on_stack.contains(succ) {
                let start = path.iter().position(|&n| n == succ).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(succ.to_string());
                return Some(cycle);
            }
            if !visited.contains(succ) {
                if let Some(cycle) = dfs_cycle(succ, successors, visited, on_stack, path) {
                    return Some(cycle);
                }
            }
        }
    }

    on_stack.remove(node);
    path.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineOptions, StageConfig};

    fn workflow(inputs: &[&str], outputs: &[&str], stages: Vec<StageConfig>) -> WorkflowConfig {
        WorkflowConfig {
            name: "test".into(),
            source_number: 1,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            engine: EngineOptions::default(),
            stages,
        }
    }

    fn stage(name: &str, inputs: &[&str], outputs: &[&str]) -> StageConfig {
        StageConfig::new(name, "passthrough")
            .inputs(inputs.iter().copied())
            .outputs(outputs.iter().copied())
    }

    #[test]
    fn test_valid_chain() {
        let cfg = workflow(
            &["image"],
            &["scores"],
            vec![
                stage("detect", &["image"], &["boxes"]),
                stage("score", &["boxes"], &["scores"]),
            ],
        );
        assert!(validate_workflow(&cfg).is_ok());
    }

    #[test]
    fn test_empty_workflow() {
        let cfg = workflow(&["image"], &[], vec![]);
        assert_eq!(
            validate_workflow(&cfg).unwrap_err(),
            vec![GraphError::EmptyWorkflow {
                workflow: "test".into()
            }]
        );
    }

    #[test]
    fn test_duplicate_stage_name() {
        let cfg = workflow(
            &["image"],
            &["a", "b"],
            vec![stage("s", &["image"], &["a"]), stage("s", &["image"], &["b"])],
        );
        assert_eq!(
            validate_workflow(&cfg).unwrap_err(),
            vec![GraphError::DuplicateStage { stage: "s".into() }]
        );
    }

    #[test]
    fn test_duplicate_output_between_stages() {
        let cfg = workflow(
            &["image"],
            &["boxes"],
            vec![
                stage("a", &["image"], &["boxes"]),
                stage("b", &["image"], &["boxes"]),
            ],
        );
        assert_eq!(
            validate_workflow(&cfg).unwrap_err(),
            vec![GraphError::DuplicateOutput {
                slot: "boxes".into(),
                first: "a".into(),
                second: "b".into(),
            }]
        );
    }

    #[test]
    fn test_stage_shadowing_flow_input() {
        let cfg = workflow(&["image"], &["image"], vec![stage("a", &[], &["image"])]);
        let errors = validate_workflow(&cfg).unwrap_err();
        assert_eq!(
            errors,
            vec![GraphError::DuplicateOutput {
                slot: "image".into(),
                first: FRAME_INPUT.into(),
                second: "a".into(),
            }]
        );
    }

    #[test]
    fn test_errors_accumulate() {
        let cfg = workflow(
            &["image"],
            &["missing_out"],
            vec![
                stage("a", &["nope"], &["x"]),
                stage("a", &["image"], &["y"]),
            ],
        );
        let errors = validate_workflow(&cfg).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&GraphError::DuplicateStage { stage: "a".into() }));
        assert!(errors.contains(&GraphError::UnproducedInput {
            stage: "a".into(),
            slot: "nope".into()
        }));
        assert!(errors.contains(&GraphError::UnproducedOutput {
            slot: "missing_out".into()
        }));
    }

    #[test]
    fn test_two_stage_cycle() {
        let cfg = workflow(
            &["image"],
            &["y"],
            vec![
                stage("a", &["image", "y"], &["x"]),
                stage("b", &["x"], &["y"]),
            ],
        );
        assert_eq!(
            validate_workflow(&cfg).unwrap_err(),
            vec![GraphError::Cycle {
                path: vec!["a".into(), "b".into(), "a".into()]
            }]
        );
    }

    #[test]
    fn test_self_cycle() {
        let cfg = workflow(&["image"], &["x"], vec![stage("a", &["image", "x"], &["x"])]);
        assert_eq!(
            validate_workflow(&cfg).unwrap_err(),
            vec![GraphError::Cycle {
                path: vec!["a".into(), "a".into()]
            }]
        );
    }

    #[test]
    fn test_cycle_skipped_when_references_broken() {
        let cfg = workflow(
            &["image"],
            &["y"],
            vec![
                stage("a", &["y", "ghost"], &["x"]),
                stage("b", &["x"], &["y"]),
            ],
        );
        let errors = validate_workflow(&cfg).unwrap_err();
        assert_eq!(
            errors,
            vec![GraphError::UnproducedInput {
                stage: "a".into(),
                slot: "ghost".into()
            }]
        );
    }
}
