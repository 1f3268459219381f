// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::validation::FRAME_INPUT;
use crate::config::{validate_workflow, WorkflowConfig};
use crate::errors::GraphError;
use std::collections::{BTreeSet, HashMap};

/// Who writes a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotProducer {
    /// Supplied by the submitted frame.
    FrameInput,
    /// Written by the stage at this index.
    Stage(usize),
}

/// A stage bound into the graph. Slot references are indices into
/// [`WorkflowGraph::slot_names`].
#[derive(Debug, Clone)]
pub struct StageNode {
    pub index: usize,
    pub name: String,
    pub kind: String,
    pub input_slots: Vec<usize>,
    pub output_slots: Vec<usize>,
    /// Stages whose completion unblocks this one, ascending by index
    pub predecessors: Vec<usize>,
    pub successors: Vec<usize>,
    /// Position in [`WorkflowGraph::topological_order`]
    pub topo_rank: usize,
}

impl StageNode {
    pub fn is_entry(&self) -> bool {
        self.predecessors.is_empty()
    }
}

/// Immutable, index-based view of a validated workflow.
///
/// Built once at startup and shared read-only by the scheduler, so no locking is
/// needed to consult it.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    name: String,
    stages: Vec<StageNode>,
    stage_index: HashMap<String, usize>,
    slot_names: Vec<String>,
    slot_index: HashMap<String, usize>,
    producers: Vec<SlotProducer>,
    consumers: Vec<Vec<usize>>,
    flow_inputs: Vec<usize>,
    flow_outputs: Vec<usize>,
    topological_order: Vec<usize>,
}

impl WorkflowGraph {
    /// Validate `config` and bind it into a graph.
    ///
    /// Fails with the first [`GraphError`] found; use
    /// [`validate_workflow`] directly to see all of them.
    pub fn build(config: &WorkflowConfig) -> Result<Self, GraphError> {
        if let Err(mut errors) = validate_workflow(config) {
            return Err(errors.remove(0));
        }

        let mut slot_names = Vec::new();
        let mut slot_index = HashMap::new();
        let mut intern = |slot: &str| -> usize {
            if let Some(&idx) = slot_index.get(slot) {
                return idx;
            }
            let idx = slot_names.len();
            slot_names.push(slot.to_string());
            slot_index.insert(slot.to_string(), idx);
            idx
        };

        let flow_inputs: Vec<usize> = config.inputs.iter().map(|s| intern(s.as_str())).collect();
        let mut stages: Vec<StageNode> = config
            .stages
            .iter()
            .enumerate()
            .map(|(index, stage)| StageNode {
                index,
                name: stage.name.clone(),
                kind: stage.kind.clone(),
                input_slots: stage.inputs.iter().map(|s| intern(s.as_str())).collect(),
                output_slots: stage.outputs.iter().map(|s| intern(s.as_str())).collect(),
                predecessors: Vec::new(),
                successors: Vec::new(),
                topo_rank: 0,
            })
            .collect();
        let flow_outputs: Vec<usize> = config.outputs.iter().map(|s| intern(s.as_str())).collect();

        let mut producers = vec![SlotProducer::FrameInput; slot_names.len()];
        for stage in &stages {
            for &slot in &stage.output_slots {
                producers[slot] = SlotProducer::Stage(stage.index);
            }
        }

        let mut consumers = vec![Vec::new(); slot_names.len()];
        let mut edges: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); stages.len()];
        for stage in &stages {
            for &slot in &stage.input_slots {
                if !consumers[slot].contains(&stage.index) {
                    consumers[slot].push(stage.index);
                }
                if let SlotProducer::Stage(producer) = producers[slot] {
                    edges[stage.index].insert(producer);
                }
            }
        }
        for (index, preds) in edges.iter().enumerate() {
            stages[index].predecessors = preds.iter().copied().collect();
            for &pred in preds {
                stages[pred].successors.push(index);
            }
        }

        let topological_order = kahn_order(&stages)?;
        for (rank, &index) in topological_order.iter().enumerate() {
            stages[index].topo_rank = rank;
        }

        let stage_index = stages
            .iter()
            .map(|s| (s.name.clone(), s.index))
            .collect();

        Ok(Self {
            name: config.name.clone(),
            stages,
            stage_index,
            slot_names,
            slot_index,
            producers,
            consumers,
            flow_inputs,
            flow_outputs,
            topological_order,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[StageNode] {
        &self.stages
    }

    pub fn stage(&self, index: usize) -> &StageNode {
        &self.stages[index]
    }

    pub fn stage_by_name(&self, name: &str) -> Option<&StageNode> {
        self.stage_index.get(name).map(|&i| &self.stages[i])
    }

    pub fn slot_names(&self) -> &[String] {
        &self.slot_names
    }

    pub fn slot_name(&self, slot: usize) -> &str {
        &self.slot_names[slot]
    }

    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slot_index.get(name).copied()
    }

    pub fn producer(&self, slot: usize) -> SlotProducer {
        self.producers[slot]
    }

    /// Human-readable producer name, `<input>` for frame-supplied slots.
    pub fn producer_name(&self, slot: usize) -> &str {
        match self.producers[slot] {
            SlotProducer::FrameInput => FRAME_INPUT,
            SlotProducer::Stage(i) => &self.stages[i].name,
        }
    }

    /// Stages that read `slot`.
    pub fn consumers(&self, slot: usize) -> &[usize] {
        &self.consumers[slot]
    }

    pub fn flow_inputs(&self) -> &[usize] {
        &self.flow_inputs
    }

    pub fn flow_outputs(&self) -> &[usize] {
        &self.flow_outputs
    }

    pub fn is_flow_output(&self, slot: usize) -> bool {
        self.flow_outputs.contains(&slot)
    }

    pub fn topological_order(&self) -> &[usize] {
        &self.topological_order
    }

    /// Stages with no predecessor; ready as soon as a frame is submitted.
    pub fn entry_stages(&self) -> impl Iterator<Item = &StageNode> {
        self.stages.iter().filter(|s| s.is_entry())
    }

    /// Stages nobody depends on.
    pub fn terminal_stages(&self) -> impl Iterator<Item = &StageNode> {
        self.stages.iter().filter(|s| s.successors.is_empty())
    }
}

/// Kahn's algorithm, lowest declaration index first among ready stages.
fn kahn_order(stages: &[StageNode]) -> Result<Vec<usize>, GraphError> {
    let mut in_degree: Vec<usize> = stages.iter().map(|s| s.predecessors.len()).collect();
    let mut ready: BTreeSet<usize> = stages
        .iter()
        .filter(|s| s.predecessors.is_empty())
        .map(|s| s.index)
        .collect();
    let mut order = Vec::with_capacity(stages.len());

    while let Some(index) = ready.pop_first() {
        order.push(index);
        for &succ in &stages[index].successors {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                ready.insert(succ);
            }
        }
    }

    if order.len() != stages.len() {
        let path = stages
            .iter()
            .filter(|s| in_degree[s.index] > 0)
            .map(|s| s.name.clone())
            .collect();
        return Err(GraphError::Cycle { path });
    }

    Ok(order)
}
