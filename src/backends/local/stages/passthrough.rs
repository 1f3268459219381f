// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use crate::traits::{Stage, StageDescriptor, StageInput, StageResult};

/// Copies input `i` to output `i`, sharing the items.
///
/// Thread safe by default. The `thread_safe`, `needs_reorder` and
/// `source_context_dependent` options override the descriptor, which makes the
/// stage useful for exercising scheduling policies from a workflow file.
pub struct PassthroughStage {
    descriptor: StageDescriptor,
}

impl PassthroughStage {
    pub fn new() -> Self {
        Self {
            descriptor: StageDescriptor {
                thread_safe: true,
                ..Default::default()
            },
        }
    }

    /// Build with descriptor flags taken from workflow options.
    pub fn from_options(options: &HashMap<String, serde_json::Value>) -> Result<Self, String> {
        let defaults = Self::new().descriptor;
        Ok(Self {
            descriptor: StageDescriptor {
                thread_safe: flag(options, "thread_safe", defaults.thread_safe)?,
                needs_reorder: flag(options, "needs_reorder", defaults.needs_reorder)?,
                source_context_dependent: flag(
                    options,
                    "source_context_dependent",
                    defaults.source_context_dependent,
                )?,
            },
        })
    }
}

impl Default for PassthroughStage {
    fn default() -> Self {
        Self::new()
    }
}

fn flag(options: &HashMap<String, serde_json::Value>, key: &str, default: bool) -> Result<bool, String> {
    match options.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_bool()
            .ok_or_else(|| format!("option '{}' must be a boolean, got {}", key, value)),
    }
}

impl Stage for PassthroughStage {
    fn process(&self, batch: &[StageInput]) -> Vec<StageResult> {
        batch.iter().map(|frame| Ok(frame.inputs.clone())).collect()
    }

    fn version(&self) -> String {
        format!("passthrough-{}", env!("CARGO_PKG_VERSION"))
    }

    fn descriptor(&self) -> StageDescriptor {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Item, ItemVector, Parameter};
    use std::sync::Arc;

    #[test]
    fn test_outputs_share_inputs() {
        let stage = PassthroughStage::new();
        let input = ItemVector::from_items(vec![Item::valid("box", 1u8), Item::invalid("box")]);
        let results = stage.process(&[StageInput {
            source_id: 0,
            sequence_id: 0,
            inputs: vec![input.clone()],
            parameter: Arc::new(Parameter::null()),
        }]);
        let outputs = results[0].as_ref().unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(Arc::ptr_eq(&outputs[0].items()[0], &input.items()[0]));
        assert!(!outputs[0].items()[1].is_valid());
    }

    #[test]
    fn test_descriptor_from_options() {
        let mut options = HashMap::new();
        options.insert("thread_safe".to_string(), serde_json::json!(false));
        options.insert("needs_reorder".to_string(), serde_json::json!(true));
        let stage = PassthroughStage::from_options(&options).unwrap();
        assert_eq!(
            stage.descriptor(),
            StageDescriptor {
                thread_safe: false,
                needs_reorder: true,
                source_context_dependent: false,
            }
        );
    }

    #[test]
    fn test_non_boolean_option_rejected() {
        let mut options = HashMap::new();
        options.insert("thread_safe".to_string(), serde_json::json!("yes"));
        let err = PassthroughStage::from_options(&options).err().unwrap();
        assert!(err.contains("thread_safe"));
    }
}
