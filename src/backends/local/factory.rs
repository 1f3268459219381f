// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::stages::*;
use crate::config::StageConfig;
use crate::traits::Stage;

pub struct LocalStageFactory;

impl LocalStageFactory {
    /// Create an uninitialized stage instance of the given built-in kind.
    ///
    /// - "passthrough" -> PassthroughStage
    /// - "box_filter" -> BoxFilterStage
    pub fn create_stage(kind: &str, config: &StageConfig) -> Result<Box<dyn Stage>, String> {
        match kind {
            "passthrough" => Ok(Box::new(PassthroughStage::from_options(&config.options)?)),
            "box_filter" => {
                if config.inputs.len() != 1 || config.outputs.len() != 1 {
                    return Err(format!(
                        "box_filter stage '{}' needs exactly one input and one output",
                        config.name
                    ));
                }
                Ok(Box::new(BoxFilterStage::new()))
            }
            _ => Err(format!("Unknown local stage implementation: '{}'", kind)),
        }
    }

    /// List all built-in stage kinds
    pub fn list_available_implementations() -> Vec<&'static str> {
        vec!["box_filter", "passthrough"]
    }

    pub fn is_implementation_available(kind: &str) -> bool {
        Self::list_available_implementations().contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known_kinds() {
        for kind in LocalStageFactory::list_available_implementations() {
            let cfg = StageConfig::new("s", kind).inputs(["a"]).outputs(["b"]);
            let stage = LocalStageFactory::create_stage(kind, &cfg)
                .unwrap_or_else(|e| panic!("failed to create {}: {}", kind, e));
            assert!(!stage.version().is_empty());
        }
    }

    #[test]
    fn test_unknown_kind() {
        let cfg = StageConfig::new("s", "nope");
        let err = LocalStageFactory::create_stage("nope", &cfg).err().unwrap();
        assert!(err.contains("nope"));
        assert!(!LocalStageFactory::is_implementation_available("nope"));
    }

    #[test]
    fn test_box_filter_arity_checked() {
        let cfg = StageConfig::new("f", "box_filter").inputs(["a", "b"]).outputs(["c"]);
        assert!(LocalStageFactory::create_stage("box_filter", &cfg).is_err());
    }
}
