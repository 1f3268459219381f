// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

use crate::data::{Item, ItemState, ItemVector, Parameter};
use crate::errors::{ErrorKind, ParamError, StageFailure};
use crate::observability::messages::{stage::BoxesFiltered, StructuredLog};
use crate::traits::{Stage, StageDescriptor, StageInit, StageInput, StageResult};

/// Axis-aligned bounding box payload, corners in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxFilterParam {
    /// Boxes with a smaller area are marked FILTERED
    pub threshold: f32,
}

impl BoxFilterParam {
    fn validate(&self) -> Result<(), String> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(format!(
                "threshold must be a non-negative number, got {}",
                self.threshold
            ));
        }
        Ok(())
    }
}

/// Marks small boxes as FILTERED without removing them, so score and feature
/// vectors computed downstream stay index-aligned with the box vector.
///
/// Valid boxes that pass are shared, not copied. Items that do not carry a
/// [`BBox`] become INVALID with an `InputInvalid` error.
pub struct BoxFilterStage {
    name: String,
    default_param: BoxFilterParam,
}

impl BoxFilterStage {
    pub fn new() -> Self {
        Self {
            name: "box_filter".to_string(),
            default_param: BoxFilterParam::default(),
        }
    }

    fn resolve(&self, parameter: &Parameter) -> Result<BoxFilterParam, StageFailure> {
        if parameter.is_null() {
            return Ok(self.default_param);
        }
        let param: BoxFilterParam = parameter
            .decode()
            .map_err(|e| StageFailure::bad_parameter(e.to_string()))?;
        param.validate().map_err(StageFailure::bad_parameter)?;
        Ok(param)
    }

    fn filter(&self, boxes: &ItemVector, param: BoxFilterParam) -> ItemVector {
        let mut output = ItemVector::new();
        let mut filtered = 0;
        for item in boxes.iter() {
            if item.state() != ItemState::Valid {
                output.push_ref(item.clone());
                continue;
            }
            match item.payload::<BBox>() {
                Some(bbox) if bbox.area() < param.threshold => {
                    filtered += 1;
                    output.push(item.with_state(ItemState::Filtered));
                }
                Some(_) => output.push_ref(item.clone()),
                None => output.push(Item::invalid(item.type_tag()).with_error(StageFailure::new(
                    ErrorKind::InputInvalid,
                    "item does not carry a bounding box",
                ))),
            }
        }

        BoxesFiltered {
            stage: &self.name,
            total: boxes.len(),
            filtered,
            threshold: param.threshold,
        }
        .log();

        output
    }
}

impl Default for BoxFilterStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for BoxFilterStage {
    fn initialize(&mut self, init: &StageInit) -> Result<(), StageFailure> {
        self.name = init.name.clone();
        if let Some(value) = init.options.get("default_threshold") {
            let threshold = value.as_f64().ok_or_else(|| {
                StageFailure::bad_parameter("default_threshold must be a number")
            })? as f32;
            let param = BoxFilterParam { threshold };
            param.validate().map_err(StageFailure::bad_parameter)?;
            self.default_param = param;
        }
        Ok(())
    }

    fn process(&self, batch: &[StageInput]) -> Vec<StageResult> {
        batch
            .iter()
            .map(|frame| {
                let param = self.resolve(&frame.parameter)?;
                let boxes = frame.inputs.first().ok_or_else(|| {
                    StageFailure::new(ErrorKind::InputInvalid, "box_filter received no input")
                })?;
                Ok(vec![self.filter(boxes, param)])
            })
            .collect()
    }

    fn update_parameter(&self, value: &Parameter) -> Result<(), ParamError> {
        let param: BoxFilterParam = value.decode()?;
        param.validate().map_err(|reason| ParamError::Rejected {
            stage: self.name.clone(),
            reason,
        })
    }

    fn parameter(&self) -> Parameter {
        Parameter::encode(&self.default_param).unwrap_or_default()
    }

    fn version(&self) -> String {
        format!("box_filter-{}", env!("CARGO_PKG_VERSION"))
    }

    fn descriptor(&self) -> StageDescriptor {
        StageDescriptor {
            thread_safe: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn boxes() -> ItemVector {
        ItemVector::from_items(vec![
            Item::valid("bbox", BBox::new(0.0, 0.0, 100.0, 100.0)),
            Item::invalid("bbox"),
            Item::valid("bbox", BBox::new(0.0, 0.0, 10.0, 10.0)),
        ])
    }

    fn run(stage: &BoxFilterStage, input: ItemVector, parameter: Parameter) -> StageResult {
        stage
            .process(&[StageInput {
                source_id: 0,
                sequence_id: 0,
                inputs: vec![input],
                parameter: Arc::new(parameter),
            }])
            .remove(0)
    }

    #[test]
    fn test_small_boxes_filtered_in_place() {
        let stage = BoxFilterStage::new();
        let input = boxes();
        let param = Parameter::new(serde_json::json!({ "threshold": 500.0 }));
        let out = run(&stage, input.clone(), param).unwrap().remove(0);

        assert_eq!(out.len(), 3);
        assert_eq!(out.items()[0].state(), ItemState::Valid);
        assert!(Arc::ptr_eq(&out.items()[0], &input.items()[0]));
        assert_eq!(out.items()[1].state(), ItemState::Invalid);
        assert_eq!(out.items()[2].state(), ItemState::Filtered);
        assert_eq!(out.items()[2].payload::<BBox>().unwrap().area(), 100.0);
    }

    #[test]
    fn test_null_parameter_uses_default() {
        let stage = BoxFilterStage::new();
        let out = run(&stage, boxes(), Parameter::null()).unwrap().remove(0);
        assert_eq!(out.count(ItemState::Filtered), 0);
    }

    #[test]
    fn test_bad_parameter_fails_frame() {
        let stage = BoxFilterStage::new();
        let err = run(&stage, boxes(), Parameter::new(serde_json::json!({ "threshold": -1.0 })))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadParameter);
    }

    #[test]
    fn test_update_parameter_validates() {
        let stage = BoxFilterStage::new();
        assert!(stage
            .update_parameter(&Parameter::new(serde_json::json!({ "threshold": 3.0 })))
            .is_ok());
        assert!(matches!(
            stage.update_parameter(&Parameter::new(serde_json::json!({ "threshold": -3.0 }))),
            Err(ParamError::Rejected { .. })
        ));
        assert!(matches!(
            stage.update_parameter(&Parameter::new(serde_json::json!("loud"))),
            Err(ParamError::Decode(_))
        ));
    }

    #[test]
    fn test_non_box_payload_marked_invalid() {
        let stage = BoxFilterStage::new();
        let input = ItemVector::from_items(vec![Item::valid("bbox", "not a box")]);
        let out = run(&stage, input, Parameter::null()).unwrap().remove(0);
        assert_eq!(out.items()[0].state(), ItemState::Invalid);
        assert_eq!(out.items()[0].error().unwrap().kind, ErrorKind::InputInvalid);
    }
}
