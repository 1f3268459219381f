// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Workflow files under `configs/`, loaded end to end.

use std::io::Write;

use crate::backends::local::BBox;
use crate::config::{load_and_validate_config, load_config, WorkflowGraph};
use crate::data::{InputFrame, Item, ItemState, ItemVector};
use crate::engine::Engine;
use crate::errors::{ConfigError, GraphError};

#[test]
fn test_face_pipeline_yaml_loading() {
    let config = load_and_validate_config("configs/face-pipeline.yaml").unwrap();

    assert_eq!(config.name, "face_pipeline");
    assert_eq!(config.source_number, 2);
    assert_eq!(config.engine.max_concurrency, Some(4));
    assert_eq!(config.engine.max_inflight_frames, Some(32));
    assert_eq!(config.engine.reorder_capacity, Some(16));
    assert_eq!(config.stages.len(), 3);
    assert_eq!(config.stages[1].timeout_ms, Some(200));
    assert!(config.stages[2].skip_on_failed_input);
    assert_eq!(config.stages[1].options["source_context_dependent"], true);
}

#[test]
fn test_face_pipeline_graph_shape() {
    let config = load_and_validate_config("configs/face-pipeline.yaml").unwrap();
    let graph = WorkflowGraph::build(&config).unwrap();

    let entries: Vec<_> = graph.entry_stages().map(|s| s.name.as_str()).collect();
    assert_eq!(entries, vec!["filter"]);
    let terminals: Vec<_> = graph.terminal_stages().map(|s| s.name.as_str()).collect();
    assert_eq!(terminals, vec!["tracker", "embedder"]);
    assert_eq!(graph.producer_name(graph.slot_index("image").unwrap()), "<input>");
}

#[test]
fn test_face_pipeline_runs() {
    let config = load_and_validate_config("configs/face-pipeline.yaml").unwrap();
    let engine = Engine::builder(config).build().unwrap();
    assert!(engine.descriptor("tracker").unwrap().source_context_dependent);

    let frame = InputFrame::new(1)
        .with_slot("image", ItemVector::from_items(vec![Item::valid("image", vec![0u8; 16])]))
        .with_slot(
            "boxes",
            ItemVector::from_items(vec![
                Item::valid("box", BBox::new(0.0, 0.0, 5.0, 5.0)),
                Item::valid("box", BBox::new(0.0, 0.0, 50.0, 50.0)),
            ]),
        );
    let output = engine.sync_predict(frame).unwrap();

    assert!(!output.is_failed());
    let tracked = output.output("tracked_boxes").unwrap();
    assert_eq!(tracked.count(ItemState::Filtered), 1);
    assert_eq!(tracked.count(ItemState::Valid), 1);
    assert_eq!(output.output("features").unwrap().len(), 2);
}

#[test]
fn test_multi_source_json_loading() {
    let config = load_and_validate_config("configs/multi-source.json").unwrap();

    assert_eq!(config.source_number, 4);
    assert_eq!(config.engine.worker_threads, Some(2));
    assert!(config.engine.release_intermediate);

    let engine = Engine::builder(config).build().unwrap();
    let boxes = ItemVector::from_items(vec![
        Item::valid("box", BBox::new(0.0, 0.0, 2.0, 2.0)),
        Item::valid("box", BBox::new(0.0, 0.0, 10.0, 10.0)),
        Item::valid("box", BBox::new(0.0, 0.0, 30.0, 30.0)),
    ]);
    let output = engine
        .sync_predict(InputFrame::new(3).with_slot("boxes", boxes))
        .unwrap();

    let kept = output.output("kept").unwrap();
    let states: Vec<_> = kept.iter().map(|i| i.state()).collect();
    assert_eq!(
        states,
        vec![ItemState::Filtered, ItemState::Filtered, ItemState::Valid]
    );
}

#[test]
fn test_tracker_toml_loading() {
    let config = load_and_validate_config("configs/tracker.toml").unwrap();

    assert_eq!(config.name, "tracker_only");
    assert_eq!(config.source_number, 1);
    assert_eq!(config.stages[0].timeout_ms, Some(500));
    assert_eq!(config.stages[0].options["source_context_dependent"], true);
}

#[test]
fn test_cyclic_workflow_rejected() {
    assert!(load_config("configs/cyclic.yaml").is_ok());

    let error = load_and_validate_config("configs/cyclic.yaml").unwrap_err();
    match error {
        ConfigError::Invalid(errors) => {
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0], GraphError::Cycle { .. }));
        }
        other => panic!("expected a validation error, got {other}"),
    }
}

#[test]
fn test_workflow_from_temp_file() {
    let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    writeln!(
        file,
        "inputs: [boxes]\noutputs: [out]\nstages:\n  - name: only\n    kind: passthrough\n    inputs: [boxes]\n    outputs: [out]"
    )
    .unwrap();

    let config = load_and_validate_config(file.path()).unwrap();
    assert_eq!(config.stages[0].name, "only");
}

#[test]
fn test_missing_file_reports_path() {
    let error = load_config("configs/does-not-exist.yaml").unwrap_err();
    match error {
        ConfigError::Io { path, .. } => assert!(path.ends_with("does-not-exist.yaml")),
        other => panic!("expected an io error, got {other}"),
    }
}

#[test]
fn test_malformed_file_reports_format() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, "{{ \"inputs\": [").unwrap();

    assert!(matches!(
        load_config(file.path()).unwrap_err(),
        ConfigError::Json(_)
    ));
}
