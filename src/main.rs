// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use frameflow::backends::local::BBox;
use frameflow::config::{load_and_validate_config, WorkflowConfig};
use frameflow::data::{FrameOutput, InputFrame, Item, ItemState, ItemVector};
use frameflow::engine::Engine;

const DEFAULT_FRAMES_PER_SOURCE: u64 = 8;

/// Synthetic boxes of growing size, so a filter stage has something to drop.
fn synthetic_boxes(sequence: u64) -> ItemVector {
    (0..4)
        .map(|i| {
            let side = 4.0 + (sequence as f32 + i as f32) * 6.0;
            Item::valid("box", BBox::new(0.0, 0.0, side, side))
        })
        .collect()
}

fn synthetic_frame(config: &WorkflowConfig, source_id: u32, sequence: u64) -> InputFrame {
    config
        .inputs
        .iter()
        .fold(InputFrame::new(source_id), |frame, slot| {
            let vector = if slot.contains("box") {
                synthetic_boxes(sequence)
            } else {
                ItemVector::from_items(vec![Item::valid(slot.as_str(), sequence)])
            };
            frame.with_slot(slot.as_str(), vector)
        })
}

fn print_frame(output: &FrameOutput) {
    let marker = if output.is_failed() { "❌" } else { "✅" };
    println!(
        "  {} source {} frame {} ({:?})",
        marker, output.source_id, output.sequence_id, output.status
    );
    for (slot, vector) in &output.outputs {
        println!(
            "     • {}: {} items ({} valid, {} filtered, {} invalid)",
            slot,
            vector.len(),
            vector.count(ItemState::Valid),
            vector.count(ItemState::Filtered),
            vector.count(ItemState::Invalid)
        );
    }
    if output.error_code != 0 {
        println!("     ⚠️  {} ({})", output.error_detail, output.error_code);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <workflow.yaml|json|toml> [frames-per-source]", args[0]);
        eprintln!("Example: {} configs/face-pipeline.yaml 16", args[0]);
        std::process::exit(1);
    }
    let frames_per_source = match args.get(2) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("invalid frame count '{}'", raw))?,
        None => DEFAULT_FRAMES_PER_SOURCE,
    };

    let start_time = Instant::now();
    let config = load_and_validate_config(&args[1])
        .with_context(|| format!("failed to load workflow '{}'", args[1]))?;
    if config.inputs.is_empty() {
        bail!("workflow '{}' declares no inputs", config.name);
    }

    println!("🚀 frameflow");
    println!("═══════════════════════════════════");
    println!("📋 Workflow: {} ({})", config.name, args[1]);
    println!("🎥 Sources: {}", config.source_number.max(1));
    println!("🔢 Frames per source: {}", frames_per_source);

    let source_number = config.source_number.max(1);
    let workflow = &config;
    let frames: Vec<InputFrame> = (0..frames_per_source)
        .flat_map(move |sequence| {
            (0..source_number).map(move |source| synthetic_frame(workflow, source, sequence))
        })
        .collect();

    let engine = Engine::builder(config).build()?;
    engine.set_profiling(true);

    let (sender, receiver) = mpsc::channel();
    let sender = Mutex::new(sender);
    engine.set_callback(move |output| {
        if let Ok(sender) = sender.lock() {
            let _ = sender.send(output);
        }
    });

    let (frame_sender, frame_source) = tokio::sync::mpsc::channel(16);
    let producer = tokio::spawn(async move {
        for frame in frames {
            if frame_sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    let execution_start = Instant::now();
    let submitted = engine.pump(frame_source).await?;
    producer.await?;

    let engine = tokio::task::spawn_blocking(move || {
        engine.shutdown();
        engine
    })
    .await?;
    let execution_time = execution_start.elapsed();
    let stats = engine.stage_stats();

    println!("\n📊 Frames:");
    let mut failed = 0;
    for output in receiver.try_iter() {
        if output.is_failed() {
            failed += 1;
        }
        print_frame(&output);
    }

    println!("\n🔄 Stages:");
    for (position, &index) in engine.graph().topological_order().iter().enumerate() {
        let name = &engine.graph().stage(index).name;
        let stage_stats = stats.get(name).copied().unwrap_or_default();
        println!(
            "  {}. {} → {} invocations, {} failures, mean {:?}, max {:?}",
            position + 1,
            name,
            stage_stats.invocations,
            stage_stats.failures,
            stage_stats.mean_latency().unwrap_or_default(),
            stage_stats.max_latency
        );
    }

    println!("\n⏱️  Execution Time: {:?}", execution_time);
    println!("🎯 Submitted {} frames, {} failed", submitted, failed);
    println!("⏱️  Total Time (including config load): {:?}", start_time.elapsed());

    Ok(())
}
