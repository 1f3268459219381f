// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Stage implementations shipped with the engine.
//!
//! ## Local Backend
//! In-process stages registered by [`crate::config::StageRegistry::with_builtins`]:
//! - **passthrough**: copies input vectors to outputs by position
//! - **box_filter**: marks boxes whose area is below a hot-swappable threshold as FILTERED
//!
//! ## Stub Backend (Test-Only)
//! Instrumented stages for scheduler tests (only available in test builds):
//! - **RecordingStage**: records invocation order, concurrency and parameter snapshots
//! - **ScoreStage**: per-entity fan-out that keeps index correspondence
//!
//! # Example
//! ```rust
//! use frameflow::backends::local::LocalStageFactory;
//! use frameflow::config::StageConfig;
//!
//! let config = StageConfig::new("filter", "box_filter").inputs(["boxes"]).outputs(["kept"]);
//! let stage = LocalStageFactory::create_stage("box_filter", &config)?;
//! assert!(stage.descriptor().thread_safe);
//! # Ok::<(), String>(())
//! ```

pub mod local;
#[cfg(test)]
pub mod stub;
