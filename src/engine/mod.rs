// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The execution engine.
//!
//! [`EngineBuilder`] turns a validated [`WorkflowConfig`](crate::config::WorkflowConfig)
//! into a running [`Engine`]: it builds the dependency graph, creates and
//! initializes stage instances, and starts one dispatch loop per stage on a
//! dedicated tokio runtime.
//!
//! Frames enter through [`Engine::sync_predict`] (blocks until the frame's
//! outputs are ready) or [`Engine::async_predict`] (outputs go to the callback
//! registered with [`Engine::set_callback`]). Within one source, frames are
//! delivered in submission order whenever every stage on their path asks for
//! ordering.

mod builder;
mod frame_state;
mod gauge;
mod lane;
mod predict;
mod profiler;
mod scheduler;
mod stage_runner;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use builder::EngineBuilder;
pub use predict::{Engine, FrameCallback, StageCallback};
pub use profiler::StageStats;

/// Lock a mutex, recovering the guard when a panicking holder poisoned it.
///
/// Stage code never runs under an engine lock, so a poisoned lock still holds
/// consistent state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
