// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // built-in and test stages
pub mod config;     // workflow files, graph, registry
pub mod data;       // items, vectors, frames
pub mod engine;     // scheduler and predict API
pub mod errors;     // error handling
pub mod observability;
pub mod traits;     // stage and frame source abstractions
