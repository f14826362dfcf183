// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Vesta Core
//!
//! Foundational crate containing the GPU contracts, core types and frame-pacing
//! primitives that every other Vesta crate builds on.
//!
//! Nothing in here talks to a real device. The traits in [`renderer::traits`] describe
//! an explicit command/queue GPU model (heaps, placed resources, descriptor heaps,
//! command allocators, queues and fences); backends in `vesta-infra` implement them.

#![warn(missing_docs)]

pub mod config;
pub mod math;
pub mod renderer;
pub mod sync;

pub use config::{EngineConfig, RenderEngineKind};
