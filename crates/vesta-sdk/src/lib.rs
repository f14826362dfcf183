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

//! The public-facing entry point of the Vesta engine.
//!
//! [`GraphicsEngine`] builds every subsystem in dependency order (queues, command
//! lists, swap chain, memory pools, descriptor table, textures, models and the render
//! lane) and drives them through the three phases of an application: registration,
//! a single [`GraphicsEngine::process_data`] pass, then one [`GraphicsEngine::render`]
//! per frame.

#![warn(missing_docs)]

mod depth_buffer;
mod graphics_engine;
mod viewport;

pub use self::depth_buffer::{DepthBuffer, DEPTH_CLEAR_VALUE, DEPTH_FORMAT};
pub use self::graphics_engine::GraphicsEngine;
pub use self::viewport::ViewportAndScissor;

/// Types an application needs to feed the engine.
pub mod prelude {
    pub use crate::GraphicsEngine;
    pub use vesta_core::math::{AxisBounds, AxisRange, Float3};
    pub use vesta_core::renderer::{RenderError, ResourceError};
    pub use vesta_core::{EngineConfig, RenderEngineKind};
    pub use vesta_lanes::render_lane::{ColoredVertex, MeshModel, Model, TexturedVertex};
}
