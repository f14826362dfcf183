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

//! Rendering lane - hot path for graphics operations
//!
//! Two ways of drawing the registered models are provided:
//!
//! - **Individual draws**: a [`ModelContainer`] groups models into [`BindInstance`]s
//!   that share a pipeline, and records one `draw_indexed` per model.
//! - **Indirect draws**: the [`IndirectPipeline`] culls one [`IndirectCommand`] per
//!   model on the compute queue, and the graphics queue consumes the survivors with
//!   a single `execute_indirect`.
//!
//! Both share the geometry placement of the [`ModelContainer`].
//!
//! [`IndirectCommand`]: vesta_core::renderer::api::IndirectCommand

mod bind_instance;
mod culling;
mod indirect_pipeline;
mod model;
mod model_container;

pub use bind_instance::*;
pub use culling::*;
pub use indirect_pipeline::*;
pub use model::*;
pub use model_container::*;
