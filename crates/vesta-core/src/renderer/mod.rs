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

//! Provides the backend-agnostic GPU contracts for the Vesta engine.
//!
//! This module defines the "common language" for all GPU work. It contains the
//! abstract `traits` (like [`GraphicsDevice`]), the value types they exchange (like
//! [`ResourceDescriptor`]), the error hierarchy, and the [`frame`] managers that pace
//! command recording against GPU progress.
//!
//! The 'what' lives here; the 'how' is provided by a backend in `vesta-infra`.

pub mod api;
pub mod error;
pub mod frame;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::error::{PipelineError, RenderError, ResourceError, ShaderError};
pub use self::traits::{CommandList, CommandQueue, Fence, GraphicsDevice, SwapChain};
