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

use crate::renderer::api::*;
use crate::renderer::error::RenderError;
use std::fmt::Debug;

/// Describes a swap chain to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainDescriptor {
    /// Number of back buffers.
    pub buffer_count: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Back buffer format.
    pub format: TextureFormat,
}

/// A ring of back buffers presented one after the other.
pub trait SwapChain: Send + Debug {
    /// Number of back buffers.
    fn buffer_count(&self) -> usize;

    /// Index of the back buffer the next frame renders into.
    fn current_back_buffer_index(&self) -> usize;

    /// The back buffer texture at `index`.
    fn back_buffer(&self, index: usize) -> ResourceId;

    /// The render target view of the back buffer at `index`.
    fn render_target_view(&self, index: usize) -> CpuDescriptorHandle;

    /// Format of the back buffers.
    fn format(&self) -> TextureFormat;

    /// Current size of the back buffers in pixels.
    fn size(&self) -> (u32, u32);

    /// Queues the current back buffer for presentation and advances the index.
    fn present(&mut self) -> Result<(), RenderError>;

    /// Recreates the back buffers at a new size.
    ///
    /// The GPU must be idle with respect to every back buffer.
    /// ## Returns
    /// `true` if the buffers were recreated, `false` if the size was unchanged or empty.
    fn resize(&mut self, width: u32, height: u32) -> Result<bool, RenderError>;

    /// The barrier moving the current back buffer from presentation to rendering.
    fn render_state_barrier(&self) -> ResourceBarrier {
        ResourceBarrier::transition(
            self.back_buffer(self.current_back_buffer_index()),
            ResourceState::Present,
            ResourceState::RenderTarget,
        )
    }

    /// The barrier moving the current back buffer from rendering to presentation.
    fn present_state_barrier(&self) -> ResourceBarrier {
        ResourceBarrier::transition(
            self.back_buffer(self.current_back_buffer_index()),
            ResourceState::RenderTarget,
            ResourceState::Present,
        )
    }

    /// The render target view of the current back buffer.
    fn current_render_target_view(&self) -> CpuDescriptorHandle {
        self.render_target_view(self.current_back_buffer_index())
    }
}
