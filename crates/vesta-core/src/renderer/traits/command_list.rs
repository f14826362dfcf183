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
use std::any::Any;
use std::fmt::Debug;

/// Records GPU commands into memory owned by a command allocator.
///
/// A list is either closed or recording. [`CommandList::reset`] starts a recording
/// against an allocator, [`CommandList::close`] ends it, and only a closed list can
/// be submitted to a [`CommandQueue`](super::CommandQueue). Recording methods do not
/// fail; misuse is reported when the list is closed or executed.
pub trait CommandList: Send + Debug {
    /// The queue type the list can be submitted to.
    fn list_type(&self) -> CommandListType;

    /// Starts recording against `allocator`, discarding previous commands.
    fn reset(&mut self, allocator: CommandAllocatorId) -> Result<(), RenderError>;

    /// Ends recording.
    /// ## Errors
    /// * `RenderError::OrderingViolation` - If the list was not recording.
    fn close(&mut self) -> Result<(), RenderError>;

    /// Returns `true` between [`CommandList::reset`] and [`CommandList::close`].
    fn is_recording(&self) -> bool;

    /// Records resource state transitions.
    fn resource_barrier(&mut self, barriers: &[ResourceBarrier]);

    /// Binds the shader-visible descriptor heaps root descriptor tables point into.
    fn set_descriptor_heaps(&mut self, heaps: &[DescriptorHeapId]);

    /// Sets the rasterizer viewport.
    fn set_viewport(&mut self, viewport: &Viewport);

    /// Sets the scissor rectangle.
    fn set_scissor_rect(&mut self, rect: &ScissorRect);

    /// Clears a render target to `colour`.
    fn clear_render_target_view(&mut self, rtv: CpuDescriptorHandle, colour: [f32; 4]);

    /// Clears a depth target to `depth`.
    fn clear_depth_stencil_view(&mut self, dsv: CpuDescriptorHandle, depth: f32);

    /// Binds one render target and an optional depth target.
    fn set_render_targets(&mut self, rtv: CpuDescriptorHandle, dsv: Option<CpuDescriptorHandle>);

    /// Binds a graphics or compute pipeline state object.
    fn set_pipeline_state(&mut self, pipeline: PipelineStateId);

    /// Binds the root signature used by draws.
    fn set_graphics_root_signature(&mut self, root_signature: RootSignatureId);

    /// Binds the root signature used by dispatches.
    fn set_compute_root_signature(&mut self, root_signature: RootSignatureId);

    /// Sets how vertices are assembled.
    fn set_primitive_topology(&mut self, topology: PrimitiveTopology);

    /// Writes one 32-bit root constant for draws.
    fn set_graphics_root_32bit_constant(&mut self, parameter_index: u32, value: u32, dest_offset: u32);

    /// Binds a descriptor table for draws.
    fn set_graphics_root_descriptor_table(&mut self, parameter_index: u32, base: GpuDescriptorHandle);

    /// Binds a descriptor table for dispatches.
    fn set_compute_root_descriptor_table(&mut self, parameter_index: u32, base: GpuDescriptorHandle);

    /// Binds a constant buffer by address for dispatches.
    fn set_compute_root_constant_buffer_view(&mut self, parameter_index: u32, address: GpuVirtualAddress);

    /// Binds vertex buffers starting at input slot `start_slot`.
    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]);

    /// Binds the index buffer.
    fn set_index_buffer(&mut self, view: &IndexBufferView);

    /// Records an indexed, instanced draw.
    fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    );

    /// Records a compute dispatch.
    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    /// Records GPU-driven work read from an argument buffer.
    /// ## Arguments
    /// * `signature` - How one command of the argument buffer is laid out.
    /// * `max_count` - Upper bound of commands executed.
    /// * `argument_buffer` / `argument_offset` - Where the commands start.
    /// * `count_buffer` / `count_offset` - An optional `u32` holding the live command
    ///   count. The executed count is the smaller of it and `max_count`.
    #[allow(clippy::too_many_arguments)]
    fn execute_indirect(
        &mut self,
        signature: CommandSignatureId,
        max_count: u32,
        argument_buffer: ResourceId,
        argument_offset: u64,
        count_buffer: Option<ResourceId>,
        count_offset: u64,
    );

    /// Copies `size` bytes between two buffers.
    fn copy_buffer_region(
        &mut self,
        destination: ResourceId,
        destination_offset: u64,
        source: ResourceId,
        source_offset: u64,
        size: u64,
    );

    /// Copies pitched texel rows from a buffer into a 2D texture.
    fn copy_buffer_to_texture(
        &mut self,
        destination: ResourceId,
        source: ResourceId,
        source_offset: u64,
        footprint: TextureCopyFootprint,
    );

    /// Returns the list as `Any`, so backends can recover their concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Returns the list as mutable `Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
