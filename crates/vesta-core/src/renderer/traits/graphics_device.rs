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
use crate::renderer::error::{PipelineError, RenderError, ResourceError, ShaderError};
use crate::renderer::traits::{CommandList, CommandQueue, Fence, SwapChain, SwapChainDescriptor};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// The main interface of a GPU backend.
///
/// The model is explicit: memory is created as heaps, resources are placed into
/// heaps at offsets chosen by the caller, views live in descriptor heaps, and
/// command recording is backed by allocators the caller must not reset while the
/// GPU still reads them.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// A human readable name of the adapter the device runs on.
    fn adapter_name(&self) -> String;

    /// Creates a heap.
    /// ## Arguments
    /// * `descriptor` - The memory class, size and alignment of the heap.
    /// ## Returns
    /// The ID of the new heap.
    /// ## Errors
    /// * `ResourceError::BackendError` - If the memory could not be allocated.
    fn create_heap(&self, descriptor: &HeapDescriptor) -> Result<HeapId, ResourceError>;

    /// Destroys a heap. Every resource placed in it must have been destroyed first.
    fn destroy_heap(&self, id: HeapId);

    /// Returns how many bytes, and which alignment, placing `descriptor` needs.
    fn resource_allocation_info(&self, descriptor: &ResourceDescriptor) -> ResourceAllocationInfo;

    /// Places a resource into a heap.
    /// ## Arguments
    /// * `heap` - The heap receiving the resource.
    /// * `offset` - Byte offset of the resource in the heap, a multiple of the
    ///   alignment returned by [`GraphicsDevice::resource_allocation_info`].
    /// * `descriptor` - Shape and usage of the resource.
    /// * `initial_state` - State the resource starts in.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the resource does not fit in the heap.
    fn create_placed_resource(
        &self,
        heap: HeapId,
        offset: u64,
        descriptor: &ResourceDescriptor,
        initial_state: ResourceState,
    ) -> Result<ResourceId, ResourceError>;

    /// Destroys a resource. Its heap memory is not released.
    fn destroy_resource(&self, id: ResourceId);

    /// Returns the GPU virtual address of a buffer.
    fn gpu_virtual_address(&self, id: ResourceId) -> Result<GpuVirtualAddress, ResourceError>;

    /// Writes `data` at `offset` through the CPU mapping of a resource.
    /// ## Errors
    /// * `ResourceError::NotCpuVisible` - If the resource lives in a heap the CPU cannot write.
    /// * `ResourceError::OutOfBounds` - If the range does not fit in the resource.
    fn write_mapped(&self, id: ResourceId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Reads `out.len()` bytes at `offset` through the CPU mapping of a resource.
    fn read_mapped(&self, id: ResourceId, offset: u64, out: &mut [u8]) -> Result<(), ResourceError>;

    /// Creates a descriptor heap.
    fn create_descriptor_heap(
        &self,
        descriptor: &DescriptorHeapDescriptor,
    ) -> Result<DescriptorHeapId, ResourceError>;

    /// Destroys a descriptor heap.
    fn destroy_descriptor_heap(&self, id: DescriptorHeapId);

    /// Distance in bytes between two descriptor handles of the same heap kind.
    fn descriptor_increment_size(&self, kind: DescriptorHeapKind) -> u32;

    /// The CPU handle of the first slot of a descriptor heap.
    fn cpu_descriptor_start(&self, heap: DescriptorHeapId) -> Result<CpuDescriptorHandle, ResourceError>;

    /// The GPU handle of the first slot of a shader-visible descriptor heap.
    fn gpu_descriptor_start(&self, heap: DescriptorHeapId) -> Result<GpuDescriptorHandle, ResourceError>;

    /// Writes a view into the descriptor slot at `destination`.
    fn create_view(&self, view: &ViewDescriptor, destination: CpuDescriptorHandle) -> Result<(), ResourceError>;

    /// Copies `count` contiguous descriptors from `source` to `destination`.
    fn copy_descriptors_simple(
        &self,
        count: u32,
        destination: CpuDescriptorHandle,
        source: CpuDescriptorHandle,
        kind: DescriptorHeapKind,
    ) -> Result<(), ResourceError>;

    /// Loads the compiled shader `name` from `dir`.
    ///
    /// Backends that embed their own shaders may resolve names without touching the disk.
    fn load_shader(&self, dir: &Path, name: &str) -> Result<ShaderBinary, ShaderError> {
        ShaderBinary::load(dir, name)
    }

    /// Creates a root signature.
    fn create_root_signature(&self, descriptor: &RootSignatureDescriptor) -> Result<RootSignatureId, PipelineError>;

    /// Creates a graphics pipeline state object.
    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<PipelineStateId, PipelineError>;

    /// Creates a compute pipeline state object.
    /// ## Errors
    /// * `PipelineError::CompilationFailed` - If the backend cannot run the shader.
    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<PipelineStateId, PipelineError>;

    /// Creates a command signature used by `execute_indirect`.
    fn create_command_signature(
        &self,
        descriptor: &CommandSignatureDescriptor,
    ) -> Result<CommandSignatureId, PipelineError>;

    /// Creates a command allocator for lists of `list_type`.
    fn create_command_allocator(&self, list_type: CommandListType) -> Result<CommandAllocatorId, RenderError>;

    /// Resets a command allocator, reclaiming the memory of everything recorded with it.
    /// ## Errors
    /// * `RenderError::OrderingViolation` - If the GPU may still execute commands
    ///   recorded with the allocator.
    fn reset_command_allocator(&self, id: CommandAllocatorId) -> Result<(), RenderError>;

    /// Creates a command list in the closed state.
    fn create_command_list(&self, list_type: CommandListType) -> Result<Box<dyn CommandList>, RenderError>;

    /// Creates a command queue.
    fn create_command_queue(&self, list_type: CommandListType) -> Result<Arc<dyn CommandQueue>, RenderError>;

    /// Creates a fence whose completed value starts at `initial_value`.
    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>, RenderError>;

    /// Creates a swap chain presenting through `queue`.
    /// ## Arguments
    /// * `queue` - The direct queue presentation is ordered on.
    /// * `descriptor` - Buffer count, size and format of the back buffers.
    fn create_swap_chain(
        &self,
        queue: &Arc<dyn CommandQueue>,
        descriptor: &SwapChainDescriptor,
    ) -> Result<Box<dyn SwapChain>, RenderError>;
}
