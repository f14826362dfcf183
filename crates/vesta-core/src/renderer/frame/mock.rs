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

//! A minimal in-memory device used by the frame pacing tests.

use crate::renderer::api::*;
use crate::renderer::error::{PipelineError, RenderError, ResourceError};
use crate::renderer::traits::{CommandList, CommandQueue, Fence, GraphicsDevice, SwapChain, SwapChainDescriptor};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct MockDevice {
    next_id: AtomicUsize,
}

impl MockDevice {
    pub fn new_arc() -> Arc<MockDevice> {
        Arc::new(MockDevice::default())
    }

    pub fn shared() -> Arc<dyn GraphicsDevice> {
        Self::new_arc()
    }

    pub fn mock_queue(&self, list_type: CommandListType) -> Arc<MockQueue> {
        Arc::new(MockQueue {
            list_type,
            state: Mutex::new(MockQueueState::default()),
        })
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl GraphicsDevice for MockDevice {
    fn adapter_name(&self) -> String {
        "mock".to_string()
    }
    fn create_heap(&self, _: &HeapDescriptor) -> Result<HeapId, ResourceError> {
        Ok(HeapId(self.next()))
    }
    fn destroy_heap(&self, _: HeapId) {}
    fn resource_allocation_info(&self, _: &ResourceDescriptor) -> ResourceAllocationInfo {
        unimplemented!("not used by frame pacing tests")
    }
    fn create_placed_resource(
        &self,
        _: HeapId,
        _: u64,
        _: &ResourceDescriptor,
        _: ResourceState,
    ) -> Result<ResourceId, ResourceError> {
        Ok(ResourceId(self.next()))
    }
    fn destroy_resource(&self, _: ResourceId) {}
    fn gpu_virtual_address(&self, _: ResourceId) -> Result<GpuVirtualAddress, ResourceError> {
        Ok(GpuVirtualAddress(0))
    }
    fn write_mapped(&self, _: ResourceId, _: u64, _: &[u8]) -> Result<(), ResourceError> {
        Ok(())
    }
    fn read_mapped(&self, _: ResourceId, _: u64, _: &mut [u8]) -> Result<(), ResourceError> {
        Ok(())
    }
    fn create_descriptor_heap(&self, _: &DescriptorHeapDescriptor) -> Result<DescriptorHeapId, ResourceError> {
        Ok(DescriptorHeapId(self.next()))
    }
    fn destroy_descriptor_heap(&self, _: DescriptorHeapId) {}
    fn descriptor_increment_size(&self, _: DescriptorHeapKind) -> u32 {
        32
    }
    fn cpu_descriptor_start(&self, _: DescriptorHeapId) -> Result<CpuDescriptorHandle, ResourceError> {
        Ok(CpuDescriptorHandle(0))
    }
    fn gpu_descriptor_start(&self, _: DescriptorHeapId) -> Result<GpuDescriptorHandle, ResourceError> {
        Ok(GpuDescriptorHandle(0))
    }
    fn create_view(&self, _: &ViewDescriptor, _: CpuDescriptorHandle) -> Result<(), ResourceError> {
        Ok(())
    }
    fn copy_descriptors_simple(
        &self,
        _: u32,
        _: CpuDescriptorHandle,
        _: CpuDescriptorHandle,
        _: DescriptorHeapKind,
    ) -> Result<(), ResourceError> {
        Ok(())
    }
    fn create_root_signature(&self, _: &RootSignatureDescriptor) -> Result<RootSignatureId, PipelineError> {
        Ok(RootSignatureId(self.next()))
    }
    fn create_graphics_pipeline(&self, _: &GraphicsPipelineDescriptor) -> Result<PipelineStateId, PipelineError> {
        Ok(PipelineStateId(self.next()))
    }
    fn create_compute_pipeline(&self, _: &ComputePipelineDescriptor) -> Result<PipelineStateId, PipelineError> {
        Ok(PipelineStateId(self.next()))
    }
    fn create_command_signature(&self, _: &CommandSignatureDescriptor) -> Result<CommandSignatureId, PipelineError> {
        Ok(CommandSignatureId(self.next()))
    }
    fn create_command_allocator(&self, _: CommandListType) -> Result<CommandAllocatorId, RenderError> {
        Ok(CommandAllocatorId(self.next()))
    }
    fn reset_command_allocator(&self, _: CommandAllocatorId) -> Result<(), RenderError> {
        Ok(())
    }
    fn create_command_list(&self, list_type: CommandListType) -> Result<Box<dyn CommandList>, RenderError> {
        Ok(Box::new(MockCommandList {
            list_type,
            recording: false,
        }))
    }
    fn create_command_queue(&self, list_type: CommandListType) -> Result<Arc<dyn CommandQueue>, RenderError> {
        Ok(self.mock_queue(list_type))
    }
    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>, RenderError> {
        Ok(Arc::new(MockFence {
            value: Mutex::new(initial_value),
            reached: Condvar::new(),
        }))
    }
    fn create_swap_chain(
        &self,
        _: &Arc<dyn CommandQueue>,
        _: &SwapChainDescriptor,
    ) -> Result<Box<dyn SwapChain>, RenderError> {
        unimplemented!("not used by frame pacing tests")
    }
}

#[derive(Debug)]
pub struct MockFence {
    value: Mutex<u64>,
    reached: Condvar,
}

impl Fence for MockFence {
    fn completed_value(&self) -> u64 {
        *self.value.lock().unwrap()
    }

    fn signal(&self, value: u64) {
        *self.value.lock().unwrap() = value;
        self.reached.notify_all();
    }

    fn wait_for_value(&self, value: u64, timeout: Option<Duration>) -> Result<(), RenderError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut current = self.value.lock().unwrap();
        while *current < value {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(RenderError::DeviceLost);
                    }
                    current = self.reached.wait_timeout(current, deadline - now).unwrap().0;
                }
                None => current = self.reached.wait(current).unwrap(),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockQueueState {
    paused: bool,
    pending: VecDeque<(Arc<dyn Fence>, u64)>,
    waits: Vec<u64>,
}

/// Signals immediately, or holds them back while paused.
#[derive(Debug)]
pub struct MockQueue {
    list_type: CommandListType,
    state: Mutex<MockQueueState>,
}

impl MockQueue {
    pub fn pause(&self) {
        self.state.lock().unwrap().paused = true;
    }

    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap();
        state.paused = false;
        while let Some((fence, value)) = state.pending.pop_front() {
            fence.signal(value);
        }
    }

    pub fn waits(&self) -> Vec<u64> {
        self.state.lock().unwrap().waits.clone()
    }
}

impl CommandQueue for MockQueue {
    fn list_type(&self) -> CommandListType {
        self.list_type
    }

    fn execute_command_lists(&self, lists: &[&dyn CommandList]) -> Result<(), RenderError> {
        assert!(lists.iter().all(|list| !list.is_recording()));
        Ok(())
    }

    fn signal(&self, fence: &Arc<dyn Fence>, value: u64) -> Result<(), RenderError> {
        let mut state = self.state.lock().unwrap();
        if state.paused {
            state.pending.push_back((Arc::clone(fence), value));
        } else {
            fence.signal(value);
        }
        Ok(())
    }

    fn wait(&self, _: &Arc<dyn Fence>, value: u64) -> Result<(), RenderError> {
        self.state.lock().unwrap().waits.push(value);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct MockCommandList {
    list_type: CommandListType,
    recording: bool,
}

impl CommandList for MockCommandList {
    fn list_type(&self) -> CommandListType {
        self.list_type
    }
    fn reset(&mut self, _: CommandAllocatorId) -> Result<(), RenderError> {
        self.recording = true;
        Ok(())
    }
    fn close(&mut self) -> Result<(), RenderError> {
        if !self.recording {
            return Err(RenderError::OrderingViolation("close without reset".to_string()));
        }
        self.recording = false;
        Ok(())
    }
    fn is_recording(&self) -> bool {
        self.recording
    }
    fn resource_barrier(&mut self, _: &[ResourceBarrier]) {}
    fn set_descriptor_heaps(&mut self, _: &[DescriptorHeapId]) {}
    fn set_viewport(&mut self, _: &Viewport) {}
    fn set_scissor_rect(&mut self, _: &ScissorRect) {}
    fn clear_render_target_view(&mut self, _: CpuDescriptorHandle, _: [f32; 4]) {}
    fn clear_depth_stencil_view(&mut self, _: CpuDescriptorHandle, _: f32) {}
    fn set_render_targets(&mut self, _: CpuDescriptorHandle, _: Option<CpuDescriptorHandle>) {}
    fn set_pipeline_state(&mut self, _: PipelineStateId) {}
    fn set_graphics_root_signature(&mut self, _: RootSignatureId) {}
    fn set_compute_root_signature(&mut self, _: RootSignatureId) {}
    fn set_primitive_topology(&mut self, _: PrimitiveTopology) {}
    fn set_graphics_root_32bit_constant(&mut self, _: u32, _: u32, _: u32) {}
    fn set_graphics_root_descriptor_table(&mut self, _: u32, _: GpuDescriptorHandle) {}
    fn set_compute_root_descriptor_table(&mut self, _: u32, _: GpuDescriptorHandle) {}
    fn set_compute_root_constant_buffer_view(&mut self, _: u32, _: GpuVirtualAddress) {}
    fn set_vertex_buffers(&mut self, _: u32, _: &[VertexBufferView]) {}
    fn set_index_buffer(&mut self, _: &IndexBufferView) {}
    fn draw_indexed_instanced(&mut self, _: u32, _: u32, _: u32, _: i32, _: u32) {}
    fn dispatch(&mut self, _: u32, _: u32, _: u32) {}
    fn execute_indirect(&mut self, _: CommandSignatureId, _: u32, _: ResourceId, _: u64, _: Option<ResourceId>, _: u64) {}
    fn copy_buffer_region(&mut self, _: ResourceId, _: u64, _: ResourceId, _: u64, _: u64) {}
    fn copy_buffer_to_texture(&mut self, _: ResourceId, _: ResourceId, _: u64, _: TextureCopyFootprint) {}
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
