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

use std::any::Any;
use std::sync::Arc;

use vesta_core::renderer::api::*;
use vesta_core::renderer::{CommandList, RenderError};

use super::device::SoftShared;

/// A recorded command, replayed by the queue that executes the list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Barriers(Vec<ResourceBarrier>),
    SetDescriptorHeaps(Vec<DescriptorHeapId>),
    SetViewport(Viewport),
    SetScissorRect(ScissorRect),
    ClearRenderTarget {
        rtv: CpuDescriptorHandle,
        colour: [f32; 4],
    },
    ClearDepth {
        dsv: CpuDescriptorHandle,
        depth: f32,
    },
    SetRenderTargets {
        rtv: CpuDescriptorHandle,
        dsv: Option<CpuDescriptorHandle>,
    },
    SetPipelineState(PipelineStateId),
    SetGraphicsRootSignature(RootSignatureId),
    SetComputeRootSignature(RootSignatureId),
    SetPrimitiveTopology(PrimitiveTopology),
    SetGraphicsConstant {
        parameter: u32,
        value: u32,
        dest_offset: u32,
    },
    SetGraphicsTable {
        parameter: u32,
        base: GpuDescriptorHandle,
    },
    SetComputeTable {
        parameter: u32,
        base: GpuDescriptorHandle,
    },
    SetComputeConstantBuffer {
        parameter: u32,
        address: GpuVirtualAddress,
    },
    SetVertexBuffers {
        start_slot: u32,
        views: Vec<VertexBufferView>,
    },
    SetIndexBuffer(IndexBufferView),
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    },
    Dispatch([u32; 3]),
    ExecuteIndirect {
        signature: CommandSignatureId,
        max_count: u32,
        argument_buffer: ResourceId,
        argument_offset: u64,
        count_buffer: Option<ResourceId>,
        count_offset: u64,
    },
    CopyBufferRegion {
        destination: ResourceId,
        destination_offset: u64,
        source: ResourceId,
        source_offset: u64,
        size: u64,
    },
    CopyBufferToTexture {
        destination: ResourceId,
        source: ResourceId,
        source_offset: u64,
        footprint: TextureCopyFootprint,
    },
}

impl Command {
    /// The narrowest queue type able to run the command.
    fn required_list_type(&self) -> CommandListType {
        match self {
            Command::Barriers(_) | Command::CopyBufferRegion { .. } | Command::CopyBufferToTexture { .. } => {
                CommandListType::Copy
            }
            Command::SetDescriptorHeaps(_)
            | Command::SetPipelineState(_)
            | Command::SetComputeRootSignature(_)
            | Command::SetComputeTable { .. }
            | Command::SetComputeConstantBuffer { .. }
            | Command::Dispatch(_) => CommandListType::Compute,
            _ => CommandListType::Direct,
        }
    }
}

fn supports(list_type: CommandListType, required: CommandListType) -> bool {
    match list_type {
        CommandListType::Direct => true,
        CommandListType::Compute => required != CommandListType::Direct,
        CommandListType::Copy => required == CommandListType::Copy,
    }
}

/// A closed command list, detached from its recorder for execution.
#[derive(Debug, Clone)]
pub(crate) struct RecordedList {
    pub(crate) allocator: CommandAllocatorId,
    pub(crate) list_type: CommandListType,
    pub(crate) commands: Vec<Command>,
}

/// Records commands into a plain vector; nothing runs until a queue executes it.
///
/// Misuse (recording while closed, graphics commands on a copy list, ...) does not
/// panic: the first problem is kept and reported by [`CommandList::close`].
#[derive(Debug)]
pub struct SoftCommandList {
    shared: Arc<SoftShared>,
    list_type: CommandListType,
    allocator: Option<CommandAllocatorId>,
    recording: bool,
    commands: Vec<Command>,
    misuse: Option<String>,
}

impl SoftCommandList {
    pub(crate) fn new(shared: Arc<SoftShared>, list_type: CommandListType) -> Self {
        Self {
            shared,
            list_type,
            allocator: None,
            recording: false,
            commands: Vec::new(),
            misuse: None,
        }
    }

    /// Number of commands recorded since the last reset.
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    fn record(&mut self, command: Command) {
        let problem = if !self.recording {
            Some(format!("{command:?} recorded into a closed {} list", self.list_type.name()))
        } else if !supports(self.list_type, command.required_list_type()) {
            Some(format!("{command:?} is not allowed on a {} list", self.list_type.name()))
        } else {
            None
        };
        match problem {
            Some(problem) => {
                log::error!("SoftCommandList: {problem}");
                self.misuse.get_or_insert(problem);
            }
            None => self.commands.push(command),
        }
    }

    pub(crate) fn detach(&self) -> Result<RecordedList, RenderError> {
        if self.recording {
            return Err(RenderError::OrderingViolation(format!(
                "An open {} command list was submitted",
                self.list_type.name()
            )));
        }
        let allocator = self.allocator.ok_or_else(|| {
            RenderError::OrderingViolation(format!(
                "A {} command list was submitted before it was ever recorded",
                self.list_type.name()
            ))
        })?;
        Ok(RecordedList {
            allocator,
            list_type: self.list_type,
            commands: self.commands.clone(),
        })
    }
}

impl CommandList for SoftCommandList {
    fn list_type(&self) -> CommandListType {
        self.list_type
    }

    fn reset(&mut self, allocator: CommandAllocatorId) -> Result<(), RenderError> {
        if self.recording {
            return Err(RenderError::OrderingViolation(format!(
                "{} command list reset while still recording",
                self.list_type.name()
            )));
        }
        let allocator_type = self.shared.allocator_type(allocator)?;
        if allocator_type != self.list_type {
            return Err(RenderError::OrderingViolation(format!(
                "{} allocator used to record a {} list",
                allocator_type.name(),
                self.list_type.name()
            )));
        }
        self.allocator = Some(allocator);
        self.commands.clear();
        self.misuse = None;
        self.recording = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), RenderError> {
        if !self.recording {
            return Err(RenderError::OrderingViolation(format!(
                "{} command list closed without a reset",
                self.list_type.name()
            )));
        }
        self.recording = false;
        match self.misuse.take() {
            Some(problem) => Err(RenderError::OrderingViolation(problem)),
            None => Ok(()),
        }
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn resource_barrier(&mut self, barriers: &[ResourceBarrier]) {
        self.record(Command::Barriers(barriers.to_vec()));
    }

    fn set_descriptor_heaps(&mut self, heaps: &[DescriptorHeapId]) {
        self.record(Command::SetDescriptorHeaps(heaps.to_vec()));
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.record(Command::SetViewport(*viewport));
    }

    fn set_scissor_rect(&mut self, rect: &ScissorRect) {
        self.record(Command::SetScissorRect(*rect));
    }

    fn clear_render_target_view(&mut self, rtv: CpuDescriptorHandle, colour: [f32; 4]) {
        self.record(Command::ClearRenderTarget { rtv, colour });
    }

    fn clear_depth_stencil_view(&mut self, dsv: CpuDescriptorHandle, depth: f32) {
        self.record(Command::ClearDepth { dsv, depth });
    }

    fn set_render_targets(&mut self, rtv: CpuDescriptorHandle, dsv: Option<CpuDescriptorHandle>) {
        self.record(Command::SetRenderTargets { rtv, dsv });
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineStateId) {
        self.record(Command::SetPipelineState(pipeline));
    }

    fn set_graphics_root_signature(&mut self, root_signature: RootSignatureId) {
        self.record(Command::SetGraphicsRootSignature(root_signature));
    }

    fn set_compute_root_signature(&mut self, root_signature: RootSignatureId) {
        self.record(Command::SetComputeRootSignature(root_signature));
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.record(Command::SetPrimitiveTopology(topology));
    }

    fn set_graphics_root_32bit_constant(&mut self, parameter_index: u32, value: u32, dest_offset: u32) {
        self.record(Command::SetGraphicsConstant {
            parameter: parameter_index,
            value,
            dest_offset,
        });
    }

    fn set_graphics_root_descriptor_table(&mut self, parameter_index: u32, base: GpuDescriptorHandle) {
        self.record(Command::SetGraphicsTable {
            parameter: parameter_index,
            base,
        });
    }

    fn set_compute_root_descriptor_table(&mut self, parameter_index: u32, base: GpuDescriptorHandle) {
        self.record(Command::SetComputeTable {
            parameter: parameter_index,
            base,
        });
    }

    fn set_compute_root_constant_buffer_view(&mut self, parameter_index: u32, address: GpuVirtualAddress) {
        self.record(Command::SetComputeConstantBuffer {
            parameter: parameter_index,
            address,
        });
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]) {
        self.record(Command::SetVertexBuffers {
            start_slot,
            views: views.to_vec(),
        });
    }

    fn set_index_buffer(&mut self, view: &IndexBufferView) {
        self.record(Command::SetIndexBuffer(*view));
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        self.record(Command::DrawIndexed {
            index_count: index_count_per_instance,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.record(Command::Dispatch([x, y, z]));
    }

    fn execute_indirect(
        &mut self,
        signature: CommandSignatureId,
        max_count: u32,
        argument_buffer: ResourceId,
        argument_offset: u64,
        count_buffer: Option<ResourceId>,
        count_offset: u64,
    ) {
        self.record(Command::ExecuteIndirect {
            signature,
            max_count,
            argument_buffer,
            argument_offset,
            count_buffer,
            count_offset,
        });
    }

    fn copy_buffer_region(
        &mut self,
        destination: ResourceId,
        destination_offset: u64,
        source: ResourceId,
        source_offset: u64,
        size: u64,
    ) {
        self.record(Command::CopyBufferRegion {
            destination,
            destination_offset,
            source,
            source_offset,
            size,
        });
    }

    fn copy_buffer_to_texture(
        &mut self,
        destination: ResourceId,
        source: ResourceId,
        source_offset: u64,
        footprint: TextureCopyFootprint,
    ) {
        self.record(Command::CopyBufferToTexture {
            destination,
            source,
            source_offset,
            footprint,
        });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::soft::SoftDevice;
    use vesta_core::renderer::GraphicsDevice;

    #[test]
    fn lists_start_closed() {
        let device = SoftDevice::new();
        let mut list = device.create_command_list(CommandListType::Direct).unwrap();
        assert!(!list.is_recording());
        assert!(matches!(list.close(), Err(RenderError::OrderingViolation(_))));
    }

    #[test]
    fn graphics_work_on_a_copy_list_fails_at_close() {
        let device = SoftDevice::new();
        let allocator = device.create_command_allocator(CommandListType::Copy).unwrap();
        let mut list = device.create_command_list(CommandListType::Copy).unwrap();

        list.reset(allocator).unwrap();
        list.draw_indexed_instanced(3, 1, 0, 0, 0);

        assert!(matches!(list.close(), Err(RenderError::OrderingViolation(_))));
    }

    #[test]
    fn allocator_type_must_match_the_list() {
        let device = SoftDevice::new();
        let allocator = device.create_command_allocator(CommandListType::Compute).unwrap();
        let mut list = device.create_command_list(CommandListType::Direct).unwrap();
        assert!(list.reset(allocator).is_err());
    }

    #[test]
    fn reset_clears_previous_commands() {
        let device = SoftDevice::new();
        let allocator = device.create_command_allocator(CommandListType::Compute).unwrap();
        let mut list = device.create_command_list(CommandListType::Compute).unwrap();

        list.reset(allocator).unwrap();
        list.dispatch(1, 1, 1);
        list.close().unwrap();
        list.reset(allocator).unwrap();

        let soft = list.as_any().downcast_ref::<SoftCommandList>().unwrap();
        assert_eq!(soft.command_count(), 0);
    }
}
