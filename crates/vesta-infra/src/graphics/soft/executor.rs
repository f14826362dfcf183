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

//! Replays recorded command lists against the software device's memory.

use std::sync::Arc;

use vesta_core::renderer::api::*;

use super::command_list::{Command, RecordedList};
use super::descriptors::SoftDescriptors;
use super::device::{SoftGpu, SoftPipeline};
use super::kernels::{ComputeKernel, KernelContext, RootArgument, RootArguments};
use super::state::StateTracker;
use super::stats::IndirectCall;

/// Pipeline state bound while a list executes. Nothing carries over between lists.
#[derive(Debug, Default)]
struct Bindings {
    descriptor_heaps: Vec<DescriptorHeapId>,
    pipeline: Option<PipelineStateId>,
    graphics_root: Option<RootSignatureId>,
    compute_root: Option<RootSignatureId>,
    graphics_arguments: RootArguments,
    compute_arguments: RootArguments,
    vertex_buffers: Vec<Option<VertexBufferView>>,
    index_buffer: Option<IndexBufferView>,
    render_target: Option<CpuDescriptorHandle>,
    viewport: bool,
    scissor: bool,
}

pub(crate) struct Executor<'a> {
    gpu: &'a mut SoftGpu,
    list_type: CommandListType,
    tracker: StateTracker,
    bindings: Bindings,
}

fn colour_bytes(format: TextureFormat, colour: [f32; 4]) -> Vec<u8> {
    let unorm = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    let [r, g, b, a] = colour.map(unorm);
    match format {
        TextureFormat::Rgba8Unorm => vec![r, g, b, a],
        TextureFormat::Bgra8Unorm => vec![b, g, r, a],
        TextureFormat::D32Float => colour[0].to_ne_bytes().to_vec(),
    }
}

impl<'a> Executor<'a> {
    pub(crate) fn new(gpu: &'a mut SoftGpu, list_type: CommandListType) -> Self {
        Self {
            gpu,
            list_type,
            tracker: StateTracker::new(list_type),
            bindings: Bindings::default(),
        }
    }

    /// Executes every command of `list`, reporting problems as validation errors.
    pub(crate) fn run(mut self, list: &RecordedList) {
        for command in &list.commands {
            if let Err(message) = self.execute(command) {
                self.gpu
                    .stats
                    .report(format!("{} list, {}: {message}", self.list_type.name(), command_name(command)));
            }
        }
        self.tracker.finish(&mut self.gpu.memory);
        self.gpu.stats.command_lists += 1;
    }

    fn execute(&mut self, command: &Command) -> Result<(), String> {
        match command {
            Command::Barriers(barriers) => {
                let mut problems = Vec::new();
                for barrier in barriers {
                    if let Err(problem) = self.tracker.transition(&self.gpu.memory, barrier) {
                        problems.push(problem);
                    }
                }
                if problems.is_empty() {
                    Ok(())
                } else {
                    Err(problems.join("; "))
                }
            }
            Command::SetDescriptorHeaps(heaps) => {
                for heap in heaps {
                    let visible = self
                        .gpu
                        .descriptors
                        .heap(heap.0)
                        .is_some_and(|heap| heap.shader_visible);
                    if !visible {
                        return Err(format!("{heap:?} is not a live shader-visible heap"));
                    }
                }
                self.bindings.descriptor_heaps = heaps.clone();
                Ok(())
            }
            Command::SetViewport(_) => {
                self.bindings.viewport = true;
                Ok(())
            }
            Command::SetScissorRect(_) => {
                self.bindings.scissor = true;
                Ok(())
            }
            Command::ClearRenderTarget { rtv, colour } => {
                let Some(ViewDescriptor::RenderTarget { resource }) = self.gpu.descriptors.view_at_cpu(*rtv) else {
                    return Err(format!("{rtv:?} holds no render target view"));
                };
                self.tracker
                    .require(&self.gpu.memory, resource, ResourceState::RenderTarget)?;
                let format = self.texture_format(resource)?;
                self.gpu
                    .memory
                    .fill(resource, &colour_bytes(format, *colour))
                    .map_err(|err| err.to_string())?;
                self.gpu.stats.render_target_clears += 1;
                Ok(())
            }
            Command::ClearDepth { dsv, depth } => {
                let Some(ViewDescriptor::DepthStencil { resource }) = self.gpu.descriptors.view_at_cpu(*dsv) else {
                    return Err(format!("{dsv:?} holds no depth-stencil view"));
                };
                self.tracker.require(&self.gpu.memory, resource, ResourceState::DepthWrite)?;
                self.gpu
                    .memory
                    .fill(resource, &depth.to_ne_bytes())
                    .map_err(|err| err.to_string())?;
                self.gpu.stats.depth_clears += 1;
                Ok(())
            }
            Command::SetRenderTargets { rtv, dsv } => {
                let Some(ViewDescriptor::RenderTarget { resource }) = self.gpu.descriptors.view_at_cpu(*rtv) else {
                    return Err(format!("{rtv:?} holds no render target view"));
                };
                self.tracker
                    .require(&self.gpu.memory, resource, ResourceState::RenderTarget)?;
                if let Some(dsv) = dsv {
                    let Some(ViewDescriptor::DepthStencil { resource }) = self.gpu.descriptors.view_at_cpu(*dsv) else {
                        return Err(format!("{dsv:?} holds no depth-stencil view"));
                    };
                    self.tracker.require(&self.gpu.memory, resource, ResourceState::DepthWrite)?;
                }
                self.bindings.render_target = Some(*rtv);
                Ok(())
            }
            Command::SetPipelineState(pipeline) => {
                if !self.gpu.pipelines.contains_key(&pipeline.0) {
                    return Err(format!("{pipeline:?} is not a live pipeline"));
                }
                self.bindings.pipeline = Some(*pipeline);
                Ok(())
            }
            Command::SetGraphicsRootSignature(root) => {
                self.root_layout(*root)?;
                self.bindings.graphics_root = Some(*root);
                self.bindings.graphics_arguments.clear();
                Ok(())
            }
            Command::SetComputeRootSignature(root) => {
                self.root_layout(*root)?;
                self.bindings.compute_root = Some(*root);
                self.bindings.compute_arguments.clear();
                Ok(())
            }
            Command::SetPrimitiveTopology(_) => Ok(()),
            Command::SetGraphicsConstant {
                parameter,
                value,
                dest_offset,
            } => {
                let root = self.bindings.graphics_root.ok_or("no graphics root signature bound")?;
                let Some(RootParameter::Constants { num_32bit_values, .. }) =
                    self.root_layout(root)?.get(*parameter as usize)
                else {
                    return Err(format!("root parameter {parameter} does not hold constants"));
                };
                if dest_offset >= num_32bit_values {
                    return Err(format!("constant {dest_offset} is past the {num_32bit_values} declared"));
                }
                let count = *num_32bit_values as usize;
                let entry = self
                    .bindings
                    .graphics_arguments
                    .entry(*parameter)
                    .or_insert_with(|| RootArgument::Constants(vec![0; count]));
                if let RootArgument::Constants(values) = entry {
                    values[*dest_offset as usize] = *value;
                }
                Ok(())
            }
            Command::SetGraphicsTable { parameter, base } => {
                let root = self.bindings.graphics_root.ok_or("no graphics root signature bound")?;
                self.check_table(root, *parameter, *base)?;
                self.bindings
                    .graphics_arguments
                    .insert(*parameter, RootArgument::Table(*base));
                Ok(())
            }
            Command::SetComputeTable { parameter, base } => {
                let root = self.bindings.compute_root.ok_or("no compute root signature bound")?;
                self.check_table(root, *parameter, *base)?;
                self.bindings
                    .compute_arguments
                    .insert(*parameter, RootArgument::Table(*base));
                Ok(())
            }
            Command::SetComputeConstantBuffer { parameter, address } => {
                let root = self.bindings.compute_root.ok_or("no compute root signature bound")?;
                if !matches!(
                    self.root_layout(root)?.get(*parameter as usize),
                    Some(RootParameter::ConstantBufferView { .. })
                ) {
                    return Err(format!("root parameter {parameter} is not a constant buffer view"));
                }
                self.bindings
                    .compute_arguments
                    .insert(*parameter, RootArgument::ConstantBuffer(*address));
                Ok(())
            }
            Command::SetVertexBuffers { start_slot, views } => {
                for (i, view) in views.iter().enumerate() {
                    if let Some((resource, _)) = self.gpu.memory.resource_at(view.address) {
                        self.tracker
                            .require(&self.gpu.memory, resource, ResourceState::VertexAndConstantBuffer)?;
                    } else {
                        return Err(format!("vertex buffer address {:#x} is not mapped", view.address.0));
                    }
                    let slot = *start_slot as usize + i;
                    if self.bindings.vertex_buffers.len() <= slot {
                        self.bindings.vertex_buffers.resize(slot + 1, None);
                    }
                    self.bindings.vertex_buffers[slot] = Some(*view);
                }
                Ok(())
            }
            Command::SetIndexBuffer(view) => {
                let Some((resource, _)) = self.gpu.memory.resource_at(view.address) else {
                    return Err(format!("index buffer address {:#x} is not mapped", view.address.0));
                };
                self.tracker
                    .require(&self.gpu.memory, resource, ResourceState::IndexBuffer)?;
                self.bindings.index_buffer = Some(*view);
                Ok(())
            }
            Command::DrawIndexed {
                index_count,
                instance_count,
                start_index,
                ..
            } => {
                self.check_draw_state(None, true)?;
                self.check_index_range(*start_index, *index_count)?;
                if *instance_count == 0 {
                    return Err("draw with zero instances".to_string());
                }
                self.gpu.stats.draw_indexed += 1;
                Ok(())
            }
            Command::Dispatch(groups) => self.dispatch(*groups),
            Command::ExecuteIndirect {
                signature,
                max_count,
                argument_buffer,
                argument_offset,
                count_buffer,
                count_offset,
            } => self.execute_indirect(
                *signature,
                *max_count,
                *argument_buffer,
                *argument_offset,
                *count_buffer,
                *count_offset,
            ),
            Command::CopyBufferRegion {
                destination,
                destination_offset,
                source,
                source_offset,
                size,
            } => {
                self.tracker
                    .require(&self.gpu.memory, *destination, ResourceState::CopyDest)?;
                self.tracker.require(&self.gpu.memory, *source, ResourceState::CopySource)?;
                self.gpu
                    .memory
                    .copy(*destination, *destination_offset, *source, *source_offset, *size)
                    .map_err(|err| err.to_string())?;
                self.gpu.stats.copies += 1;
                Ok(())
            }
            Command::CopyBufferToTexture {
                destination,
                source,
                source_offset,
                footprint,
            } => {
                let texture = self.gpu.memory.resource(*destination).map_err(|err| err.to_string())?;
                let ResourceDimension::Texture2D { width, height, format } = texture.dimension else {
                    return Err(format!("'{}' is not a texture", texture.label));
                };
                if (width, height, format.bytes_per_pixel())
                    != (footprint.width, footprint.height, footprint.pixel_stride)
                {
                    return Err(format!("footprint {footprint:?} does not match '{}'", texture.label));
                }
                self.tracker
                    .require(&self.gpu.memory, *destination, ResourceState::CopyDest)?;
                self.tracker.require(&self.gpu.memory, *source, ResourceState::CopySource)?;
                let row_size = footprint.row_size();
                for row in 0..u64::from(footprint.height) {
                    self.gpu
                        .memory
                        .copy(
                            *destination,
                            row * row_size,
                            *source,
                            source_offset + row * footprint.row_pitch,
                            row_size,
                        )
                        .map_err(|err| err.to_string())?;
                }
                self.gpu.stats.copies += 1;
                Ok(())
            }
        }
    }

    fn texture_format(&self, resource: ResourceId) -> Result<TextureFormat, String> {
        match self.gpu.memory.resource(resource).map_err(|err| err.to_string())?.dimension {
            ResourceDimension::Texture2D { format, .. } => Ok(format),
            ResourceDimension::Buffer { .. } => Err(format!("{resource:?} is not a texture")),
        }
    }

    fn root_layout(&self, root: RootSignatureId) -> Result<&[RootParameter], String> {
        self.gpu
            .root_signatures
            .get(&root.0)
            .map(|signature| signature.parameters.as_slice())
            .ok_or_else(|| format!("{root:?} is not a live root signature"))
    }

    fn check_table(&self, root: RootSignatureId, parameter: u32, base: GpuDescriptorHandle) -> Result<(), String> {
        if !matches!(
            self.root_layout(root)?.get(parameter as usize),
            Some(RootParameter::DescriptorTable { .. })
        ) {
            return Err(format!("root parameter {parameter} is not a descriptor table"));
        }
        let heap = SoftDescriptors::heap_of(base).ok_or_else(|| format!("malformed table handle {base:?}"))?;
        if !self.bindings.descriptor_heaps.contains(&DescriptorHeapId(heap)) {
            return Err(format!("table handle {base:?} points into a heap that is not bound"));
        }
        Ok(())
    }

    /// Checks everything a draw needs. `signature_root` is the root signature an
    /// indirect command signature was created against. An indirect call that can never
    /// draw (`max_count == 0`) does not need vertex input.
    fn check_draw_state(&self, signature_root: Option<RootSignatureId>, needs_vertices: bool) -> Result<(), String> {
        let pipeline = self.bindings.pipeline.ok_or("no pipeline bound")?;
        let Some(SoftPipeline::Graphics {
            root_signature,
            vertex_stride,
            ..
        }) = self.gpu.pipelines.get(&pipeline.0)
        else {
            return Err(format!("{pipeline:?} is not a graphics pipeline"));
        };
        if self.bindings.graphics_root != Some(*root_signature) {
            return Err("the bound graphics root signature does not match the pipeline".to_string());
        }
        if signature_root.is_some_and(|root| root != *root_signature) {
            return Err("the command signature was created for another root signature".to_string());
        }
        if self.bindings.render_target.is_none() {
            return Err("no render target bound".to_string());
        }
        if !(self.bindings.viewport && self.bindings.scissor) {
            return Err("viewport or scissor rectangle not set".to_string());
        }
        if needs_vertices && *vertex_stride > 0 && self.bindings.vertex_buffers.first().copied().flatten().is_none() {
            return Err("no vertex buffer bound to slot 0".to_string());
        }
        Ok(())
    }

    fn check_index_range(&self, start_index: u32, index_count: u32) -> Result<(), String> {
        let view = self.bindings.index_buffer.ok_or("no index buffer bound")?;
        let end = (u64::from(start_index) + u64::from(index_count)) * u64::from(view.format.size());
        if end > u64::from(view.size_in_bytes) {
            return Err(format!(
                "indices {start_index}..{} overrun a {}-byte index buffer",
                u64::from(start_index) + u64::from(index_count),
                view.size_in_bytes
            ));
        }
        Ok(())
    }

    fn dispatch(&mut self, groups: [u32; 3]) -> Result<(), String> {
        let pipeline = self.bindings.pipeline.ok_or("no pipeline bound")?;
        let Some(SoftPipeline::Compute {
            root_signature,
            kernel,
            ..
        }) = self.gpu.pipelines.get(&pipeline.0)
        else {
            return Err(format!("{pipeline:?} is not a compute pipeline"));
        };
        if self.bindings.compute_root != Some(*root_signature) {
            return Err("the bound compute root signature does not match the pipeline".to_string());
        }
        let kernel: Arc<dyn ComputeKernel> = Arc::clone(kernel);
        let root = *root_signature;

        self.gpu.stats.dispatches += 1;
        let total = u64::from(groups[0]) * u64::from(groups[1]) * u64::from(groups[2]);
        self.gpu.stats.dispatched_groups += total;
        if total == 0 {
            return Ok(());
        }

        let SoftGpu {
            memory,
            descriptors,
            root_signatures,
            ..
        } = &mut *self.gpu;
        let layout = root_signatures
            .get(&root.0)
            .map(|signature| signature.parameters.as_slice())
            .ok_or_else(|| format!("{root:?} is not a live root signature"))?;
        let mut context = KernelContext {
            memory,
            descriptors,
            tracker: &mut self.tracker,
            layout,
            arguments: &self.bindings.compute_arguments,
        };
        kernel
            .dispatch(&mut context, groups)
            .map_err(|err| format!("kernel '{}' failed: {err}", kernel.name()))
    }

    fn execute_indirect(
        &mut self,
        signature: CommandSignatureId,
        max_count: u32,
        argument_buffer: ResourceId,
        argument_offset: u64,
        count_buffer: Option<ResourceId>,
        count_offset: u64,
    ) -> Result<(), String> {
        let layout = self
            .gpu
            .command_signatures
            .get(&signature.0)
            .cloned()
            .ok_or_else(|| format!("{signature:?} is not a live command signature"))?;
        self.check_draw_state(layout.root_signature, max_count > 0)?;
        self.tracker
            .require(&self.gpu.memory, argument_buffer, ResourceState::IndirectArgument)?;

        let live_count = match count_buffer {
            Some(count_buffer) => {
                self.tracker
                    .require(&self.gpu.memory, count_buffer, ResourceState::IndirectArgument)?;
                let bytes = self
                    .gpu
                    .memory
                    .read(count_buffer, count_offset, 4)
                    .map_err(|err| err.to_string())?;
                bytemuck::pod_read_unaligned::<u32>(bytes)
            }
            None => max_count,
        };
        let executed = live_count.min(max_count);
        let mut call = IndirectCall {
            max_count,
            live_count,
            executed,
            model_indices: Vec::with_capacity(executed as usize),
        };

        for i in 0..u64::from(executed) {
            let start = argument_offset + i * u64::from(layout.byte_stride);
            let bytes = self
                .gpu
                .memory
                .read(argument_buffer, start, u64::from(layout.byte_stride))
                .map_err(|err| err.to_string())?
                .to_vec();
            let mut cursor = 0usize;
            for argument in &layout.arguments {
                let size = argument.byte_size() as usize;
                let chunk = &bytes[cursor..cursor + size];
                match argument {
                    IndirectArgument::Constant { .. } => {
                        call.model_indices.push(bytemuck::pod_read_unaligned(&chunk[0..4]));
                    }
                    IndirectArgument::DrawIndexed => {
                        let draw: DrawIndexedArguments = bytemuck::pod_read_unaligned(chunk);
                        self.check_index_range(draw.start_index_location, draw.index_count_per_instance)?;
                    }
                }
                cursor += size;
            }
        }
        self.gpu.stats.indirect_calls.push(call);
        Ok(())
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Barriers(_) => "ResourceBarrier",
        Command::SetDescriptorHeaps(_) => "SetDescriptorHeaps",
        Command::SetViewport(_) => "RSSetViewports",
        Command::SetScissorRect(_) => "RSSetScissorRects",
        Command::ClearRenderTarget { .. } => "ClearRenderTargetView",
        Command::ClearDepth { .. } => "ClearDepthStencilView",
        Command::SetRenderTargets { .. } => "OMSetRenderTargets",
        Command::SetPipelineState(_) => "SetPipelineState",
        Command::SetGraphicsRootSignature(_) => "SetGraphicsRootSignature",
        Command::SetComputeRootSignature(_) => "SetComputeRootSignature",
        Command::SetPrimitiveTopology(_) => "IASetPrimitiveTopology",
        Command::SetGraphicsConstant { .. } => "SetGraphicsRoot32BitConstant",
        Command::SetGraphicsTable { .. } => "SetGraphicsRootDescriptorTable",
        Command::SetComputeTable { .. } => "SetComputeRootDescriptorTable",
        Command::SetComputeConstantBuffer { .. } => "SetComputeRootConstantBufferView",
        Command::SetVertexBuffers { .. } => "IASetVertexBuffers",
        Command::SetIndexBuffer(_) => "IASetIndexBuffer",
        Command::DrawIndexed { .. } => "DrawIndexedInstanced",
        Command::Dispatch(_) => "Dispatch",
        Command::ExecuteIndirect { .. } => "ExecuteIndirect",
        Command::CopyBufferRegion { .. } => "CopyBufferRegion",
        Command::CopyBufferToTexture { .. } => "CopyTextureRegion",
    }
}
