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

use super::{culling_group_count, CullingData, GeometryPlacement, Model, RenderTargetFormats, INDIRECT_CULLING_SHADER};
use std::path::Path;
use std::sync::Arc;
use vesta_core::math::{AxisBounds, Float3};
use vesta_core::renderer::api::{
    self as api, align_up, CommandSignatureDescriptor, CommandSignatureId, ComputePipelineDescriptor,
    DescriptorRangeType, GpuVirtualAddress, GraphicsPipelineDescriptor, HeapType, IndirectArgument, IndirectCommand,
    PipelineStateId, PrimitiveTopology, ResourceBarrier, ResourceDescriptor, ResourceFlags, ResourceId,
    ResourceState, RootParameter, RootSignatureDescriptor, RootSignatureId, ShaderVisibility, VertexElementType,
    VertexLayout, ViewDescriptor,
};
use vesta_core::renderer::{CommandList, GraphicsDevice, RenderError, ResourceError};
use vesta_data::allocators::{HeapPools, PlacedResource};
use vesta_data::buffers::UploadableBuffer;
use vesta_data::descriptors::{DescriptorRange, DescriptorTableManager};

/// Vertex shader of indirect draws.
pub const INDIRECT_VERTEX_SHADER: &str = "VSIndirect";
/// Pixel shader of indirect draws.
pub const INDIRECT_PIXEL_SHADER: &str = "PSIndirect";

/// Alignment of the append counter behind the culled commands.
pub const COUNTER_ALIGNMENT: u64 = 4096;
const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;
const POSITION_STRIDE: u32 = std::mem::size_of::<Float3>() as u32;
const COUNTER_SIZE: u64 = std::mem::size_of::<u32>() as u64;

const SRV_TABLE_PARAMETER: u32 = 0;
const UAV_TABLE_PARAMETER: u32 = 1;
const CULLING_DATA_PARAMETER: u32 = 2;
const MODEL_INDEX_PARAMETER: u32 = 0;

#[derive(Debug)]
struct PipelineObjects {
    compute_root: RootSignatureId,
    compute_pipeline: PipelineStateId,
    graphics_root: RootSignatureId,
    graphics_pipeline: PipelineStateId,
    command_signature: CommandSignatureId,
}

#[derive(Debug)]
struct CullingBuffers {
    srv_range: DescriptorRange,
    uav_range: DescriptorRange,
    commands: UploadableBuffer,
    positions: UploadableBuffer,
    outputs: Vec<PlacedResource>,
    counter_reset: PlacedResource,
    culling_data: PlacedResource,
    culling_address: GpuVirtualAddress,
}

/// GPU-driven drawing of every registered model.
///
/// Each model contributes one [`IndirectCommand`]. Every frame a compute pass copies
/// the commands whose model position lies inside the culling bounds into that frame's
/// output buffer, counting them in an append counter placed behind the commands, and
/// the graphics pass then runs a single `execute_indirect` bounded by that counter.
///
/// Setup happens in this order: [`IndirectPipeline::record_indirect_arguments`] for
/// every model, [`IndirectPipeline::reserve_buffers`] before the heaps and descriptor
/// table are created, [`IndirectPipeline::create_buffers`] after, then
/// [`IndirectPipeline::record_resource_upload`] and, once the copy executed,
/// [`IndirectPipeline::release_upload_resource`].
///
/// Per frame, on the compute list: [`IndirectPipeline::reset_counter_buffer`],
/// [`IndirectPipeline::bind_compute_pipeline`], [`IndirectPipeline::dispatch_compute`];
/// on the graphics list, after a GPU wait on the compute queue:
/// [`IndirectPipeline::bind_graphics_pipeline`], [`IndirectPipeline::draw_models`].
#[derive(Debug)]
pub struct IndirectPipeline {
    frame_count: usize,
    culling_bounds: AxisBounds,
    model_count: u32,
    commands: Vec<IndirectCommand>,
    positions: Vec<Float3>,
    vertex_layout: Option<VertexLayout>,
    buffers: Option<CullingBuffers>,
    objects: Option<PipelineObjects>,
}

impl IndirectPipeline {
    /// Creates a pipeline with one output buffer per frame in flight.
    pub fn new(frame_count: usize, culling_bounds: AxisBounds) -> Self {
        Self {
            frame_count: frame_count.max(1),
            culling_bounds,
            model_count: 0,
            commands: Vec::new(),
            positions: Vec::new(),
            vertex_layout: None,
            buffers: None,
            objects: None,
        }
    }

    /// Number of models drawn.
    pub fn model_count(&self) -> u32 {
        self.model_count
    }

    /// Byte offset of the append counter in each output buffer.
    pub fn counter_offset(&self) -> u64 {
        align_up(u64::from(self.model_count) * u64::from(IndirectCommand::STRIDE), COUNTER_ALIGNMENT)
    }

    /// The vertex layout shared by every model, once one was recorded.
    pub fn vertex_layout(&self) -> Option<&VertexLayout> {
        self.vertex_layout.as_ref()
    }

    /// The output buffer of `frame_index`, once created.
    pub fn argument_buffer(&self, frame_index: usize) -> Option<ResourceId> {
        self.buffers
            .as_ref()
            .and_then(|buffers| buffers.outputs.get(frame_index))
            .and_then(PlacedResource::resource)
    }

    /// Records one command per model.
    ///
    /// Indirect draws bind a single vertex buffer, so every model must share the vertex
    /// layout of the first one.
    /// ## Errors
    /// * `RenderError::IncompatibleModel` - If a model's layout differs.
    /// * `RenderError::OrderingViolation` - If the buffers were already reserved.
    pub fn record_indirect_arguments(
        &mut self,
        models: &[(Arc<dyn Model>, GeometryPlacement)],
    ) -> Result<(), RenderError> {
        if self.buffers.is_some() {
            return Err(RenderError::OrderingViolation(
                "IndirectPipeline: models recorded after the buffers were reserved".to_string(),
            ));
        }

        for (model, placement) in models {
            let layout = model.vertex_layout();
            let expected = self.vertex_layout.get_or_insert_with(|| layout.clone());
            if *expected != layout {
                return Err(RenderError::IncompatibleModel(format!(
                    "IndirectPipeline: vertex stride {} differs from the {} of the first model",
                    layout.stride(),
                    expected.stride()
                )));
            }

            let model_index = self.commands.len() as u32;
            self.commands.push(IndirectCommand::new(
                model_index,
                model.index_count(),
                placement.start_index(),
                placement.base_vertex(layout.stride()),
            ));
            self.positions.push(model.position());
        }
        self.model_count += models.len() as u32;
        Ok(())
    }

    /// Reserves the descriptor slots and heap space of every buffer.
    ///
    /// The table gets two contiguous SRV slots (commands, positions) and one UAV slot per
    /// frame.
    pub fn reserve_buffers(
        &mut self,
        device: &dyn GraphicsDevice,
        pools: &mut HeapPools,
        table: &mut DescriptorTableManager,
    ) -> Result<(), ResourceError> {
        let commands_size = (u64::from(self.model_count) * u64::from(IndirectCommand::STRIDE))
            .max(u64::from(IndirectCommand::STRIDE));
        let positions_size =
            (u64::from(self.model_count) * u64::from(POSITION_STRIDE)).max(u64::from(POSITION_STRIDE));
        let output_size = self.counter_offset() + COUNTER_SIZE;

        let mut buffers = CullingBuffers {
            srv_range: table.reserve_descriptors(2),
            uav_range: table.reserve_descriptors(self.frame_count),
            commands: UploadableBuffer::new("indirect commands", commands_size, ResourceFlags::NONE),
            positions: UploadableBuffer::new("model positions", positions_size, ResourceFlags::NONE),
            outputs: (0..self.frame_count)
                .map(|frame| {
                    PlacedResource::new(
                        HeapType::GpuOnly,
                        ResourceDescriptor::buffer(format!("culled commands {frame}"), output_size)
                            .with_flags(ResourceFlags::ALLOW_UNORDERED_ACCESS),
                    )
                })
                .collect(),
            counter_reset: PlacedResource::new(
                HeapType::CpuWrite,
                ResourceDescriptor::buffer("counter reset", COUNTER_SIZE),
            ),
            culling_data: PlacedResource::new(
                HeapType::CpuWrite,
                ResourceDescriptor::buffer(
                    "culling data",
                    align_up(std::mem::size_of::<CullingData>() as u64, CONSTANT_BUFFER_ALIGNMENT),
                ),
            ),
            culling_address: GpuVirtualAddress::default(),
        };

        buffers.commands.reserve(device, pools)?;
        buffers.positions.reserve(device, pools)?;
        for output in &mut buffers.outputs {
            output.reserve(device, pools)?;
        }
        buffers.counter_reset.reserve(device, pools)?;
        buffers.culling_data.reserve(device, pools)?;

        log::debug!(
            "IndirectPipeline: reserved buffers for {} models over {} frames",
            self.model_count,
            self.frame_count
        );
        self.buffers = Some(buffers);
        Ok(())
    }

    /// Places every buffer, writes their views into the staging table and fills the
    /// mapped memory with the commands, positions, culling data and a zero counter.
    pub fn create_buffers(&mut self, device: &dyn GraphicsDevice, pools: &HeapPools) -> Result<(), ResourceError> {
        let model_count = self.model_count;
        let counter_offset = self.counter_offset();
        let culling = CullingData::new(model_count, &self.culling_bounds);
        let buffers = self.buffers.as_mut().ok_or(ResourceError::HeapNotCreated(HeapType::GpuOnly))?;

        buffers.commands.place(device, pools)?;
        buffers.positions.place(device, pools)?;
        for output in &mut buffers.outputs {
            output.place(device, pools, ResourceState::Common)?;
        }
        buffers.counter_reset.place(device, pools, ResourceState::GenericRead)?;
        buffers.culling_data.place(device, pools, ResourceState::GenericRead)?;
        buffers.culling_address = buffers.culling_data.gpu_address(device)?;

        device.create_view(
            &ViewDescriptor::BufferSrv {
                resource: buffers.commands.gpu_resource()?,
                first_element: 0,
                element_count: model_count,
                stride: IndirectCommand::STRIDE,
            },
            buffers.srv_range.cpu_handle(0),
        )?;
        device.create_view(
            &ViewDescriptor::BufferSrv {
                resource: buffers.positions.gpu_resource()?,
                first_element: 0,
                element_count: model_count,
                stride: POSITION_STRIDE,
            },
            buffers.srv_range.cpu_handle(1),
        )?;
        for (frame, output) in buffers.outputs.iter().enumerate() {
            device.create_view(
                &ViewDescriptor::BufferUav {
                    resource: output.try_resource()?,
                    first_element: 0,
                    element_count: model_count,
                    stride: IndirectCommand::STRIDE,
                    counter_offset: Some(counter_offset),
                },
                buffers.uav_range.cpu_handle(frame),
            )?;
        }

        buffers.culling_data.write(device, 0, bytemuck::bytes_of(&culling))?;
        buffers.counter_reset.write(device, 0, bytemuck::bytes_of(&0u32))?;
        buffers.commands.write(device, 0, bytemuck::cast_slice(&self.commands))?;
        buffers.positions.write(device, 0, bytemuck::cast_slice(&self.positions))?;

        self.commands = Vec::new();
        self.positions = Vec::new();
        log::debug!("IndirectPipeline: buffers created, counter at offset {counter_offset}");
        Ok(())
    }

    /// Records the copies of the commands and positions into their GPU-only buffers.
    pub fn record_resource_upload(&self, list: &mut dyn CommandList) -> Result<(), ResourceError> {
        let buffers = self.buffers.as_ref().ok_or(ResourceError::HeapNotCreated(HeapType::Upload))?;
        buffers.commands.record_upload(list)?;
        buffers.positions.record_upload(list)
    }

    /// Frees the upload halves. The recorded copies must have executed.
    pub fn release_upload_resource(&mut self, device: &dyn GraphicsDevice) {
        if let Some(buffers) = self.buffers.as_mut() {
            buffers.commands.release_upload(device);
            buffers.positions.release_upload(device);
        }
    }

    /// Creates the culling compute pipeline, the indirect graphics pipeline and the
    /// command signature.
    ///
    /// ## Arguments
    /// * `graphics_root` - The model root signature; its parameter 0 receives each
    ///   command's model index.
    pub fn create_pipeline_objects(
        &mut self,
        device: &dyn GraphicsDevice,
        shader_path: &Path,
        graphics_root: RootSignatureId,
        formats: RenderTargetFormats,
    ) -> Result<(), RenderError> {
        let table = |range_type: DescriptorRangeType, count: u32| RootParameter::DescriptorTable {
            ranges: vec![api::DescriptorRange {
                range_type,
                count,
                base_register: 0,
            }],
            visibility: ShaderVisibility::All,
        };
        let compute_root = device.create_root_signature(&RootSignatureDescriptor {
            label: Some("culling root signature"),
            parameters: vec![
                table(DescriptorRangeType::Srv, 2),
                table(DescriptorRangeType::Uav, 1),
                RootParameter::ConstantBufferView {
                    register: 0,
                    visibility: ShaderVisibility::All,
                },
            ],
            allow_input_assembler: false,
        })?;

        let culling_shader = device
            .load_shader(shader_path, INDIRECT_CULLING_SHADER)
            .map_err(ResourceError::from)?;
        let compute_pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("culling pipeline"),
            root_signature: compute_root,
            shader: &culling_shader,
        })?;

        let vertex_layout = self
            .vertex_layout
            .clone()
            .unwrap_or_else(|| VertexLayout::new(&[VertexElementType::Position]));
        let vertex_shader = device
            .load_shader(shader_path, INDIRECT_VERTEX_SHADER)
            .map_err(ResourceError::from)?;
        let pixel_shader = device
            .load_shader(shader_path, INDIRECT_PIXEL_SHADER)
            .map_err(ResourceError::from)?;
        let graphics_pipeline = device.create_graphics_pipeline(&GraphicsPipelineDescriptor {
            label: Some("indirect pipeline"),
            root_signature: graphics_root,
            vertex_shader: &vertex_shader,
            pixel_shader: &pixel_shader,
            vertex_layout: &vertex_layout,
            topology: PrimitiveTopology::TriangleList,
            render_target_format: formats.render_target,
            depth_format: formats.depth,
        })?;

        let command_signature = device.create_command_signature(&CommandSignatureDescriptor {
            label: Some("indirect command signature"),
            byte_stride: IndirectCommand::STRIDE,
            arguments: &[
                IndirectArgument::Constant {
                    root_parameter_index: MODEL_INDEX_PARAMETER,
                    dest_offset_in_32bit_values: 0,
                    num_32bit_values: 1,
                },
                IndirectArgument::DrawIndexed,
            ],
            root_signature: Some(graphics_root),
        })?;

        self.objects = Some(PipelineObjects {
            compute_root,
            compute_pipeline,
            graphics_root,
            graphics_pipeline,
            command_signature,
        });
        log::info!("IndirectPipeline: pipeline objects created");
        Ok(())
    }

    fn parts(&self) -> Result<(&CullingBuffers, &PipelineObjects), RenderError> {
        match (&self.buffers, &self.objects) {
            (Some(buffers), Some(objects)) => Ok((buffers, objects)),
            _ => Err(RenderError::NotInitialized("indirect pipeline")),
        }
    }

    fn output(buffers: &CullingBuffers, frame_index: usize) -> Result<ResourceId, RenderError> {
        let output = buffers.outputs.get(frame_index).ok_or_else(|| {
            RenderError::Internal(format!("IndirectPipeline: no output buffer for frame {frame_index}"))
        })?;
        Ok(output.try_resource()?)
    }

    /// Zeroes the append counter of `frame_index` with a GPU copy and makes the output
    /// buffer writable by the compute pass.
    pub fn reset_counter_buffer(&self, list: &mut dyn CommandList, frame_index: usize) -> Result<(), RenderError> {
        let (buffers, _) = self.parts()?;
        let output = Self::output(buffers, frame_index)?;
        // Promotes the output buffer from common to copy destination.
        list.copy_buffer_region(
            output,
            self.counter_offset(),
            buffers.counter_reset.try_resource()?,
            0,
            COUNTER_SIZE,
        );
        list.resource_barrier(&[ResourceBarrier::transition(
            output,
            ResourceState::CopyDest,
            ResourceState::UnorderedAccess,
        )]);
        Ok(())
    }

    /// Binds the culling pipeline and its root signature.
    pub fn bind_compute_pipeline(&self, list: &mut dyn CommandList) -> Result<(), RenderError> {
        let (_, objects) = self.parts()?;
        list.set_pipeline_state(objects.compute_pipeline);
        list.set_compute_root_signature(objects.compute_root);
        Ok(())
    }

    /// Binds the culling inputs and the output of `frame_index`, dispatches one thread
    /// per command, then hands the output to the graphics queue as indirect arguments.
    ///
    /// The descriptor table must be bound on `list`.
    pub fn dispatch_compute(&self, list: &mut dyn CommandList, frame_index: usize) -> Result<(), RenderError> {
        let (buffers, _) = self.parts()?;
        let output = Self::output(buffers, frame_index)?;
        list.set_compute_root_descriptor_table(SRV_TABLE_PARAMETER, buffers.srv_range.gpu_handle(0));
        list.set_compute_root_descriptor_table(UAV_TABLE_PARAMETER, buffers.uav_range.gpu_handle(frame_index));
        list.set_compute_root_constant_buffer_view(CULLING_DATA_PARAMETER, buffers.culling_address);
        list.dispatch(culling_group_count(self.model_count), 1, 1);
        list.resource_barrier(&[ResourceBarrier::transition(
            output,
            ResourceState::UnorderedAccess,
            ResourceState::IndirectArgument,
        )]);
        Ok(())
    }

    /// Binds the indirect graphics pipeline and its root signature.
    pub fn bind_graphics_pipeline(&self, list: &mut dyn CommandList) -> Result<(), RenderError> {
        let (_, objects) = self.parts()?;
        list.set_pipeline_state(objects.graphics_pipeline);
        list.set_graphics_root_signature(objects.graphics_root);
        list.set_primitive_topology(PrimitiveTopology::TriangleList);
        Ok(())
    }

    /// Draws the commands that survived culling in `frame_index`.
    pub fn draw_models(&self, list: &mut dyn CommandList, frame_index: usize) -> Result<(), RenderError> {
        let (buffers, objects) = self.parts()?;
        let output = Self::output(buffers, frame_index)?;
        list.execute_indirect(
            objects.command_signature,
            self.model_count,
            output,
            0,
            Some(output),
            self.counter_offset(),
        );
        Ok(())
    }

    /// Destroys every buffer.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        if let Some(mut buffers) = self.buffers.take() {
            buffers.commands.release(device);
            buffers.positions.release(device);
            for output in &mut buffers.outputs {
                output.release(device);
            }
            buffers.counter_reset.release(device);
            buffers.culling_data.release(device);
        }
    }
}
