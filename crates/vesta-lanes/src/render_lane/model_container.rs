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

use super::{BindInstance, GeometryPlacement, Model, TEXTURE_TABLE_PARAMETER};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vesta_core::renderer::api::{
    DescriptorRange, DescriptorRangeType, GpuDescriptorHandle, GraphicsPipelineDescriptor, IndexBufferView,
    IndexFormat, PrimitiveTopology, RootParameter, RootSignatureDescriptor, RootSignatureId, ShaderVisibility,
    TextureFormat, VertexBufferView,
};
use vesta_core::renderer::{CommandList, GraphicsDevice, PipelineError, RenderError, ResourceError};
use vesta_data::allocators::HeapPools;
use vesta_data::buffers::{ResourceBuffer, UploadJob};
use vesta_data::descriptors::DescriptorTableManager;
use vesta_data::textures::TextureStorage;

/// Vertex shader of colored models.
pub const COLORED_VERTEX_SHADER: &str = "VSColored";
/// Pixel shader of colored models.
pub const COLORED_PIXEL_SHADER: &str = "PSColored";
/// Vertex shader of textured models.
pub const TEXTURED_VERTEX_SHADER: &str = "VSTextured";
/// Pixel shader of textured models.
pub const TEXTURED_PIXEL_SHADER: &str = "PSTextured";

/// Formats of the attachments every pipeline renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetFormats {
    /// Format of the back buffers.
    pub render_target: TextureFormat,
    /// Format of the depth buffer, if one is bound.
    pub depth: Option<TextureFormat>,
}

/// Owns every registered model and the geometry buffers they live in.
///
/// Models are routed to a colored or a textured [`BindInstance`], each created the
/// first time a model of its kind arrives. Both instances share one root signature:
/// parameter 0 holds one 32-bit constant (the texture index for individual draws, the
/// model index for indirect draws), parameter 1 the texture table when at least one
/// texture was registered.
#[derive(Debug)]
pub struct ModelContainer {
    shader_path: PathBuf,
    colored: Option<BindInstance>,
    textured: Option<BindInstance>,
    root_signature: Option<RootSignatureId>,
    texture_table: Option<GpuDescriptorHandle>,
    vertex_buffer: ResourceBuffer,
    index_buffer: ResourceBuffer,
    models: Vec<(Arc<dyn Model>, GeometryPlacement)>,
}

impl ModelContainer {
    /// Creates an empty container loading its shaders from `shader_path`.
    pub fn new(shader_path: impl Into<PathBuf>) -> Self {
        Self {
            shader_path: shader_path.into(),
            colored: None,
            textured: None,
            root_signature: None,
            texture_table: None,
            vertex_buffer: ResourceBuffer::new("vertex buffer"),
            index_buffer: ResourceBuffer::new("index buffer"),
            models: Vec::new(),
        }
    }

    /// Directory the compiled shaders are loaded from.
    pub fn shader_path(&self) -> &Path {
        &self.shader_path
    }

    /// Changes the shader directory. Only pipelines created afterwards see it.
    pub fn set_shader_path(&mut self, shader_path: impl Into<PathBuf>) {
        self.shader_path = shader_path.into();
    }

    /// Adds `model` to the instance of its kind.
    ///
    /// ## Returns
    /// Where its geometry was placed in the shared buffers.
    pub fn add_model(&mut self, model: Arc<dyn Model>) -> GeometryPlacement {
        let instance = if model.is_textured() {
            self.textured.get_or_insert_with(|| BindInstance::new("textured"))
        } else {
            self.colored.get_or_insert_with(|| BindInstance::new("colored"))
        };
        let placement = instance.add_model(Arc::clone(&model), &mut self.vertex_buffer, &mut self.index_buffer);
        log::trace!(
            "ModelContainer: model {} added to the {} instance",
            self.models.len(),
            instance.label()
        );
        self.models.push((model, placement));
        placement
    }

    /// Number of models.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Every model with its placement, in registration order.
    pub fn models(&self) -> &[(Arc<dyn Model>, GeometryPlacement)] {
        &self.models
    }

    /// The instances created so far.
    pub fn instances(&self) -> impl Iterator<Item = &BindInstance> {
        self.colored.iter().chain(self.textured.iter())
    }

    /// Checks that every textured model refers to a registered texture.
    pub fn validate_textures(&self, texture_count: usize) -> Result<(), RenderError> {
        for (index, (model, _)) in self.models.iter().enumerate() {
            if model.is_textured() && model.texture_index() as usize >= texture_count {
                log::error!(
                    "ModelContainer: model {index} samples texture {} but only {texture_count} were registered",
                    model.texture_index()
                );
                return Err(RenderError::IncompatibleModel(format!(
                    "model {index} samples unregistered texture {}",
                    model.texture_index()
                )));
            }
        }
        Ok(())
    }

    /// Reserves heap space for the vertex and index buffers.
    pub fn reserve_buffers(&mut self, device: &dyn GraphicsDevice, pools: &mut HeapPools) -> Result<(), ResourceError> {
        self.vertex_buffer.reserve(device, pools)?;
        self.index_buffer.reserve(device, pools)
    }

    /// Places the vertex and index buffers, resolving every view address.
    pub fn create_buffers(&mut self, device: &dyn GraphicsDevice, pools: &HeapPools) -> Result<(), ResourceError> {
        self.vertex_buffer.create_buffer(device, pools)?;
        self.index_buffer.create_buffer(device, pools)
    }

    /// The CPU copies of the staged geometry into the upload buffers.
    pub fn upload_jobs(&self, device: &Arc<dyn GraphicsDevice>) -> Result<Vec<UploadJob>, ResourceError> {
        Ok([self.vertex_buffer.upload_job(device)?, self.index_buffer.upload_job(device)?]
            .into_iter()
            .flatten()
            .collect())
    }

    /// Records the GPU copies of both buffers.
    pub fn record_uploads(&self, list: &mut dyn CommandList) -> Result<(), ResourceError> {
        self.vertex_buffer.record_upload(list)?;
        self.index_buffer.record_upload(list)
    }

    /// Frees the upload buffers. The recorded copies must have executed.
    pub fn release_upload_buffers(&mut self, device: &dyn GraphicsDevice) {
        self.vertex_buffer.release_upload_buffer(device);
        self.index_buffer.release_upload_buffer(device);
    }

    /// The root signature shared by every instance, created on first use.
    pub fn create_root_signature(
        &mut self,
        device: &dyn GraphicsDevice,
        texture_count: usize,
    ) -> Result<RootSignatureId, PipelineError> {
        if let Some(root_signature) = self.root_signature {
            return Ok(root_signature);
        }

        let mut parameters = vec![RootParameter::Constants {
            register: 0,
            num_32bit_values: 1,
            visibility: ShaderVisibility::All,
        }];
        if texture_count > 0 {
            parameters.push(RootParameter::DescriptorTable {
                ranges: vec![DescriptorRange {
                    range_type: DescriptorRangeType::Srv,
                    count: texture_count as u32,
                    base_register: 0,
                }],
                visibility: ShaderVisibility::Pixel,
            });
        }

        let root_signature = device.create_root_signature(&RootSignatureDescriptor {
            label: Some("model root signature"),
            parameters,
            allow_input_assembler: true,
        })?;
        self.root_signature = Some(root_signature);
        Ok(root_signature)
    }

    /// The shared root signature, once created.
    pub fn root_signature(&self) -> Option<RootSignatureId> {
        self.root_signature
    }

    /// Creates the shared root signature and one pipeline per instance.
    pub fn init_pipelines(
        &mut self,
        device: &dyn GraphicsDevice,
        table: &DescriptorTableManager,
        formats: RenderTargetFormats,
    ) -> Result<(), RenderError> {
        let texture_count = table.texture_descriptor_count();
        let root_signature = self.create_root_signature(device, texture_count)?;
        self.texture_table = (texture_count > 0).then(|| table.texture_range_start());

        let shader_path = self.shader_path.clone();
        let instances = [
            (self.colored.as_mut(), COLORED_VERTEX_SHADER, COLORED_PIXEL_SHADER),
            (self.textured.as_mut(), TEXTURED_VERTEX_SHADER, TEXTURED_PIXEL_SHADER),
        ];
        for (instance, vertex_name, pixel_name) in instances {
            let Some(instance) = instance else {
                continue;
            };
            let Some(vertex_layout) = instance.vertex_layout().cloned() else {
                continue;
            };
            let vertex_shader = device.load_shader(&shader_path, vertex_name).map_err(ResourceError::from)?;
            let pixel_shader = device.load_shader(&shader_path, pixel_name).map_err(ResourceError::from)?;
            let pipeline = device.create_graphics_pipeline(&GraphicsPipelineDescriptor {
                label: Some(instance.label()),
                root_signature,
                vertex_shader: &vertex_shader,
                pixel_shader: &pixel_shader,
                vertex_layout: &vertex_layout,
                topology: PrimitiveTopology::TriangleList,
                render_target_format: formats.render_target,
                depth_format: formats.depth,
            })?;
            instance.add_root_signature(root_signature);
            instance.add_pipeline(pipeline);
            log::debug!("ModelContainer: {} pipeline created", instance.label());
        }
        Ok(())
    }

    /// Records every instance's draws.
    pub fn bind_commands(&self, list: &mut dyn CommandList, textures: &TextureStorage) -> Result<(), RenderError> {
        for instance in self.instances() {
            instance.bind_commands(list, self.texture_table, textures)?;
        }
        Ok(())
    }

    /// Binds the texture table on the model root signature, when textures exist.
    pub fn bind_texture_table(&self, list: &mut dyn CommandList) {
        if let Some(table) = self.texture_table {
            list.set_graphics_root_descriptor_table(TEXTURE_TABLE_PARAMETER, table);
        }
    }

    /// Binds the whole vertex and index buffers, for draws addressing models by base
    /// vertex and start index.
    ///
    /// ## Returns
    /// `false` if no geometry was placed.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If a buffer is larger than a view can describe.
    pub fn bind_shared_geometry(
        &self,
        device: &dyn GraphicsDevice,
        list: &mut dyn CommandList,
        vertex_stride: u32,
    ) -> Result<bool, RenderError> {
        let (Some(vertices), Some(indices)) = (
            self.vertex_buffer.gpu_address(device),
            self.index_buffer.gpu_address(device),
        ) else {
            return Ok(false);
        };
        let vertex_bytes = view_size(self.vertex_buffer.gpu_size())?;
        let index_bytes = view_size(self.index_buffer.gpu_size())?;
        list.set_vertex_buffers(
            0,
            &[VertexBufferView {
                address: vertices,
                size_in_bytes: vertex_bytes,
                stride: vertex_stride,
            }],
        );
        list.set_index_buffer(&IndexBufferView {
            address: indices,
            size_in_bytes: index_bytes,
            format: IndexFormat::Uint16,
        });
        Ok(true)
    }

    /// Destroys the geometry buffers.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        self.vertex_buffer.release(device);
        self.index_buffer.release(device);
    }
}

/// Buffer views describe at most `u32::MAX` bytes.
fn view_size(bytes: u64) -> Result<u32, ResourceError> {
    u32::try_from(bytes).map_err(|_| ResourceError::OutOfBounds {
        offset: 0,
        size: bytes,
        capacity: u64::from(u32::MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::MeshModel;
    use vesta_core::renderer::api::CommandListType;
    use vesta_infra::graphics::soft::SoftDevice;

    #[test]
    fn instances_are_created_lazily_by_kind() {
        let mut container = ModelContainer::new("shaders");
        assert_eq!(container.instances().count(), 0);

        container.add_model(Arc::new(MeshModel::triangle([1.0; 4])));
        assert_eq!(container.instances().count(), 1);
        container.add_model(Arc::new(MeshModel::triangle([0.0; 4])));
        assert_eq!(container.instances().count(), 1);
        container.add_model(Arc::new(MeshModel::quad(0)));

        let labels: Vec<_> = container.instances().map(BindInstance::label).collect();
        assert_eq!(labels, ["colored", "textured"]);
        assert_eq!(container.model_count(), 3);
    }

    #[test]
    fn views_larger_than_u32_are_rejected() {
        assert_eq!(view_size(u64::from(u32::MAX)).unwrap(), u32::MAX);
        assert!(matches!(
            view_size(u64::from(u32::MAX) + 1),
            Err(ResourceError::OutOfBounds { capacity, .. }) if capacity == u64::from(u32::MAX)
        ));
    }

    #[test]
    fn empty_container_binds_no_geometry() {
        let device = SoftDevice::new();
        let container = ModelContainer::new("shaders");
        let allocator = device.create_command_allocator(CommandListType::Direct).unwrap();
        let mut list = device.create_command_list(CommandListType::Direct).unwrap();
        list.reset(allocator).unwrap();

        assert!(!container.bind_shared_geometry(device.as_ref(), list.as_mut(), 28).unwrap());
    }

    #[test]
    fn unregistered_texture_is_rejected() {
        let mut container = ModelContainer::new("shaders");
        container.add_model(Arc::new(MeshModel::quad(2)));
        assert!(container.validate_textures(3).is_ok());
        assert!(matches!(
            container.validate_textures(2),
            Err(RenderError::IncompatibleModel(_))
        ));
    }

    #[test]
    fn root_signature_is_shared_and_created_once() {
        let device = SoftDevice::new();
        let mut container = ModelContainer::new("shaders");
        container.add_model(Arc::new(MeshModel::triangle([1.0; 4])));
        container.add_model(Arc::new(MeshModel::quad(0)));
        let mut table = DescriptorTableManager::new();
        table.get_texture_index();
        table.create_descriptor_table(device.as_ref()).unwrap();

        let first = container.create_root_signature(device.as_ref(), 1).unwrap();
        container
            .init_pipelines(
                device.as_ref(),
                &table,
                RenderTargetFormats {
                    render_target: TextureFormat::Bgra8Unorm,
                    depth: Some(TextureFormat::D32Float),
                },
            )
            .unwrap();

        assert_eq!(container.root_signature(), Some(first));
        assert!(container.instances().all(|instance| instance.pipeline().is_some()));
    }
}
