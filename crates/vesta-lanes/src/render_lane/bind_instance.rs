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

use super::Model;
use std::sync::Arc;
use vesta_core::renderer::api::{
    GpuDescriptorHandle, GpuVirtualAddress, IndexBufferView, IndexFormat, PipelineStateId, PrimitiveTopology,
    RootSignatureId, VertexBufferView, VertexLayout,
};
use vesta_core::renderer::{CommandList, RenderError};
use vesta_core::sync::SharedAddress;
use vesta_data::buffers::ResourceBuffer;
use vesta_data::textures::TextureStorage;

/// Root parameter holding the texture index constant.
pub const TEXTURE_INDEX_PARAMETER: u32 = 0;
/// Root parameter holding the texture table, when textures exist.
pub const TEXTURE_TABLE_PARAMETER: u32 = 1;

/// Where the geometry of one model landed in the shared vertex and index buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryPlacement {
    /// Byte offset of the first vertex. A multiple of the model's vertex stride.
    pub vertex_offset: u64,
    /// Byte offset of the first index.
    pub index_offset: u64,
}

impl GeometryPlacement {
    /// Index of the first vertex when the vertex buffer is bound with `stride`.
    pub fn base_vertex(&self, stride: u32) -> i32 {
        (self.vertex_offset / u64::from(stride.max(1))) as i32
    }

    /// Index of the first index in a 16-bit index buffer.
    pub fn start_index(&self) -> u32 {
        (self.index_offset / u64::from(IndexFormat::Uint16.size())) as u32
    }
}

#[derive(Debug)]
struct ModelViews {
    model: Arc<dyn Model>,
    vertex_address: SharedAddress<GpuVirtualAddress>,
    vertex_bytes: u32,
    stride: u32,
    index_address: SharedAddress<GpuVirtualAddress>,
    index_bytes: u32,
    index_count: u32,
}

impl ModelViews {
    fn vertex_view(&self) -> VertexBufferView {
        VertexBufferView {
            address: self.vertex_address.get_or_default(),
            size_in_bytes: self.vertex_bytes,
            stride: self.stride,
        }
    }

    fn index_view(&self) -> IndexBufferView {
        IndexBufferView {
            address: self.index_address.get_or_default(),
            size_in_bytes: self.index_bytes,
            format: IndexFormat::Uint16,
        }
    }
}

/// Models that are drawn with the same pipeline state and root signature.
///
/// Geometry goes into the shared vertex and index [`ResourceBuffer`]s when a model is
/// added; the views keep [`SharedAddress`]es that resolve once those buffers are
/// placed, so [`BindInstance::bind_commands`] must not run before that.
#[derive(Debug)]
pub struct BindInstance {
    label: &'static str,
    pipeline: Option<PipelineStateId>,
    root_signature: Option<RootSignatureId>,
    vertex_layout: Option<VertexLayout>,
    models: Vec<ModelViews>,
}

impl BindInstance {
    /// Creates an empty instance.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            pipeline: None,
            root_signature: None,
            vertex_layout: None,
            models: Vec::new(),
        }
    }

    /// Debug label of the instance.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Sets the pipeline state every model is drawn with.
    pub fn add_pipeline(&mut self, pipeline: PipelineStateId) {
        self.pipeline = Some(pipeline);
    }

    /// Sets the root signature every model is drawn with.
    pub fn add_root_signature(&mut self, root_signature: RootSignatureId) {
        self.root_signature = Some(root_signature);
    }

    /// The pipeline state, once created.
    pub fn pipeline(&self) -> Option<PipelineStateId> {
        self.pipeline
    }

    /// The layout of the first model added, which the pipeline is built for.
    pub fn vertex_layout(&self) -> Option<&VertexLayout> {
        self.vertex_layout.as_ref()
    }

    /// Number of models.
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Appends the geometry of `model` to the shared buffers.
    ///
    /// The vertex buffer is padded so the model's first vertex starts on a multiple of
    /// its stride, which lets indirect draws address it with a base vertex.
    pub fn add_model(
        &mut self,
        model: Arc<dyn Model>,
        vertices: &mut ResourceBuffer,
        indices: &mut ResourceBuffer,
    ) -> GeometryPlacement {
        let stride = model.vertex_stride();
        let padding = match vertices.size() % u64::from(stride.max(1)) {
            0 => 0,
            rest => u64::from(stride) - rest,
        };
        if padding > 0 {
            vertices.add_data(&vec![0u8; padding as usize]);
        }

        let index_bytes: &[u8] = bytemuck::cast_slice(model.index_data());
        let placement = GeometryPlacement {
            vertex_offset: vertices.size(),
            index_offset: indices.size(),
        };
        let views = ModelViews {
            vertex_address: vertices.add_data_and_get_shared_address(model.vertex_data()),
            vertex_bytes: model.vertex_data().len() as u32,
            stride,
            index_address: indices.add_data_and_get_shared_address(index_bytes),
            index_bytes: index_bytes.len() as u32,
            index_count: model.index_count(),
            model,
        };

        if self.vertex_layout.is_none() {
            self.vertex_layout = Some(views.model.vertex_layout());
        }
        self.models.push(views);
        placement
    }

    /// Records the pipeline bindings, then one draw per model.
    ///
    /// ## Arguments
    /// * `texture_table` - Start of the texture views, bound when the root signature
    ///   declares the table.
    /// * `textures` - Resolves each model's logical texture index to its table slot.
    /// ## Errors
    /// * `RenderError::NotInitialized` - If the pipeline objects were never added.
    pub fn bind_commands(
        &self,
        list: &mut dyn CommandList,
        texture_table: Option<GpuDescriptorHandle>,
        textures: &TextureStorage,
    ) -> Result<(), RenderError> {
        let (Some(pipeline), Some(root_signature)) = (self.pipeline, self.root_signature) else {
            return Err(RenderError::NotInitialized("bind instance pipeline objects"));
        };
        list.set_pipeline_state(pipeline);
        list.set_graphics_root_signature(root_signature);
        list.set_primitive_topology(PrimitiveTopology::TriangleList);
        if let Some(table) = texture_table {
            list.set_graphics_root_descriptor_table(TEXTURE_TABLE_PARAMETER, table);
        }

        for views in &self.models {
            let texture_slot = if views.model.is_textured() {
                textures
                    .physical_index(views.model.texture_index() as usize)
                    .unwrap_or_default() as u32
            } else {
                0
            };
            list.set_vertex_buffers(0, &[views.vertex_view()]);
            list.set_index_buffer(&views.index_view());
            list.set_graphics_root_32bit_constant(TEXTURE_INDEX_PARAMETER, texture_slot, 0);
            list.draw_indexed_instanced(views.index_count, 1, 0, 0, 0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::MeshModel;

    #[test]
    fn placements_start_on_vertex_boundaries() {
        let mut vertices = ResourceBuffer::new("vertices");
        let mut indices = ResourceBuffer::new("indices");
        let mut colored = BindInstance::new("colored");
        let mut textured = BindInstance::new("textured");

        // A 28-byte vertex model, then a 20-byte one.
        let first = colored.add_model(Arc::new(MeshModel::triangle([1.0; 4])), &mut vertices, &mut indices);
        let second = textured.add_model(Arc::new(MeshModel::quad(0)), &mut vertices, &mut indices);

        assert_eq!(first, GeometryPlacement { vertex_offset: 0, index_offset: 0 });
        assert_eq!(second.vertex_offset % 20, 0);
        assert!(second.vertex_offset >= 3 * 28);
        assert_eq!(second.index_offset, 6);
        assert_eq!(second.start_index(), 3);
        assert_eq!(second.base_vertex(20), (second.vertex_offset / 20) as i32);
        assert_eq!(vertices.size(), second.vertex_offset + 4 * 20);
    }

    #[test]
    fn first_model_fixes_the_layout() {
        let mut vertices = ResourceBuffer::new("vertices");
        let mut indices = ResourceBuffer::new("indices");
        let mut instance = BindInstance::new("colored");
        assert!(instance.vertex_layout().is_none());

        instance.add_model(Arc::new(MeshModel::triangle([1.0; 4])), &mut vertices, &mut indices);
        instance.add_model(Arc::new(MeshModel::triangle([0.5; 4])), &mut vertices, &mut indices);

        assert_eq!(instance.model_count(), 2);
        assert_eq!(instance.vertex_layout().map(VertexLayout::stride), Some(28));
    }

    #[test]
    fn binding_without_pipeline_objects_fails() {
        let device = vesta_infra::graphics::soft::SoftDevice::new();
        let mut list = vesta_core::renderer::GraphicsDevice::create_command_list(
            device.as_ref(),
            vesta_core::renderer::api::CommandListType::Direct,
        )
        .unwrap();
        let instance = BindInstance::new("empty");

        let result = instance.bind_commands(list.as_mut(), None, &TextureStorage::new());
        assert!(matches!(result, Err(RenderError::NotInitialized(_))));
    }
}
