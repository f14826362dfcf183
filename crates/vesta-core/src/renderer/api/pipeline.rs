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

//! Root signatures, shader binaries, vertex layouts and pipeline state descriptions.

use super::resource::TextureFormat;
use super::command::PrimitiveTopology;
use crate::renderer::error::ShaderError;
use std::path::Path;

/// File extension of compiled shader binaries.
pub const SHADER_BINARY_EXTENSION: &str = "cso";

/// An opaque handle to a root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootSignatureId(pub usize);

/// An opaque handle to a graphics or compute pipeline state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineStateId(pub usize);

/// Which shader stages can see a root parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShaderVisibility {
    /// Every stage.
    #[default]
    All,
    /// The vertex stage only.
    Vertex,
    /// The pixel stage only.
    Pixel,
}

/// The view class of a descriptor range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorRangeType {
    /// Shader resource views.
    Srv,
    /// Unordered access views.
    Uav,
    /// Constant buffer views.
    Cbv,
}

/// A contiguous run of descriptors inside a root descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRange {
    /// View class.
    pub range_type: DescriptorRangeType,
    /// Number of descriptors.
    pub count: u32,
    /// First shader register.
    pub base_register: u32,
}

/// One entry of a root signature.
#[derive(Debug, Clone, PartialEq)]
pub enum RootParameter {
    /// 32-bit values set inline.
    Constants {
        /// Shader register.
        register: u32,
        /// Number of 32-bit values.
        num_32bit_values: u32,
        /// Visible stages.
        visibility: ShaderVisibility,
    },
    /// A constant buffer bound by GPU address.
    ConstantBufferView {
        /// Shader register.
        register: u32,
        /// Visible stages.
        visibility: ShaderVisibility,
    },
    /// A table of descriptors bound by GPU descriptor handle.
    DescriptorTable {
        /// The ranges of the table, in slot order.
        ranges: Vec<DescriptorRange>,
        /// Visible stages.
        visibility: ShaderVisibility,
    },
}

/// Describes a root signature.
#[derive(Debug, Clone, PartialEq)]
pub struct RootSignatureDescriptor<'a> {
    /// A debug label.
    pub label: Option<&'a str>,
    /// Parameters, indexed by their position.
    pub parameters: Vec<RootParameter>,
    /// Whether the input assembler reads vertex buffers.
    pub allow_input_assembler: bool,
}

/// A compiled shader, identified by the name it was loaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBinary {
    name: String,
    bytecode: Vec<u8>,
}

impl ShaderBinary {
    /// Reads `<dir>/<name>.cso`.
    pub fn load(dir: &Path, name: &str) -> Result<Self, ShaderError> {
        let path = dir.join(format!("{name}.{SHADER_BINARY_EXTENSION}"));
        let bytecode = std::fs::read(&path).map_err(|err| ShaderError::LoadError {
            path: path.clone(),
            source_error: err.to_string(),
        })?;
        log::debug!("Loaded shader binary '{}' ({} bytes)", path.display(), bytecode.len());
        Ok(Self {
            name: name.to_string(),
            bytecode,
        })
    }

    /// Wraps bytecode that is already in memory.
    pub fn from_bytes(name: impl Into<String>, bytecode: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytecode,
        }
    }

    /// A shader without bytecode, resolved by the backend from its name alone.
    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytecode: Vec::new(),
        }
    }

    /// The name the shader was loaded under, without extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The compiled bytecode. Empty for built-in shaders.
    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    /// Returns `true` if the shader carries no bytecode.
    pub fn is_builtin(&self) -> bool {
        self.bytecode.is_empty()
    }
}

/// A per-vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexElementType {
    /// `float3` position.
    Position,
    /// `float4` colour.
    Color,
    /// `float2` texture coordinate.
    Uv,
}

impl VertexElementType {
    /// The semantic name the vertex shader binds the attribute to.
    pub const fn semantic_name(self) -> &'static str {
        match self {
            VertexElementType::Position => "Position",
            VertexElementType::Color => "Color",
            VertexElementType::Uv => "UV",
        }
    }

    /// Size of the attribute in bytes.
    pub const fn size(self) -> u32 {
        match self {
            VertexElementType::Position => 12,
            VertexElementType::Color => 16,
            VertexElementType::Uv => 8,
        }
    }
}

/// One attribute of a [`VertexLayout`] with its byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexElement {
    /// Attribute type.
    pub element_type: VertexElementType,
    /// Offset from the start of the vertex.
    pub offset: u32,
}

/// The attributes of an interleaved vertex, packed in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexLayout {
    elements: Vec<VertexElement>,
    stride: u32,
}

impl VertexLayout {
    /// Builds a layout by packing `elements` one after the other.
    pub fn new(elements: &[VertexElementType]) -> Self {
        let mut layout = Self::default();
        for &element_type in elements {
            layout.elements.push(VertexElement {
                element_type,
                offset: layout.stride,
            });
            layout.stride += element_type.size();
        }
        layout
    }

    /// The packed attributes.
    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// Size of one vertex in bytes.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Returns `true` if the layout has no attribute.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Describes a graphics pipeline state object.
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDescriptor<'a> {
    /// A debug label.
    pub label: Option<&'a str>,
    /// Root signature the shaders are compiled against.
    pub root_signature: RootSignatureId,
    /// Vertex stage.
    pub vertex_shader: &'a ShaderBinary,
    /// Pixel stage.
    pub pixel_shader: &'a ShaderBinary,
    /// Input layout.
    pub vertex_layout: &'a VertexLayout,
    /// Primitive assembly.
    pub topology: PrimitiveTopology,
    /// Format of the single render target.
    pub render_target_format: TextureFormat,
    /// Format of the depth target, if depth testing is enabled.
    pub depth_format: Option<TextureFormat>,
}

/// Describes a compute pipeline state object.
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor<'a> {
    /// A debug label.
    pub label: Option<&'a str>,
    /// Root signature the shader is compiled against.
    pub root_signature: RootSignatureId,
    /// Compute stage.
    pub shader: &'a ShaderBinary,
}
