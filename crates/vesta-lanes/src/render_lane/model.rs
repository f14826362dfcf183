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

use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;
use vesta_core::math::Float3;
use vesta_core::renderer::api::{VertexElementType, VertexLayout};

/// Geometry handed to the engine by the application.
///
/// The engine copies the vertex and index data during registration and reads the
/// remaining properties again when it records draws, so implementations must keep
/// them stable.
pub trait Model: Send + Sync + Debug {
    /// Interleaved vertex data, laid out as [`Model::vertex_layout`] describes.
    fn vertex_data(&self) -> &[u8];

    /// The attributes of one vertex.
    fn vertex_layout(&self) -> VertexLayout;

    /// Size of one vertex in bytes.
    fn vertex_stride(&self) -> u32 {
        self.vertex_layout().stride()
    }

    /// Triangle list indices.
    fn index_data(&self) -> &[u16];

    /// Number of indices drawn.
    fn index_count(&self) -> u32 {
        self.index_data().len() as u32
    }

    /// Logical index of the texture sampled by the model, as returned by
    /// `register_resource`. Ignored for untextured models.
    fn texture_index(&self) -> u32 {
        0
    }

    /// Whether the model samples a texture.
    fn is_textured(&self) -> bool {
        false
    }

    /// World position, tested against the culling bounds.
    fn position(&self) -> Float3 {
        [0.0; 3]
    }
}

/// A vertex with a position and an RGBA colour.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColoredVertex {
    /// Position in model space.
    pub position: Float3,
    /// Linear RGBA colour.
    pub colour: [f32; 4],
}

impl ColoredVertex {
    /// The attributes of the vertex, in memory order.
    pub const ELEMENTS: [VertexElementType; 2] = [VertexElementType::Position, VertexElementType::Color];
}

/// A vertex with a position and a texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TexturedVertex {
    /// Position in model space.
    pub position: Float3,
    /// Texture coordinate.
    pub uv: [f32; 2],
}

impl TexturedVertex {
    /// The attributes of the vertex, in memory order.
    pub const ELEMENTS: [VertexElementType; 2] = [VertexElementType::Position, VertexElementType::Uv];
}

/// A [`Model`] that owns its geometry.
#[derive(Debug, Clone)]
pub struct MeshModel {
    vertices: Vec<u8>,
    layout: VertexLayout,
    indices: Vec<u16>,
    texture: Option<u32>,
    position: Float3,
}

impl MeshModel {
    /// A model drawn with per-vertex colours.
    pub fn colored(vertices: &[ColoredVertex], indices: Vec<u16>) -> Self {
        Self {
            vertices: bytemuck::cast_slice(vertices).to_vec(),
            layout: VertexLayout::new(&ColoredVertex::ELEMENTS),
            indices,
            texture: None,
            position: [0.0; 3],
        }
    }

    /// A model sampling the texture registered as `texture_index`.
    pub fn textured(vertices: &[TexturedVertex], indices: Vec<u16>, texture_index: u32) -> Self {
        Self {
            vertices: bytemuck::cast_slice(vertices).to_vec(),
            layout: VertexLayout::new(&TexturedVertex::ELEMENTS),
            indices,
            texture: Some(texture_index),
            position: [0.0; 3],
        }
    }

    /// A single coloured triangle.
    pub fn triangle(colour: [f32; 4]) -> Self {
        let vertex = |x: f32, y: f32| ColoredVertex {
            position: [x, y, 0.0],
            colour,
        };
        Self::colored(&[vertex(0.0, 0.5), vertex(0.5, -0.5), vertex(-0.5, -0.5)], vec![0, 1, 2])
    }

    /// A unit quad covering the whole texture.
    pub fn quad(texture_index: u32) -> Self {
        let vertex = |x: f32, y: f32, u: f32, v: f32| TexturedVertex {
            position: [x, y, 0.0],
            uv: [u, v],
        };
        Self::textured(
            &[
                vertex(-0.5, 0.5, 0.0, 0.0),
                vertex(0.5, 0.5, 1.0, 0.0),
                vertex(0.5, -0.5, 1.0, 1.0),
                vertex(-0.5, -0.5, 0.0, 1.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
            texture_index,
        )
    }

    /// Moves the model to `position`.
    pub fn with_position(mut self, position: Float3) -> Self {
        self.position = position;
        self
    }
}

impl Model for MeshModel {
    fn vertex_data(&self) -> &[u8] {
        &self.vertices
    }

    fn vertex_layout(&self) -> VertexLayout {
        self.layout.clone()
    }

    fn index_data(&self) -> &[u16] {
        &self.indices
    }

    fn texture_index(&self) -> u32 {
        self.texture.unwrap_or(0)
    }

    fn is_textured(&self) -> bool {
        self.texture.is_some()
    }

    fn position(&self) -> Float3 {
        self.position
    }
}
