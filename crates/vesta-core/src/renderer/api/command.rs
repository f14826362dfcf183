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

//! Command recording value types.

use super::resource::{GpuVirtualAddress, ResourceId, ResourceState};

/// The kind of queue a command list is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandListType {
    /// Graphics, compute and copy work.
    Direct,
    /// Compute and copy work.
    Compute,
    /// Copy work only.
    Copy,
}

impl CommandListType {
    /// A short lowercase name, used in log prefixes.
    pub const fn name(self) -> &'static str {
        match self {
            CommandListType::Direct => "graphics",
            CommandListType::Compute => "compute",
            CommandListType::Copy => "copy",
        }
    }
}

/// An opaque handle to a command allocator (the memory backing recorded commands).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandAllocatorId(pub usize);

/// A state transition of a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBarrier {
    /// The transitioned resource.
    pub resource: ResourceId,
    /// The state the resource is in before the barrier.
    pub before: ResourceState,
    /// The state the resource is in after the barrier.
    pub after: ResourceState,
}

impl ResourceBarrier {
    /// Creates a transition barrier.
    pub const fn transition(resource: ResourceId, before: ResourceState, after: ResourceState) -> Self {
        Self {
            resource,
            before,
            after,
        }
    }
}

/// The rasterizer viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

impl Viewport {
    /// A viewport covering a whole `width` x `height` target with the full depth range.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// The scissor rectangle, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    /// Left edge.
    pub left: u32,
    /// Top edge.
    pub top: u32,
    /// Right edge (exclusive).
    pub right: u32,
    /// Bottom edge (exclusive).
    pub bottom: u32,
}

impl ScissorRect {
    /// A scissor rectangle covering a whole `width` x `height` target.
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }
}

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent points.
    PointList,
    /// Independent lines.
    LineList,
    /// Independent triangles.
    #[default]
    TriangleList,
    /// A strip of connected triangles.
    TriangleStrip,
}

/// The element type of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub const fn size(self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// Binds a range of a buffer as vertex input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferView {
    /// Address of the first vertex.
    pub address: GpuVirtualAddress,
    /// Size of the range in bytes.
    pub size_in_bytes: u32,
    /// Size of one vertex in bytes.
    pub stride: u32,
}

/// Binds a range of a buffer as index input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferView {
    /// Address of the first index.
    pub address: GpuVirtualAddress,
    /// Size of the range in bytes.
    pub size_in_bytes: u32,
    /// Element type.
    pub format: IndexFormat,
}
