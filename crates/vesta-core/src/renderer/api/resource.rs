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

//! Resource handles, descriptors, flags and states.

use std::borrow::Cow;

/// An opaque handle to a buffer or texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub usize);

/// A GPU virtual address, as consumed by root descriptors and buffer views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct GpuVirtualAddress(pub u64);

impl GpuVirtualAddress {
    /// Returns the address `bytes` further into the same resource.
    pub const fn offset(self, bytes: u64) -> Self {
        Self(self.0 + bytes)
    }
}

/// Pixel formats supported for textures and render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, normalized.
    Rgba8Unorm,
    /// 8-bit BGRA, normalized (typical swap chain format).
    Bgra8Unorm,
    /// 32-bit float depth.
    D32Float,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm | TextureFormat::Bgra8Unorm | TextureFormat::D32Float => 4,
        }
    }
}

/// The shape of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceDimension {
    /// A linear buffer of `size` bytes.
    Buffer {
        /// Size in bytes.
        size: u64,
    },
    /// A single-mip 2D texture.
    Texture2D {
        /// Width in texels.
        width: u32,
        /// Height in texels.
        height: u32,
        /// Texel format.
        format: TextureFormat,
    },
}

/// Usage flags that widen what a resource may be used for.
///
/// Multiple flags can be combined using bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceFlags {
    bits: u32,
}

impl ResourceFlags {
    /// No extra usages.
    pub const NONE: Self = Self { bits: 0 };
    /// The resource can be bound as an unordered-access view.
    pub const ALLOW_UNORDERED_ACCESS: Self = Self { bits: 1 << 0 };
    /// The resource can be bound as a render target.
    pub const ALLOW_RENDER_TARGET: Self = Self { bits: 1 << 1 };
    /// The resource can be bound as a depth-stencil target.
    pub const ALLOW_DEPTH_STENCIL: Self = Self { bits: 1 << 2 };

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Combines two sets of flags.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Checks whether every flag of `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }

    /// Checks if no flag is set.
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

impl Default for ResourceFlags {
    fn default() -> Self {
        Self::NONE
    }
}

impl std::ops::BitOr for ResourceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for ResourceFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

/// Describes a resource to be placed into a heap.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor<'a> {
    /// A debug label.
    pub label: Option<Cow<'a, str>>,
    /// Shape of the resource.
    pub dimension: ResourceDimension,
    /// Extra usages.
    pub flags: ResourceFlags,
}

impl<'a> ResourceDescriptor<'a> {
    /// A plain buffer of `size` bytes.
    pub fn buffer(label: impl Into<Cow<'a, str>>, size: u64) -> Self {
        Self {
            label: Some(label.into()),
            dimension: ResourceDimension::Buffer { size },
            flags: ResourceFlags::NONE,
        }
    }

    /// A 2D texture.
    pub fn texture_2d(
        label: impl Into<Cow<'a, str>>,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Self {
        Self {
            label: Some(label.into()),
            dimension: ResourceDimension::Texture2D {
                width,
                height,
                format,
            },
            flags: ResourceFlags::NONE,
        }
    }

    /// Returns the descriptor with `flags` added.
    pub fn with_flags(mut self, flags: ResourceFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// The label, or `"unnamed"`.
    pub fn label_or_default(&self) -> &str {
        self.label.as_deref().unwrap_or("unnamed")
    }
}

/// The access state a resource is in on a queue timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Shared state resources decay to; buffers are implicitly promoted out of it.
    Common,
    /// Bound as vertex or constant buffer.
    VertexAndConstantBuffer,
    /// Bound as index buffer.
    IndexBuffer,
    /// Bound as render target.
    RenderTarget,
    /// Read/written through an unordered-access view.
    UnorderedAccess,
    /// Bound as a writable depth target.
    DepthWrite,
    /// Read by non-pixel shader stages.
    NonPixelShaderResource,
    /// Read by the pixel shader stage.
    PixelShaderResource,
    /// Read as indirect arguments or an indirect count.
    IndirectArgument,
    /// Destination of a copy.
    CopyDest,
    /// Source of a copy.
    CopySource,
    /// Every read-only state at once (upload and CPU-write heaps live here).
    GenericRead,
    /// Ready to be presented.
    Present,
}

impl ResourceState {
    /// Returns `true` for states that only read the resource.
    pub const fn is_read_only(self) -> bool {
        matches!(
            self,
            ResourceState::VertexAndConstantBuffer
                | ResourceState::IndexBuffer
                | ResourceState::NonPixelShaderResource
                | ResourceState::PixelShaderResource
                | ResourceState::IndirectArgument
                | ResourceState::CopySource
                | ResourceState::GenericRead
        )
    }

    /// Returns `true` if a resource in `self` can be used where `required` is expected
    /// without an explicit barrier.
    pub fn satisfies(self, required: ResourceState) -> bool {
        self == required || (self == ResourceState::GenericRead && required.is_read_only())
    }
}

/// Row pitch every texture upload row must be aligned to.
pub const TEXTURE_DATA_PITCH_ALIGNMENT: u64 = 256;

/// Layout of texel data inside a buffer used as texture copy source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopyFootprint {
    /// Width in texels.
    pub width: u32,
    /// Height in texels (number of rows).
    pub height: u32,
    /// Bytes per texel.
    pub pixel_stride: u32,
    /// Bytes between the start of two rows, aligned to [`TEXTURE_DATA_PITCH_ALIGNMENT`].
    pub row_pitch: u64,
}

impl TextureCopyFootprint {
    /// Computes the footprint of a tightly packed `width` x `height` image.
    pub fn new(width: u32, height: u32, pixel_stride: u32) -> Self {
        let row_size = u64::from(width) * u64::from(pixel_stride);
        Self {
            width,
            height,
            pixel_stride,
            row_pitch: super::memory::align_up(row_size, TEXTURE_DATA_PITCH_ALIGNMENT),
        }
    }

    /// Bytes of a tightly packed row.
    pub fn row_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.pixel_stride)
    }

    /// Total bytes of the pitched copy source.
    pub fn total_size(&self) -> u64 {
        self.row_pitch * u64::from(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine() {
        let flags = ResourceFlags::ALLOW_UNORDERED_ACCESS | ResourceFlags::ALLOW_RENDER_TARGET;
        assert!(flags.contains(ResourceFlags::ALLOW_UNORDERED_ACCESS));
        assert!(!flags.contains(ResourceFlags::ALLOW_DEPTH_STENCIL));
        assert!(ResourceFlags::default().is_empty());
    }

    #[test]
    fn generic_read_satisfies_every_read_state() {
        assert!(ResourceState::GenericRead.satisfies(ResourceState::CopySource));
        assert!(ResourceState::GenericRead.satisfies(ResourceState::IndirectArgument));
        assert!(!ResourceState::GenericRead.satisfies(ResourceState::CopyDest));
        assert!(!ResourceState::CopyDest.satisfies(ResourceState::UnorderedAccess));
    }

    #[test]
    fn footprint_pads_rows() {
        let footprint = TextureCopyFootprint::new(3, 2, 4);
        assert_eq!(footprint.row_size(), 12);
        assert_eq!(footprint.row_pitch, 256);
        assert_eq!(footprint.total_size(), 512);
    }
}
