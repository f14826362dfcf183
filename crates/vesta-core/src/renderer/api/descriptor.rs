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

//! Descriptor heaps, descriptor handles and view descriptions.

use super::resource::{GpuVirtualAddress, ResourceId};

/// The class of views a descriptor heap stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    /// Constant buffer, shader resource and unordered access views.
    CbvSrvUav,
    /// Render target views.
    Rtv,
    /// Depth-stencil views.
    Dsv,
}

/// An opaque handle to a descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHeapId(pub usize);

/// Describes a descriptor heap to be created.
#[derive(Debug, Clone)]
pub struct DescriptorHeapDescriptor<'a> {
    /// A debug label.
    pub label: Option<&'a str>,
    /// Class of views stored in the heap.
    pub kind: DescriptorHeapKind,
    /// Number of descriptor slots.
    pub count: u32,
    /// Whether shaders can read the heap through GPU handles.
    /// Only `CbvSrvUav` heaps may be shader visible.
    pub shader_visible: bool,
}

/// A CPU-side descriptor handle, used to write views and to copy descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CpuDescriptorHandle(pub u64);

impl CpuDescriptorHandle {
    /// Returns the handle `index` slots further, given the heap's increment size.
    pub const fn offset(self, index: u64, increment_size: u32) -> Self {
        Self(self.0 + index * increment_size as u64)
    }
}

/// A GPU-side descriptor handle, bound as the start of a root descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GpuDescriptorHandle(pub u64);

impl GpuDescriptorHandle {
    /// Returns the handle `index` slots further, given the heap's increment size.
    pub const fn offset(self, index: u64, increment_size: u32) -> Self {
        Self(self.0 + index * increment_size as u64)
    }
}

/// A view written into a descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewDescriptor {
    /// A structured buffer read by shaders.
    BufferSrv {
        /// The viewed buffer.
        resource: ResourceId,
        /// First element of the view.
        first_element: u64,
        /// Number of elements.
        element_count: u32,
        /// Size of one element in bytes.
        stride: u32,
    },
    /// A structured buffer written by shaders, optionally with an append counter.
    BufferUav {
        /// The viewed buffer.
        resource: ResourceId,
        /// First element of the view.
        first_element: u64,
        /// Number of elements.
        element_count: u32,
        /// Size of one element in bytes.
        stride: u32,
        /// Byte offset of the append counter inside `resource`.
        counter_offset: Option<u64>,
    },
    /// A 2D texture read by shaders.
    TextureSrv {
        /// The viewed texture.
        resource: ResourceId,
    },
    /// A constant buffer.
    ConstantBuffer {
        /// Start of the constants.
        address: GpuVirtualAddress,
        /// Size in bytes, a multiple of 256.
        size: u32,
    },
    /// A render target view.
    RenderTarget {
        /// The render target texture.
        resource: ResourceId,
    },
    /// A depth-stencil view.
    DepthStencil {
        /// The depth texture.
        resource: ResourceId,
    },
}

impl ViewDescriptor {
    /// The heap class this view has to be written into.
    pub fn heap_kind(&self) -> DescriptorHeapKind {
        match self {
            ViewDescriptor::RenderTarget { .. } => DescriptorHeapKind::Rtv,
            ViewDescriptor::DepthStencil { .. } => DescriptorHeapKind::Dsv,
            _ => DescriptorHeapKind::CbvSrvUav,
        }
    }

    /// The resource the view refers to, if it refers to one by handle.
    pub fn resource(&self) -> Option<ResourceId> {
        match *self {
            ViewDescriptor::BufferSrv { resource, .. }
            | ViewDescriptor::BufferUav { resource, .. }
            | ViewDescriptor::TextureSrv { resource }
            | ViewDescriptor::RenderTarget { resource }
            | ViewDescriptor::DepthStencil { resource } => Some(resource),
            ViewDescriptor::ConstantBuffer { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_offset_by_increment() {
        let cpu = CpuDescriptorHandle(1 << 32);
        assert_eq!(cpu.offset(3, 32), CpuDescriptorHandle((1 << 32) + 96));
        let gpu = GpuDescriptorHandle(64);
        assert_eq!(gpu.offset(0, 32), gpu);
    }

    #[test]
    fn views_route_to_their_heap_kind() {
        let rtv = ViewDescriptor::RenderTarget {
            resource: ResourceId(1),
        };
        let cbv = ViewDescriptor::ConstantBuffer {
            address: GpuVirtualAddress(0),
            size: 256,
        };
        assert_eq!(rtv.heap_kind(), DescriptorHeapKind::Rtv);
        assert_eq!(cbv.heap_kind(), DescriptorHeapKind::CbvSrvUav);
        assert_eq!(cbv.resource(), None);
        assert_eq!(rtv.resource(), Some(ResourceId(1)));
    }
}
