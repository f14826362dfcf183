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

//! Heaps, placed resources and the GPU address space of the software device.

use std::collections::HashMap;

use vesta_core::renderer::api::{
    align_up, GpuVirtualAddress, HeapType, ResourceAllocationInfo, ResourceDescriptor, ResourceDimension,
    ResourceFlags, ResourceId, ResourceState, DEFAULT_PLACEMENT_ALIGNMENT,
};
use vesta_core::renderer::ResourceError;

/// First GPU virtual address handed out. Zero stays invalid.
const GPU_ADDRESS_BASE: u64 = 0x0001_0000_0000;

#[derive(Debug)]
pub(crate) struct SoftHeap {
    pub(crate) label: String,
    pub(crate) heap_type: HeapType,
    pub(crate) base: u64,
    pub(crate) bytes: Vec<u8>,
    /// The implicit heap of a committed resource; dies with it.
    pub(crate) committed: bool,
}

#[derive(Debug)]
pub(crate) struct SoftResource {
    pub(crate) label: String,
    pub(crate) heap: usize,
    pub(crate) offset: u64,
    pub(crate) size: u64,
    pub(crate) dimension: ResourceDimension,
    pub(crate) flags: ResourceFlags,
    pub(crate) heap_type: HeapType,
    /// Committed state, as seen between two executions.
    pub(crate) state: ResourceState,
}

impl SoftResource {
    pub(crate) fn is_buffer(&self) -> bool {
        matches!(self.dimension, ResourceDimension::Buffer { .. })
    }

    /// Resources in CPU-visible heaps never change state.
    pub(crate) fn is_tracked(&self) -> bool {
        self.heap_type == HeapType::GpuOnly
    }
}

/// Backing storage of every heap and resource of a device.
#[derive(Debug)]
pub(crate) struct SoftMemory {
    heaps: HashMap<usize, SoftHeap>,
    resources: HashMap<usize, SoftResource>,
    next_address: u64,
}

impl Default for SoftMemory {
    fn default() -> Self {
        Self {
            heaps: HashMap::new(),
            resources: HashMap::new(),
            next_address: GPU_ADDRESS_BASE,
        }
    }
}

impl SoftMemory {
    /// Footprint of a resource. Textures are stored tightly packed.
    pub(crate) fn allocation_info(descriptor: &ResourceDescriptor) -> ResourceAllocationInfo {
        let bytes = match descriptor.dimension {
            ResourceDimension::Buffer { size } => size.max(1),
            ResourceDimension::Texture2D { width, height, format } => {
                u64::from(width) * u64::from(height) * u64::from(format.bytes_per_pixel())
            }
        };
        ResourceAllocationInfo {
            size: align_up(bytes, DEFAULT_PLACEMENT_ALIGNMENT),
            alignment: DEFAULT_PLACEMENT_ALIGNMENT,
        }
    }

    fn content_size(dimension: &ResourceDimension) -> u64 {
        match *dimension {
            ResourceDimension::Buffer { size } => size,
            ResourceDimension::Texture2D { width, height, format } => {
                u64::from(width) * u64::from(height) * u64::from(format.bytes_per_pixel())
            }
        }
    }

    pub(crate) fn create_heap(&mut self, id: usize, label: String, heap_type: HeapType, size: u64, committed: bool) {
        let base = self.next_address;
        // One empty page between heaps so stray addresses never resolve.
        self.next_address = align_up(base + size.max(1), DEFAULT_PLACEMENT_ALIGNMENT) + DEFAULT_PLACEMENT_ALIGNMENT;
        self.heaps.insert(
            id,
            SoftHeap {
                label,
                heap_type,
                base,
                bytes: vec![0; size as usize],
                committed,
            },
        );
    }

    /// Removes the heap and every resource still placed in it.
    pub(crate) fn destroy_heap(&mut self, id: usize) -> Option<SoftHeap> {
        let heap = self.heaps.remove(&id)?;
        self.resources.retain(|_, resource| resource.heap != id);
        Some(heap)
    }

    pub(crate) fn place(
        &mut self,
        id: usize,
        heap: usize,
        offset: u64,
        descriptor: &ResourceDescriptor,
        state: ResourceState,
    ) -> Result<(), ResourceError> {
        let info = Self::allocation_info(descriptor);
        let target = self
            .heaps
            .get(&heap)
            .ok_or_else(|| ResourceError::BackendError(format!("Unknown heap {heap}")))?;
        if offset % info.alignment != 0 {
            return Err(ResourceError::BackendError(format!(
                "Placement offset {offset} is not aligned to {}",
                info.alignment
            )));
        }
        let capacity = target.bytes.len() as u64;
        if offset + info.size > capacity {
            return Err(ResourceError::OutOfBounds {
                offset,
                size: info.size,
                capacity,
            });
        }
        let heap_type = target.heap_type;
        let state = if heap_type.is_cpu_writable() {
            ResourceState::GenericRead
        } else if heap_type == HeapType::ReadBack {
            ResourceState::CopyDest
        } else {
            state
        };
        self.resources.insert(
            id,
            SoftResource {
                label: descriptor.label_or_default().to_string(),
                heap,
                offset,
                size: Self::content_size(&descriptor.dimension),
                dimension: descriptor.dimension,
                flags: descriptor.flags,
                heap_type,
                state,
            },
        );
        Ok(())
    }

    /// Drops a resource, and its heap when the resource was committed.
    pub(crate) fn destroy_resource(&mut self, id: usize) -> bool {
        let Some(resource) = self.resources.remove(&id) else {
            return false;
        };
        if self.heaps.get(&resource.heap).is_some_and(|heap| heap.committed) {
            self.heaps.remove(&resource.heap);
        }
        true
    }

    pub(crate) fn heap(&self, id: usize) -> Option<&SoftHeap> {
        self.heaps.get(&id)
    }

    /// Number of placement heaps; committed resources are not counted.
    pub(crate) fn heap_count(&self) -> usize {
        self.heaps.values().filter(|heap| !heap.committed).count()
    }

    pub(crate) fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub(crate) fn resource(&self, id: ResourceId) -> Result<&SoftResource, ResourceError> {
        self.resources.get(&id.0).ok_or(ResourceError::InvalidHandle(id))
    }

    pub(crate) fn resource_mut(&mut self, id: ResourceId) -> Result<&mut SoftResource, ResourceError> {
        self.resources.get_mut(&id.0).ok_or(ResourceError::InvalidHandle(id))
    }

    pub(crate) fn gpu_address(&self, id: ResourceId) -> Result<GpuVirtualAddress, ResourceError> {
        let resource = self.resource(id)?;
        let heap = self
            .heaps
            .get(&resource.heap)
            .ok_or(ResourceError::InvalidHandle(id))?;
        Ok(GpuVirtualAddress(heap.base + resource.offset))
    }

    fn span(&self, id: ResourceId, offset: u64, len: u64) -> Result<(usize, std::ops::Range<usize>), ResourceError> {
        let resource = self.resource(id)?;
        if offset + len > resource.size {
            return Err(ResourceError::OutOfBounds {
                offset,
                size: len,
                capacity: resource.size,
            });
        }
        let start = (resource.offset + offset) as usize;
        Ok((resource.heap, start..start + len as usize))
    }

    pub(crate) fn read(&self, id: ResourceId, offset: u64, len: u64) -> Result<&[u8], ResourceError> {
        let (heap, range) = self.span(id, offset, len)?;
        self.heaps
            .get(&heap)
            .map(|heap| &heap.bytes[range])
            .ok_or(ResourceError::InvalidHandle(id))
    }

    pub(crate) fn write(&mut self, id: ResourceId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let (heap, range) = self.span(id, offset, data.len() as u64)?;
        let heap = self.heaps.get_mut(&heap).ok_or(ResourceError::InvalidHandle(id))?;
        heap.bytes[range].copy_from_slice(data);
        Ok(())
    }

    pub(crate) fn fill(&mut self, id: ResourceId, pattern: &[u8]) -> Result<(), ResourceError> {
        let size = self.resource(id)?.size;
        let (heap, range) = self.span(id, 0, size)?;
        let heap = self.heaps.get_mut(&heap).ok_or(ResourceError::InvalidHandle(id))?;
        if pattern.is_empty() {
            return Ok(());
        }
        for chunk in heap.bytes[range].chunks_mut(pattern.len()) {
            chunk.copy_from_slice(&pattern[..chunk.len()]);
        }
        Ok(())
    }

    pub(crate) fn copy(
        &mut self,
        destination: ResourceId,
        destination_offset: u64,
        source: ResourceId,
        source_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError> {
        let bytes = self.read(source, source_offset, size)?.to_vec();
        self.write(destination, destination_offset, &bytes)
    }

    /// Finds the resource whose bytes contain `address`.
    pub(crate) fn resource_at(&self, address: GpuVirtualAddress) -> Option<(ResourceId, u64)> {
        self.resources.iter().find_map(|(&id, resource)| {
            let base = self.heaps.get(&resource.heap)?.base + resource.offset;
            let end = base + resource.size;
            (address.0 >= base && address.0 < end).then(|| (ResourceId(id), address.0 - base))
        })
    }

    /// Reads `len` bytes starting at a GPU virtual address.
    pub(crate) fn read_address(&self, address: GpuVirtualAddress, len: u64) -> Result<&[u8], ResourceError> {
        let heap = self
            .heaps
            .values()
            .find(|heap| address.0 >= heap.base && address.0 < heap.base + heap.bytes.len() as u64)
            .ok_or_else(|| ResourceError::BackendError(format!("Address {:#x} is not mapped", address.0)))?;
        let start = address.0 - heap.base;
        let capacity = heap.bytes.len() as u64;
        if start + len > capacity {
            return Err(ResourceError::OutOfBounds {
                offset: start,
                size: len,
                capacity,
            });
        }
        Ok(&heap.bytes[start as usize..(start + len) as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesta_core::renderer::api::TextureFormat;

    fn memory_with_heap(heap_type: HeapType) -> SoftMemory {
        let mut memory = SoftMemory::default();
        memory.create_heap(1, "heap".into(), heap_type, 4 * DEFAULT_PLACEMENT_ALIGNMENT, false);
        memory
    }

    #[test]
    fn placed_resources_share_the_heap_bytes() {
        let mut memory = memory_with_heap(HeapType::Upload);
        let descriptor = ResourceDescriptor::buffer("a", 8);
        memory.place(10, 1, 0, &descriptor, ResourceState::Common).unwrap();
        memory
            .place(11, 1, DEFAULT_PLACEMENT_ALIGNMENT, &descriptor, ResourceState::Common)
            .unwrap();

        memory.write(ResourceId(11), 2, &[9, 9]).unwrap();

        assert_eq!(memory.read(ResourceId(11), 0, 4).unwrap(), &[0, 0, 9, 9]);
        assert_eq!(memory.resource(ResourceId(10)).unwrap().state, ResourceState::GenericRead);
        let address = memory.gpu_address(ResourceId(11)).unwrap();
        assert_eq!(memory.read_address(address.offset(2), 2).unwrap(), &[9, 9]);
        assert_eq!(memory.resource_at(address.offset(3)), Some((ResourceId(11), 3)));
    }

    #[test]
    fn lookup_below_higher_resources_finds_the_lowest_one() {
        let mut memory = memory_with_heap(HeapType::GpuOnly);
        let descriptor = ResourceDescriptor::buffer("slot", 16);
        for (id, slot) in (20..24).zip(0u64..) {
            memory
                .place(id, 1, slot * DEFAULT_PLACEMENT_ALIGNMENT, &descriptor, ResourceState::Common)
                .unwrap();
        }

        let lowest = memory.gpu_address(ResourceId(20)).unwrap();

        assert_eq!(memory.resource_at(lowest.offset(4)), Some((ResourceId(20), 4)));
        assert_eq!(memory.resource_at(lowest.offset(16)), None);
        let highest = memory.gpu_address(ResourceId(23)).unwrap();
        assert_eq!(memory.resource_at(highest), Some((ResourceId(23), 0)));
    }

    #[test]
    fn accesses_past_the_resource_end_fail() {
        let mut memory = memory_with_heap(HeapType::GpuOnly);
        memory
            .place(3, 1, 0, &ResourceDescriptor::buffer("small", 4), ResourceState::Common)
            .unwrap();
        assert!(matches!(
            memory.write(ResourceId(3), 2, &[0; 4]),
            Err(ResourceError::OutOfBounds { capacity: 4, .. })
        ));
    }

    #[test]
    fn misaligned_or_oversized_placements_fail() {
        let mut memory = memory_with_heap(HeapType::GpuOnly);
        let texture = ResourceDescriptor::texture_2d("big", 512, 512, TextureFormat::Rgba8Unorm);
        assert!(memory.place(1, 1, 256, &ResourceDescriptor::buffer("b", 4), ResourceState::Common).is_err());
        assert!(memory.place(2, 1, 0, &texture, ResourceState::Common).is_err());
    }

    #[test]
    fn destroying_a_heap_drops_its_resources() {
        let mut memory = memory_with_heap(HeapType::GpuOnly);
        memory
            .place(5, 1, 0, &ResourceDescriptor::buffer("b", 4), ResourceState::Common)
            .unwrap();
        assert!(memory.destroy_heap(1).is_some());
        assert_eq!(memory.resource_count(), 0);
        assert_eq!(memory.heap_count(), 0);
    }
}
