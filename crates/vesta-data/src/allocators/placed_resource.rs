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

use super::HeapPools;
use vesta_core::renderer::api::{
    GpuVirtualAddress, HeapType, ResourceAllocationInfo, ResourceDescriptor, ResourceId, ResourceState,
};
use vesta_core::renderer::{GraphicsDevice, ResourceError};

/// A resource that reserves its heap space first and is placed once the heap exists.
#[derive(Debug)]
pub struct PlacedResource {
    heap_type: HeapType,
    descriptor: ResourceDescriptor<'static>,
    allocation: Option<ResourceAllocationInfo>,
    offset: Option<u64>,
    resource: Option<ResourceId>,
}

impl PlacedResource {
    /// Describes a resource living in a heap of `heap_type`.
    pub fn new(heap_type: HeapType, descriptor: ResourceDescriptor<'static>) -> Self {
        Self {
            heap_type,
            descriptor,
            allocation: None,
            offset: None,
            resource: None,
        }
    }

    /// The heap class the resource lives in.
    pub fn heap_type(&self) -> HeapType {
        self.heap_type
    }

    /// The resource description.
    pub fn descriptor(&self) -> &ResourceDescriptor<'static> {
        &self.descriptor
    }

    /// Reserves heap space and returns the offset of the resource in its heap.
    pub fn reserve(&mut self, device: &dyn GraphicsDevice, pools: &mut HeapPools) -> Result<u64, ResourceError> {
        let allocation = device.resource_allocation_info(&self.descriptor);
        let offset = pools.reserve(self.heap_type, allocation.size, allocation.alignment)?;
        self.allocation = Some(allocation);
        self.offset = Some(offset);
        Ok(offset)
    }

    /// Byte offset in the heap, once reserved.
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Bytes the resource occupies in its heap, once reserved.
    pub fn allocation(&self) -> Option<ResourceAllocationInfo> {
        self.allocation
    }

    /// Creates the resource at its reserved offset.
    pub fn place(
        &mut self,
        device: &dyn GraphicsDevice,
        pools: &HeapPools,
        initial_state: ResourceState,
    ) -> Result<ResourceId, ResourceError> {
        let offset = self.offset.ok_or(ResourceError::HeapNotCreated(self.heap_type))?;
        let heap = pools.heap(self.heap_type)?;
        let resource = device.create_placed_resource(heap, offset, &self.descriptor, initial_state)?;
        log::trace!(
            "PlacedResource({}): placed at {:?}+{offset}",
            self.descriptor.label_or_default(),
            self.heap_type
        );
        self.resource = Some(resource);
        Ok(resource)
    }

    /// The placed resource.
    pub fn resource(&self) -> Option<ResourceId> {
        self.resource
    }

    /// The placed resource, or an error naming the unplaced resource's heap.
    pub fn try_resource(&self) -> Result<ResourceId, ResourceError> {
        self.resource.ok_or(ResourceError::HeapNotCreated(self.heap_type))
    }

    /// GPU virtual address of the placed buffer.
    pub fn gpu_address(&self, device: &dyn GraphicsDevice) -> Result<GpuVirtualAddress, ResourceError> {
        device.gpu_virtual_address(self.try_resource()?)
    }

    /// Writes through the CPU mapping of the placed resource.
    pub fn write(&self, device: &dyn GraphicsDevice, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        device.write_mapped(self.try_resource()?, offset, data)
    }

    /// Destroys the placed resource. Its reservation stays valid until the heap is released.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        if let Some(resource) = self.resource.take() {
            device.destroy_resource(resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesta_infra::graphics::soft::SoftDevice;

    #[test]
    fn reserve_then_place_then_write() {
        let device = SoftDevice::new();
        let mut pools = HeapPools::new();
        let mut first = PlacedResource::new(HeapType::CpuWrite, ResourceDescriptor::buffer("first", 16));
        let mut second = PlacedResource::new(HeapType::CpuWrite, ResourceDescriptor::buffer("second", 16));

        first.reserve(device.as_ref(), &mut pools).unwrap();
        let offset = second.reserve(device.as_ref(), &mut pools).unwrap();
        assert!(offset >= 16);
        assert!(second.place(device.as_ref(), &pools, ResourceState::GenericRead).is_err());

        pools.create_heaps(device.as_ref()).unwrap();
        first.place(device.as_ref(), &pools, ResourceState::GenericRead).unwrap();
        second.place(device.as_ref(), &pools, ResourceState::GenericRead).unwrap();

        second.write(device.as_ref(), 0, &[7, 8, 9]).unwrap();
        let mut out = [0u8; 3];
        device.read_mapped(second.resource().unwrap(), 0, &mut out).unwrap();
        assert_eq!(out, [7, 8, 9]);

        second.release(device.as_ref());
        assert!(second.resource().is_none());
    }
}
