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

use vesta_core::renderer::api::{
    CpuDescriptorHandle, DescriptorHeapDescriptor, DescriptorHeapId, DescriptorHeapKind, HeapType, ResourceDescriptor,
    ResourceFlags, ResourceId, ResourceState, TextureFormat, ViewDescriptor,
};
use vesta_core::renderer::{CommandList, GraphicsDevice, ResourceError};
use vesta_data::allocators::HeapAllocator;

/// Format of the depth buffer.
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::D32Float;

/// Depth every frame starts from.
pub const DEPTH_CLEAR_VALUE: f32 = 1.0;

/// A window-sized depth texture with its own GPU-only heap and a one-slot DSV table.
///
/// The heap holds nothing else, so a resize can drop and recreate it without touching
/// the engine's shared pools.
#[derive(Debug)]
pub struct DepthBuffer {
    pool: HeapAllocator,
    dsv_heap: Option<DescriptorHeapId>,
    dsv: Option<CpuDescriptorHandle>,
    texture: Option<ResourceId>,
    size: (u32, u32),
}

impl DepthBuffer {
    /// Creates a `width` x `height` depth buffer in the depth-write state.
    pub fn new(device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<Self, ResourceError> {
        let mut depth = Self {
            pool: HeapAllocator::new(HeapType::GpuOnly),
            dsv_heap: None,
            dsv: None,
            texture: None,
            size: (0, 0),
        };
        depth.create(device, width, height)?;
        Ok(depth)
    }

    fn create(&mut self, device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<(), ResourceError> {
        let descriptor = ResourceDescriptor::texture_2d("depth buffer", width, height, DEPTH_FORMAT)
            .with_flags(ResourceFlags::ALLOW_DEPTH_STENCIL);
        let allocation = device.resource_allocation_info(&descriptor);
        let offset = self
            .pool
            .reserve_size_and_get_offset(allocation.size, allocation.alignment)?;
        self.pool.create_heap(device)?;
        let texture = device.create_placed_resource(self.pool.heap()?, offset, &descriptor, ResourceState::DepthWrite)?;

        let dsv_heap = match self.dsv_heap {
            Some(heap) => heap,
            None => {
                let heap = device.create_descriptor_heap(&DescriptorHeapDescriptor {
                    label: Some("depth stencil view"),
                    kind: DescriptorHeapKind::Dsv,
                    count: 1,
                    shader_visible: false,
                })?;
                self.dsv_heap = Some(heap);
                heap
            }
        };
        let dsv = device.cpu_descriptor_start(dsv_heap)?;
        device.create_view(&ViewDescriptor::DepthStencil { resource: texture }, dsv)?;

        self.texture = Some(texture);
        self.dsv = Some(dsv);
        self.size = (width, height);
        log::debug!("DepthBuffer: created {width}x{height}");
        Ok(())
    }

    /// Rebuilds the texture and its heap at the new size. The GPU must be done with the
    /// old texture.
    pub fn resize(&mut self, device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<(), ResourceError> {
        self.release_texture(device);
        self.create(device, width, height)
    }

    fn release_texture(&mut self, device: &dyn GraphicsDevice) {
        if let Some(texture) = self.texture.take() {
            device.destroy_resource(texture);
        }
        self.pool.release(device);
        self.dsv = None;
    }

    /// The depth-stencil view.
    pub fn dsv(&self) -> Option<CpuDescriptorHandle> {
        self.dsv
    }

    /// The depth texture.
    pub fn texture(&self) -> Option<ResourceId> {
        self.texture
    }

    /// Current size in pixels.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Records a clear to [`DEPTH_CLEAR_VALUE`].
    pub fn clear(&self, list: &mut dyn CommandList) {
        if let Some(dsv) = self.dsv {
            list.clear_depth_stencil_view(dsv, DEPTH_CLEAR_VALUE);
        }
    }

    /// Destroys the texture, its heap and the DSV table.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        self.release_texture(device);
        if let Some(heap) = self.dsv_heap.take() {
            device.destroy_descriptor_heap(heap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesta_infra::graphics::soft::SoftDevice;

    #[test]
    fn starts_writable_in_its_own_heap() {
        let device = SoftDevice::new();
        let depth = DepthBuffer::new(&*device, 64, 32).unwrap();

        assert_eq!(depth.size(), (64, 32));
        assert_eq!(device.heap_count(), 1);
        assert_eq!(device.descriptor_heap_count(), 1);
        assert_eq!(
            device.resource_state(depth.texture().unwrap()),
            Some(ResourceState::DepthWrite)
        );
    }

    #[test]
    fn resize_rebuilds_the_texture_and_keeps_one_heap() {
        let device = SoftDevice::new();
        let mut depth = DepthBuffer::new(&*device, 64, 32).unwrap();
        let before = depth.texture();

        depth.resize(&*device, 128, 128).unwrap();

        assert_ne!(depth.texture(), before);
        assert_eq!(depth.size(), (128, 128));
        assert_eq!(device.heap_count(), 1);
        assert_eq!(device.resource_count(), 1);
        assert_eq!(device.descriptor_heap_count(), 1);
    }

    #[test]
    fn release_frees_everything() {
        let device = SoftDevice::new();
        let mut depth = DepthBuffer::new(&*device, 8, 8).unwrap();

        depth.release(&*device);

        assert_eq!(device.heap_count(), 0);
        assert_eq!(device.resource_count(), 0);
        assert_eq!(device.descriptor_heap_count(), 0);
        assert!(depth.dsv().is_none());
    }
}
