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
    CpuDescriptorHandle, DescriptorHeapDescriptor, DescriptorHeapId, DescriptorHeapKind, GpuDescriptorHandle,
};
use vesta_core::renderer::{GraphicsDevice, ResourceError};
use vesta_core::sync::SharedAddress;

/// Deferred location of one texture view.
#[derive(Debug, Clone, Default)]
pub struct ResourceAddress {
    /// Slot of the view in the shader-visible table.
    pub index: SharedAddress<usize>,
    /// Staging handle the view has to be written to.
    pub cpu_handle: SharedAddress<CpuDescriptorHandle>,
}

/// Deferred location of a contiguous run of view slots.
#[derive(Debug, Clone)]
pub struct DescriptorRange {
    count: usize,
    start: SharedAddress<usize>,
    cpu_start: SharedAddress<CpuDescriptorHandle>,
    gpu_start: SharedAddress<GpuDescriptorHandle>,
    increment: SharedAddress<u32>,
}

impl DescriptorRange {
    fn new(count: usize) -> Self {
        Self {
            count,
            start: SharedAddress::new(),
            cpu_start: SharedAddress::new(),
            gpu_start: SharedAddress::new(),
            increment: SharedAddress::new(),
        }
    }

    /// Number of slots.
    pub fn count(&self) -> usize {
        self.count
    }

    /// First slot of the range in the table.
    pub fn start(&self) -> usize {
        self.start.get_or_default()
    }

    /// Staging handle of slot `index` of the range.
    pub fn cpu_handle(&self, index: usize) -> CpuDescriptorHandle {
        debug_assert!(index < self.count, "descriptor {index} outside a range of {}", self.count);
        self.cpu_start
            .get_or_default()
            .offset(index as u64, self.increment.get_or_default())
    }

    /// Shader-visible handle of slot `index` of the range.
    pub fn gpu_handle(&self, index: usize) -> GpuDescriptorHandle {
        debug_assert!(index < self.count, "descriptor {index} outside a range of {}", self.count);
        self.gpu_start
            .get_or_default()
            .offset(index as u64, self.increment.get_or_default())
    }

    /// Returns `true` once the table was created.
    pub fn is_resolved(&self) -> bool {
        self.start.is_resolved()
    }

    fn resolve(
        &self,
        start: usize,
        cpu_table: CpuDescriptorHandle,
        gpu_table: GpuDescriptorHandle,
        increment: u32,
    ) -> Result<(), ResourceError> {
        fn already<T>(_: T) -> ResourceError {
            ResourceError::AlreadyResolved("descriptor range")
        }
        self.start.resolve(start).map_err(already)?;
        self.cpu_start
            .resolve(cpu_table.offset(start as u64, increment))
            .map_err(already)?;
        self.gpu_start
            .resolve(gpu_table.offset(start as u64, increment))
            .map_err(already)?;
        self.increment.resolve(increment).map_err(already)
    }
}

/// Builds the one shader-visible CBV/SRV/UAV table every draw and dispatch binds.
///
/// Texture views are requested one at a time with
/// [`DescriptorTableManager::get_texture_index`]; other subsystems reserve contiguous
/// runs with [`DescriptorTableManager::reserve_descriptors`]. Nothing may be
/// dereferenced before [`DescriptorTableManager::create_descriptor_table`], which lays
/// textures out from slot 0 in request order and the reserved runs after them, in
/// reservation order.
///
/// Views are written into a non-shader-visible staging table and copied into the
/// visible one with [`DescriptorTableManager::copy_upload_heap`].
#[derive(Debug, Default)]
pub struct DescriptorTableManager {
    textures: Vec<ResourceAddress>,
    texture_count: usize,
    ranges: Vec<DescriptorRange>,
    descriptor_count: usize,
    increment: u32,
    staging: Option<DescriptorHeapId>,
    visible: Option<DescriptorHeapId>,
    texture_range_start: GpuDescriptorHandle,
}

impl DescriptorTableManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the slot of one texture view.
    pub fn get_texture_index(&mut self) -> ResourceAddress {
        debug_assert!(self.visible.is_none(), "texture index requested after table creation");
        let address = ResourceAddress::default();
        self.textures.push(address.clone());
        self.texture_count += 1;
        address
    }

    /// Reserves `count` contiguous slots for non-texture views.
    pub fn reserve_descriptors(&mut self, count: usize) -> DescriptorRange {
        debug_assert!(self.visible.is_none(), "descriptors reserved after table creation");
        let range = DescriptorRange::new(count);
        self.ranges.push(range.clone());
        range
    }

    /// Creates the staging and shader-visible tables and resolves every handle.
    ///
    /// The tables hold `max(1, requested)` slots.
    pub fn create_descriptor_table(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        if self.visible.is_some() {
            return Err(ResourceError::BackendError(
                "descriptor table was already created".to_string(),
            ));
        }

        let requested = self.textures.len() + self.ranges.iter().map(DescriptorRange::count).sum::<usize>();
        self.descriptor_count = requested.max(1);
        self.increment = device.descriptor_increment_size(DescriptorHeapKind::CbvSrvUav);

        let staging = device.create_descriptor_heap(&DescriptorHeapDescriptor {
            label: Some("descriptor staging table"),
            kind: DescriptorHeapKind::CbvSrvUav,
            count: self.descriptor_count as u32,
            shader_visible: false,
        })?;
        let visible = device.create_descriptor_heap(&DescriptorHeapDescriptor {
            label: Some("descriptor table"),
            kind: DescriptorHeapKind::CbvSrvUav,
            count: self.descriptor_count as u32,
            shader_visible: true,
        })?;
        self.staging = Some(staging);
        self.visible = Some(visible);

        let cpu_start = device.cpu_descriptor_start(staging)?;
        let gpu_start = device.gpu_descriptor_start(visible)?;

        let mut slot = 0usize;
        for texture in &self.textures {
            texture
                .index
                .resolve(slot)
                .map_err(|_| ResourceError::AlreadyResolved("texture slot"))?;
            texture
                .cpu_handle
                .resolve(cpu_start.offset(slot as u64, self.increment))
                .map_err(|_| ResourceError::AlreadyResolved("texture staging handle"))?;
            slot += 1;
        }
        for range in &self.ranges {
            range.resolve(slot, cpu_start, gpu_start, self.increment)?;
            slot += range.count;
        }
        self.texture_range_start = gpu_start;

        log::info!(
            "DescriptorTableManager: table created with {} slots ({} textures, {} reserved ranges)",
            self.descriptor_count,
            self.textures.len(),
            self.ranges.len()
        );
        Ok(())
    }

    /// Copies every staged view into the shader-visible table.
    pub fn copy_upload_heap(&self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        let (Some(staging), Some(visible)) = (self.staging, self.visible) else {
            return Err(ResourceError::BackendError(
                "descriptor staging table is not available".to_string(),
            ));
        };
        device.copy_descriptors_simple(
            self.descriptor_count as u32,
            device.cpu_descriptor_start(visible)?,
            device.cpu_descriptor_start(staging)?,
            DescriptorHeapKind::CbvSrvUav,
        )
    }

    /// Destroys the staging table and forgets the staging handles.
    pub fn release_upload_heap(&mut self, device: &dyn GraphicsDevice) {
        if let Some(staging) = self.staging.take() {
            device.destroy_descriptor_heap(staging);
        }
        self.textures.clear();
        log::debug!("DescriptorTableManager: staging table released");
    }

    /// The shader-visible table, once created.
    pub fn descriptor_heap(&self) -> Option<DescriptorHeapId> {
        self.visible
    }

    /// Shader-visible handle of the first texture slot.
    pub fn texture_range_start(&self) -> GpuDescriptorHandle {
        self.texture_range_start
    }

    /// Number of texture views registered.
    pub fn texture_descriptor_count(&self) -> usize {
        self.texture_count
    }

    /// Total number of slots of the created table.
    pub fn descriptor_count(&self) -> usize {
        self.descriptor_count
    }

    /// Distance between two handles of the table.
    pub fn increment_size(&self) -> u32 {
        self.increment
    }

    /// Destroys both tables.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        self.release_upload_heap(device);
        if let Some(visible) = self.visible.take() {
            device.destroy_descriptor_heap(visible);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesta_core::renderer::api::{GpuVirtualAddress, ViewDescriptor};
    use vesta_infra::graphics::soft::SoftDevice;

    #[test]
    fn texture_indices_are_contiguous_from_zero() {
        let device = SoftDevice::new();
        let mut table = DescriptorTableManager::new();
        let addresses: Vec<_> = (0..3).map(|_| table.get_texture_index()).collect();
        assert!(!addresses[0].index.is_resolved());

        table.create_descriptor_table(device.as_ref()).unwrap();

        let indices: Vec<usize> = addresses.iter().map(|a| a.index.get_or_default()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(table.descriptor_count(), 3);
        assert_eq!(table.texture_descriptor_count(), 3);

        let first = addresses[0].cpu_handle.get_or_default();
        assert_eq!(
            addresses[2].cpu_handle.get_or_default(),
            first.offset(2, table.increment_size())
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "resolved twice")]
    fn a_handle_resolved_elsewhere_trips_the_debug_assertion() {
        let device = SoftDevice::new();
        let mut table = DescriptorTableManager::new();
        let address = table.get_texture_index();
        address.index.resolve(7).unwrap();
        let _ = table.create_descriptor_table(device.as_ref());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn a_handle_resolved_elsewhere_fails_table_creation() {
        let device = SoftDevice::new();
        let mut table = DescriptorTableManager::new();
        let address = table.get_texture_index();
        address.index.resolve(7).unwrap();
        assert!(matches!(
            table.create_descriptor_table(device.as_ref()),
            Err(ResourceError::AlreadyResolved("texture slot"))
        ));
        assert_eq!(address.index.get(), Some(7));
    }

    #[test]
    fn empty_table_still_has_one_slot() {
        let device = SoftDevice::new();
        let mut table = DescriptorTableManager::new();
        table.create_descriptor_table(device.as_ref()).unwrap();
        assert_eq!(table.descriptor_count(), 1);
        assert_eq!(table.texture_descriptor_count(), 0);
        assert!(table.descriptor_heap().is_some());
    }

    #[test]
    fn reserved_ranges_follow_the_textures() {
        let device = SoftDevice::new();
        let mut table = DescriptorTableManager::new();
        let range = table.reserve_descriptors(2);
        let texture = table.get_texture_index();
        let frames = table.reserve_descriptors(3);

        table.create_descriptor_table(device.as_ref()).unwrap();

        assert_eq!(texture.index.get_or_default(), 0);
        assert_eq!(range.start(), 1);
        assert_eq!(frames.start(), 3);
        assert_eq!(table.descriptor_count(), 6);
        assert_eq!(
            frames.gpu_handle(2),
            range.gpu_handle(0).offset(4, table.increment_size())
        );
    }

    #[test]
    fn staged_views_reach_the_visible_table() {
        let device = SoftDevice::new();
        let mut table = DescriptorTableManager::new();
        let range = table.reserve_descriptors(1);
        table.create_descriptor_table(device.as_ref()).unwrap();

        let view = ViewDescriptor::ConstantBuffer {
            address: GpuVirtualAddress(0x100),
            size: 256,
        };
        device.create_view(&view, range.cpu_handle(0)).unwrap();
        table.copy_upload_heap(device.as_ref()).unwrap();
        table.release_upload_heap(device.as_ref());

        assert_eq!(table.texture_descriptor_count(), 0);
        assert_eq!(device.debug_view(range.gpu_handle(0)), Some(view));
        assert!(table.copy_upload_heap(device.as_ref()).is_err());
    }
}
