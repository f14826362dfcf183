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

use crate::allocators::{HeapPools, PlacedResource};
use std::sync::Arc;
use vesta_core::renderer::api::{
    GpuVirtualAddress, HeapType, ResourceDescriptor, ResourceFlags, ResourceId, ResourceState,
};
use vesta_core::renderer::{CommandList, GraphicsDevice, ResourceError};

/// A CPU-side write into mapped memory, runnable on a worker thread.
pub struct UploadJob {
    device: Arc<dyn GraphicsDevice>,
    resource: ResourceId,
    offset: u64,
    data: Arc<Vec<u8>>,
}

impl UploadJob {
    /// Creates a job writing `data` at `offset` of `resource`.
    pub fn new(device: Arc<dyn GraphicsDevice>, resource: ResourceId, offset: u64, data: Arc<Vec<u8>>) -> Self {
        Self {
            device,
            resource,
            offset,
            data,
        }
    }

    /// Performs the write.
    pub fn run(self) -> Result<(), ResourceError> {
        self.device.write_mapped(self.resource, self.offset, &self.data)
    }

    /// Boxes the job for [`run_and_wait`](vesta_core::sync::run_and_wait).
    pub fn boxed(self) -> Box<dyn FnOnce() -> Result<(), ResourceError> + Send> {
        Box::new(move || self.run())
    }
}

/// A GPU-only buffer together with the upload buffer it is initialized from.
///
/// The upload half lives only until the copy recorded by
/// [`UploadableBuffer::record_upload`] has executed.
#[derive(Debug)]
pub struct UploadableBuffer {
    size: u64,
    upload: PlacedResource,
    gpu: PlacedResource,
}

impl UploadableBuffer {
    /// Describes a buffer of `size` bytes. `flags` apply to the GPU-only half.
    pub fn new(label: &str, size: u64, flags: ResourceFlags) -> Self {
        Self {
            size,
            upload: PlacedResource::new(
                HeapType::Upload,
                ResourceDescriptor::buffer(format!("{label} (upload)"), size),
            ),
            gpu: PlacedResource::new(
                HeapType::GpuOnly,
                ResourceDescriptor::buffer(label.to_string(), size).with_flags(flags),
            ),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reserves both halves.
    pub fn reserve(&mut self, device: &dyn GraphicsDevice, pools: &mut HeapPools) -> Result<(), ResourceError> {
        self.upload.reserve(device, pools)?;
        self.gpu.reserve(device, pools)?;
        Ok(())
    }

    /// Places both halves. The GPU-only buffer starts in the common state and is
    /// promoted by the first copy.
    pub fn place(&mut self, device: &dyn GraphicsDevice, pools: &HeapPools) -> Result<(), ResourceError> {
        self.upload.place(device, pools, ResourceState::GenericRead)?;
        self.gpu.place(device, pools, ResourceState::Common)?;
        Ok(())
    }

    /// Writes into the upload half.
    pub fn write(&self, device: &dyn GraphicsDevice, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.upload.write(device, offset, data)
    }

    /// A job writing `data` at `offset` of the upload half.
    pub fn write_job(&self, device: &Arc<dyn GraphicsDevice>, offset: u64, data: Arc<Vec<u8>>) -> Result<UploadJob, ResourceError> {
        Ok(UploadJob::new(Arc::clone(device), self.upload.try_resource()?, offset, data))
    }

    /// Records the copy of the whole upload half into the GPU-only half.
    pub fn record_upload(&self, list: &mut dyn CommandList) -> Result<(), ResourceError> {
        let destination = self.gpu.try_resource()?;
        let source = self.upload.try_resource()?;
        list.copy_buffer_region(destination, 0, source, 0, self.size);
        Ok(())
    }

    /// Destroys the upload half.
    pub fn release_upload(&mut self, device: &dyn GraphicsDevice) {
        self.upload.release(device);
    }

    /// Returns `true` while the upload half exists.
    pub fn has_upload(&self) -> bool {
        self.upload.resource().is_some()
    }

    /// The GPU-only buffer.
    pub fn gpu_resource(&self) -> Result<ResourceId, ResourceError> {
        self.gpu.try_resource()
    }

    /// GPU virtual address of the GPU-only buffer.
    pub fn gpu_address(&self, device: &dyn GraphicsDevice) -> Result<GpuVirtualAddress, ResourceError> {
        self.gpu.gpu_address(device)
    }

    /// Destroys both halves.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        self.upload.release(device);
        self.gpu.release(device);
    }
}
