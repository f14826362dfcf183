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

use super::{UploadJob, UploadableBuffer};
use crate::allocators::HeapPools;
use std::sync::Arc;
use vesta_core::renderer::api::{GpuVirtualAddress, ResourceFlags, ResourceId};
use vesta_core::renderer::{CommandList, GraphicsDevice, ResourceError};
use vesta_core::sync::SharedAddress;

/// Packs many byte ranges (vertex or index data) into one GPU-only buffer.
///
/// Data is appended to a CPU staging buffer while models register. The order of
/// operations afterwards is fixed: [`ResourceBuffer::reserve`] once every range was
/// added, [`ResourceBuffer::create_buffer`] after the heaps exist,
/// [`ResourceBuffer::copy_data`] (or the job from [`ResourceBuffer::upload_job`]), then
/// [`ResourceBuffer::record_upload`], and [`ResourceBuffer::release_upload_buffer`] only
/// after the copy executed.
#[derive(Debug)]
pub struct ResourceBuffer {
    label: String,
    staging: Arc<Vec<u8>>,
    shared_addresses: Vec<(u64, SharedAddress<GpuVirtualAddress>)>,
    buffer: Option<UploadableBuffer>,
}

impl ResourceBuffer {
    /// Creates an empty buffer.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            staging: Arc::new(Vec::new()),
            shared_addresses: Vec::new(),
            buffer: None,
        }
    }

    /// Appends a copy of `data` and returns its byte offset.
    pub fn add_data(&mut self, data: &[u8]) -> u64 {
        debug_assert!(
            self.buffer.is_none(),
            "ResourceBuffer({}): data added after reservation",
            self.label
        );
        let staging = Arc::make_mut(&mut self.staging);
        let offset = staging.len() as u64;
        staging.extend_from_slice(data);
        offset
    }

    /// Appends a copy of `data` and returns its future GPU address.
    pub fn add_data_and_get_shared_address(&mut self, data: &[u8]) -> SharedAddress<GpuVirtualAddress> {
        let offset = self.add_data(data);
        let address = SharedAddress::new();
        self.shared_addresses.push((offset, address.clone()));
        address
    }

    /// Total bytes added so far.
    pub fn size(&self) -> u64 {
        self.staging.len() as u64
    }

    /// Returns `true` if no data was added.
    pub fn is_empty(&self) -> bool {
        self.staging.is_empty()
    }

    /// The staged bytes.
    pub fn staged_bytes(&self) -> &[u8] {
        &self.staging
    }

    /// Reserves upload and GPU-only space for everything added. An empty buffer reserves
    /// nothing.
    pub fn reserve(&mut self, device: &dyn GraphicsDevice, pools: &mut HeapPools) -> Result<(), ResourceError> {
        if self.is_empty() {
            log::debug!("ResourceBuffer({}): empty, nothing to reserve", self.label);
            return Ok(());
        }
        let mut buffer = UploadableBuffer::new(&self.label, self.size(), ResourceFlags::NONE);
        buffer.reserve(device, pools)?;
        self.buffer = Some(buffer);
        Ok(())
    }

    /// Places the buffers and resolves every shared address to `base + offset`.
    pub fn create_buffer(&mut self, device: &dyn GraphicsDevice, pools: &HeapPools) -> Result<(), ResourceError> {
        let Some(buffer) = self.buffer.as_mut() else {
            return Ok(());
        };
        buffer.place(device, pools)?;

        let base = buffer.gpu_address(device)?;
        for (offset, address) in &self.shared_addresses {
            address
                .resolve(base.offset(*offset))
                .map_err(|_| ResourceError::AlreadyResolved("resource buffer address"))?;
        }
        log::debug!(
            "ResourceBuffer({}): placed {} bytes at {:#x}",
            self.label,
            self.size(),
            base.0
        );
        Ok(())
    }

    /// Copies the staged bytes into the upload buffer.
    pub fn copy_data(&self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        match &self.buffer {
            Some(buffer) => buffer.write(device, 0, &self.staging),
            None => Ok(()),
        }
    }

    /// The copy of [`ResourceBuffer::copy_data`] as a job for a worker pool, if there is
    /// anything to copy.
    pub fn upload_job(&self, device: &Arc<dyn GraphicsDevice>) -> Result<Option<UploadJob>, ResourceError> {
        self.buffer
            .as_ref()
            .map(|buffer| buffer.write_job(device, 0, Arc::clone(&self.staging)))
            .transpose()
    }

    /// Records the GPU copy from the upload buffer.
    pub fn record_upload(&self, list: &mut dyn CommandList) -> Result<(), ResourceError> {
        match &self.buffer {
            Some(buffer) => buffer.record_upload(list),
            None => Ok(()),
        }
    }

    /// Drops the staged bytes and the upload buffer. The recorded copy must have executed.
    pub fn release_upload_buffer(&mut self, device: &dyn GraphicsDevice) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.release_upload(device);
        }
        self.staging = Arc::new(Vec::new());
    }

    /// The GPU-only buffer, once placed.
    pub fn gpu_resource(&self) -> Option<ResourceId> {
        self.buffer.as_ref().and_then(|buffer| buffer.gpu_resource().ok())
    }

    /// Address of the GPU-only buffer, once placed.
    pub fn gpu_address(&self, device: &dyn GraphicsDevice) -> Option<GpuVirtualAddress> {
        self.buffer.as_ref().and_then(|buffer| buffer.gpu_address(device).ok())
    }

    /// Size of the GPU-only buffer in bytes (zero when nothing was added).
    pub fn gpu_size(&self) -> u64 {
        self.buffer.as_ref().map_or(0, UploadableBuffer::size)
    }

    /// Destroys every resource of the buffer.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        if let Some(mut buffer) = self.buffer.take() {
            buffer.release(device);
        }
    }
}
