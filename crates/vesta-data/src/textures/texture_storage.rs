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
use crate::buffers::UploadJob;
use crate::descriptors::{DescriptorTableManager, ResourceAddress};
use std::sync::Arc;
use vesta_core::renderer::api::{
    HeapType, ResourceDescriptor, ResourceId, ResourceState, TextureCopyFootprint, TextureFormat, ViewDescriptor,
};
use vesta_core::renderer::{CommandList, GraphicsDevice, ResourceError};

#[derive(Debug)]
struct TextureEntry {
    address: ResourceAddress,
    footprint: TextureCopyFootprint,
    pixels: Option<Arc<Vec<u8>>>,
    texture: PlacedResource,
    upload: PlacedResource,
}

/// Owns every texture and drives its upload.
///
/// Pixel rows are tightly packed on input and re-laid out with a 256-byte aligned row
/// pitch in the upload buffer, which is what texture copies require.
#[derive(Debug, Default)]
pub struct TextureStorage {
    textures: Vec<TextureEntry>,
}

fn format_for_stride(pixel_stride: u32) -> Result<TextureFormat, ResourceError> {
    match pixel_stride {
        4 => Ok(TextureFormat::Rgba8Unorm),
        other => Err(ResourceError::InvalidTextureData(format!(
            "unsupported pixel stride of {other} bytes"
        ))),
    }
}

impl TextureStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps a copy of `pixels` and requests its view slot.
    ///
    /// ## Returns
    /// The logical index of the texture, in registration order.
    /// ## Errors
    /// * `ResourceError::InvalidTextureData` - If the size is empty, the stride has no
    ///   matching format, or `pixels` is not exactly `width * height * pixel_stride` bytes.
    pub fn add_texture(
        &mut self,
        table: &mut DescriptorTableManager,
        pixels: &[u8],
        width: u32,
        height: u32,
        pixel_stride: u32,
    ) -> Result<usize, ResourceError> {
        let format = format_for_stride(pixel_stride)?;
        let expected = u64::from(width) * u64::from(height) * u64::from(pixel_stride);
        if width == 0 || height == 0 || pixels.len() as u64 != expected {
            return Err(ResourceError::InvalidTextureData(format!(
                "{width}x{height} texture with stride {pixel_stride} needs {expected} bytes, got {}",
                pixels.len()
            )));
        }

        let logical = self.textures.len();
        let footprint = TextureCopyFootprint::new(width, height, pixel_stride);
        self.textures.push(TextureEntry {
            address: table.get_texture_index(),
            footprint,
            pixels: Some(Arc::new(pixels.to_vec())),
            texture: PlacedResource::new(
                HeapType::GpuOnly,
                ResourceDescriptor::texture_2d(format!("texture {logical}"), width, height, format),
            ),
            upload: PlacedResource::new(
                HeapType::Upload,
                ResourceDescriptor::buffer(format!("texture {logical} (upload)"), footprint.total_size()),
            ),
        });
        Ok(logical)
    }

    /// Number of registered textures.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Reserves GPU-only texture space and upload space for every texture.
    pub fn reserve(&mut self, device: &dyn GraphicsDevice, pools: &mut HeapPools) -> Result<(), ResourceError> {
        for entry in &mut self.textures {
            entry.texture.reserve(device, pools)?;
            entry.upload.reserve(device, pools)?;
        }
        Ok(())
    }

    /// Places every texture and its upload buffer.
    pub fn create_textures(&mut self, device: &dyn GraphicsDevice, pools: &HeapPools) -> Result<(), ResourceError> {
        for entry in &mut self.textures {
            entry.texture.place(device, pools, ResourceState::CopyDest)?;
            entry.upload.place(device, pools, ResourceState::GenericRead)?;
        }
        if !self.textures.is_empty() {
            log::debug!("TextureStorage: placed {} textures", self.textures.len());
        }
        Ok(())
    }

    /// One job per texture writing its pitched rows into its upload buffer.
    pub fn upload_jobs(&self, device: &Arc<dyn GraphicsDevice>) -> Result<Vec<UploadJob>, ResourceError> {
        self.textures
            .iter()
            .filter_map(|entry| entry.pixels.as_ref().map(|pixels| (entry, pixels)))
            .map(|(entry, pixels)| {
                let pitched = Arc::new(pitch_rows(pixels, &entry.footprint));
                Ok(UploadJob::new(Arc::clone(device), entry.upload.try_resource()?, 0, pitched))
            })
            .collect()
    }

    /// Writes every texture's shader resource view into the staging table.
    pub fn create_buffer_views(&self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        for entry in &self.textures {
            let view = ViewDescriptor::TextureSrv {
                resource: entry.texture.try_resource()?,
            };
            device.create_view(&view, entry.address.cpu_handle.get_or_default())?;
        }
        Ok(())
    }

    /// Records the buffer-to-texture copies.
    pub fn record_uploads(&self, list: &mut dyn CommandList) -> Result<(), ResourceError> {
        for entry in &self.textures {
            list.copy_buffer_to_texture(
                entry.texture.try_resource()?,
                entry.upload.try_resource()?,
                0,
                entry.footprint,
            );
        }
        Ok(())
    }

    /// Destroys the upload buffers and drops the CPU pixel copies.
    pub fn release_upload_buffers(&mut self, device: &dyn GraphicsDevice) {
        for entry in &mut self.textures {
            entry.upload.release(device);
            entry.pixels = None;
        }
    }

    /// Slot of the texture registered as `logical` in the shader-visible table.
    pub fn physical_index(&self, logical: usize) -> Option<usize> {
        self.textures.get(logical).and_then(|entry| entry.address.index.get())
    }

    /// The GPU texture registered as `logical`, once placed.
    pub fn texture(&self, logical: usize) -> Option<ResourceId> {
        self.textures.get(logical).and_then(|entry| entry.texture.resource())
    }

    /// Destroys every texture.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        for entry in &mut self.textures {
            entry.upload.release(device);
            entry.texture.release(device);
        }
        self.textures.clear();
    }
}

fn pitch_rows(pixels: &[u8], footprint: &TextureCopyFootprint) -> Vec<u8> {
    let row_size = footprint.row_size() as usize;
    let row_pitch = footprint.row_pitch as usize;
    let mut pitched = vec![0u8; footprint.total_size() as usize];
    for (row, source) in pixels.chunks_exact(row_size).enumerate() {
        let start = row * row_pitch;
        pitched[start..start + row_size].copy_from_slice(source);
    }
    pitched
}
