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

use std::sync::Arc;

use vesta_core::renderer::api::*;
use vesta_core::renderer::traits::SwapChainDescriptor;
use vesta_core::renderer::{CommandQueue, RenderError, SwapChain};

use super::descriptors::DESCRIPTOR_INCREMENT;
use super::device::SoftShared;
use super::queue::SoftQueue;

/// A swap chain without a window: back buffers are plain textures that rotate on
/// every present.
#[derive(Debug)]
pub struct HeadlessSwapChain {
    shared: Arc<SoftShared>,
    queue: Arc<dyn CommandQueue>,
    descriptor: SwapChainDescriptor,
    rtv_heap: DescriptorHeapId,
    rtv_start: CpuDescriptorHandle,
    back_buffers: Vec<ResourceId>,
    current: usize,
}

impl HeadlessSwapChain {
    pub(crate) fn new(
        shared: Arc<SoftShared>,
        queue: Arc<dyn CommandQueue>,
        descriptor: SwapChainDescriptor,
    ) -> Result<Self, RenderError> {
        if descriptor.buffer_count < 2 {
            return Err(RenderError::InitializationFailed(format!(
                "A swap chain needs at least 2 buffers, got {}",
                descriptor.buffer_count
            )));
        }
        if descriptor.format == TextureFormat::D32Float {
            return Err(RenderError::InitializationFailed(
                "Back buffers cannot use a depth format".to_string(),
            ));
        }
        let rtv_heap = shared.create_descriptor_heap(&DescriptorHeapDescriptor {
            label: Some("swap chain RTVs"),
            kind: DescriptorHeapKind::Rtv,
            count: descriptor.buffer_count,
            shader_visible: false,
        })?;
        let rtv_start = shared.gpu().descriptors.cpu_start(rtv_heap.0)?;
        let mut swap_chain = Self {
            shared,
            queue,
            descriptor,
            rtv_heap,
            rtv_start,
            back_buffers: Vec::new(),
            current: 0,
        };
        swap_chain.create_back_buffers()?;
        log::info!(
            "HeadlessSwapChain: {} buffers of {}x{}",
            descriptor.buffer_count,
            descriptor.width,
            descriptor.height
        );
        Ok(swap_chain)
    }

    fn create_back_buffers(&mut self) -> Result<(), RenderError> {
        for i in 0..self.descriptor.buffer_count {
            let texture = ResourceDescriptor::texture_2d(
                format!("back buffer {i}"),
                self.descriptor.width.max(1),
                self.descriptor.height.max(1),
                self.descriptor.format,
            )
            .with_flags(ResourceFlags::ALLOW_RENDER_TARGET);
            let resource = self.shared.create_committed(&texture, ResourceState::Present)?;
            self.shared.write_view(
                &ViewDescriptor::RenderTarget { resource },
                self.rtv_start.offset(u64::from(i), DESCRIPTOR_INCREMENT),
            )?;
            self.back_buffers.push(resource);
        }
        Ok(())
    }

    fn destroy_back_buffers(&mut self) {
        for resource in self.back_buffers.drain(..) {
            self.shared.destroy_resource(resource);
        }
    }
}

impl SwapChain for HeadlessSwapChain {
    fn buffer_count(&self) -> usize {
        self.back_buffers.len()
    }

    fn current_back_buffer_index(&self) -> usize {
        self.current
    }

    fn back_buffer(&self, index: usize) -> ResourceId {
        self.back_buffers[index]
    }

    fn render_target_view(&self, index: usize) -> CpuDescriptorHandle {
        self.rtv_start.offset(index as u64, DESCRIPTOR_INCREMENT)
    }

    fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    fn size(&self) -> (u32, u32) {
        (self.descriptor.width, self.descriptor.height)
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let queue = self
            .queue
            .as_any()
            .downcast_ref::<SoftQueue>()
            .ok_or_else(|| RenderError::SwapChainFailed("Presenting queue is not a software queue".to_string()))?;
        queue.present(self.back_buffers[self.current])?;
        self.current = (self.current + 1) % self.back_buffers.len();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<bool, RenderError> {
        if width == 0 || height == 0 {
            log::warn!("HeadlessSwapChain: ignoring resize to {width}x{height}");
            return Ok(false);
        }
        if (width, height) == self.size() {
            return Ok(false);
        }
        self.destroy_back_buffers();
        self.descriptor.width = width;
        self.descriptor.height = height;
        self.current = 0;
        self.create_back_buffers()?;
        log::info!("HeadlessSwapChain: resized to {width}x{height}");
        Ok(true)
    }
}

impl Drop for HeadlessSwapChain {
    fn drop(&mut self) {
        self.destroy_back_buffers();
        self.shared.destroy_descriptor_heap(self.rtv_heap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::soft::SoftDevice;
    use vesta_core::renderer::GraphicsDevice;

    fn swap_chain(device: &SoftDevice) -> Box<dyn SwapChain> {
        let queue = device.create_command_queue(CommandListType::Direct).unwrap();
        device
            .create_swap_chain(
                &queue,
                &SwapChainDescriptor {
                    buffer_count: 3,
                    width: 4,
                    height: 2,
                    format: TextureFormat::Rgba8Unorm,
                },
            )
            .unwrap()
    }

    #[test]
    fn present_rotates_back_buffers() {
        let device = SoftDevice::new();
        let mut swap_chain = swap_chain(&device);

        let indices: Vec<usize> = (0..4)
            .map(|_| {
                let index = swap_chain.current_back_buffer_index();
                swap_chain.present().unwrap();
                index
            })
            .collect();
        device.wait_idle().unwrap();

        assert_eq!(indices, vec![0, 1, 2, 0]);
        assert_eq!(device.stats().presents, 4);
        assert_eq!(device.stats().validation_errors, 0);
    }

    #[test]
    fn resize_recreates_the_back_buffers() {
        let device = SoftDevice::new();
        let mut swap_chain = swap_chain(&device);
        swap_chain.present().unwrap();
        device.wait_idle().unwrap();
        let before = swap_chain.back_buffer(0);

        assert!(!swap_chain.resize(0, 10).unwrap());
        assert!(swap_chain.resize(8, 8).unwrap());

        assert_eq!(swap_chain.size(), (8, 8));
        assert_eq!(swap_chain.current_back_buffer_index(), 0);
        assert_ne!(swap_chain.back_buffer(0), before);
        assert_eq!(device.resource_count(), 3);
        assert_eq!(device.heap_count(), 0);
    }

    #[test]
    fn direct_queue_is_required() {
        let device = SoftDevice::new();
        let queue = device.create_command_queue(CommandListType::Copy).unwrap();
        let descriptor = SwapChainDescriptor {
            buffer_count: 2,
            width: 1,
            height: 1,
            format: TextureFormat::Bgra8Unorm,
        };
        assert!(device.create_swap_chain(&queue, &descriptor).is_err());
    }
}
