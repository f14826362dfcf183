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

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::{DepthBuffer, ViewportAndScissor, DEPTH_FORMAT};
use vesta_core::renderer::api::{
    CommandListType, DescriptorHeapId, HeapType, ResourceId, TextureFormat, VertexLayout,
};
use vesta_core::renderer::frame::{CommandListManager, CommandQueueManager};
use vesta_core::renderer::traits::SwapChainDescriptor;
use vesta_core::renderer::{GraphicsDevice, RenderError, SwapChain};
use vesta_core::sync::{run_and_wait, WorkerPool};
use vesta_core::{EngineConfig, RenderEngineKind};
use vesta_data::allocators::HeapPools;
use vesta_data::buffers::UploadJob;
use vesta_data::descriptors::DescriptorTableManager;
use vesta_data::textures::TextureStorage;
use vesta_infra::{RayonWorkerPool, SoftDevice};
use vesta_lanes::render_lane::{IndirectPipeline, Model, ModelContainer, RenderTargetFormats};

/// Format of the swap chain back buffers.
const BACK_BUFFER_FORMAT: TextureFormat = TextureFormat::Bgra8Unorm;

/// The compute and copy queues hand their work off with a single, ever increasing
/// fence value, so they use one fence slot.
const SINGLE_SLOT: usize = 0;

/// The root context of the engine.
///
/// Owns the device, the three queues with their command lists, the swap chain and
/// every data structure models and textures are placed into. The application talks to
/// the engine in three phases:
///
/// 1. registration with [`GraphicsEngine::register_resource`] and
///    [`GraphicsEngine::submit_model`],
/// 2. a single [`GraphicsEngine::process_data`] that places and uploads everything,
/// 3. one [`GraphicsEngine::render`] per frame, with [`GraphicsEngine::resize`] whenever
///    the presentation target changes size.
pub struct GraphicsEngine {
    config: EngineConfig,
    device: Arc<dyn GraphicsDevice>,
    workers: Arc<dyn WorkerPool>,
    graphics_queue: CommandQueueManager,
    compute_queue: CommandQueueManager,
    copy_queue: CommandQueueManager,
    graphics_lists: CommandListManager,
    compute_lists: CommandListManager,
    copy_lists: CommandListManager,
    swap_chain: Box<dyn SwapChain>,
    pools: HeapPools,
    descriptor_table: DescriptorTableManager,
    textures: TextureStorage,
    models: ModelContainer,
    indirect: Option<IndirectPipeline>,
    depth_buffer: DepthBuffer,
    viewport: ViewportAndScissor,
    frame_index: usize,
    processed: bool,
    placement_failed: bool,
}

impl GraphicsEngine {
    /// Builds every subsystem on `device`, running CPU-side upload work on `workers`.
    ///
    /// ## Errors
    /// * `RenderError::InitializationFailed` - If `config` does not validate or a queue,
    ///   list or swap chain cannot be created.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        workers: Arc<dyn WorkerPool>,
        config: EngineConfig,
    ) -> Result<Self, RenderError> {
        config
            .validate()
            .map_err(|err| RenderError::InitializationFailed(err.to_string()))?;
        log::info!(
            "GraphicsEngine({}): starting on '{}', {} back buffers, {:?}",
            config.app_name,
            device.adapter_name(),
            config.buffer_count,
            config.render_engine
        );

        let frame_count = config.buffer_count as usize;
        let timeout = config.fence_timeout();
        let mut graphics_queue = CommandQueueManager::new(
            device.create_command_queue(CommandListType::Direct)?,
            frame_count,
            timeout,
        );
        let mut compute_queue =
            CommandQueueManager::new(device.create_command_queue(CommandListType::Compute)?, 1, timeout);
        let mut copy_queue = CommandQueueManager::new(device.create_command_queue(CommandListType::Copy)?, 1, timeout);

        let swap_chain = device.create_swap_chain(
            graphics_queue.queue(),
            &SwapChainDescriptor {
                buffer_count: config.buffer_count,
                width: config.width,
                height: config.height,
                format: BACK_BUFFER_FORMAT,
            },
        )?;
        let frame_index = swap_chain.current_back_buffer_index();
        graphics_queue.init_sync_objects(device.as_ref(), frame_index)?;
        compute_queue.init_sync_objects(device.as_ref(), SINGLE_SLOT)?;
        copy_queue.init_sync_objects(device.as_ref(), SINGLE_SLOT)?;

        let graphics_lists = CommandListManager::new(Arc::clone(&device), CommandListType::Direct, frame_count)?;
        let compute_lists = CommandListManager::new(Arc::clone(&device), CommandListType::Compute, frame_count)?;
        let copy_lists = CommandListManager::new(Arc::clone(&device), CommandListType::Copy, 1)?;

        let depth_buffer = DepthBuffer::new(device.as_ref(), config.width, config.height)?;
        let indirect = (config.render_engine == RenderEngineKind::IndirectDraw)
            .then(|| IndirectPipeline::new(frame_count, config.culling_bounds));

        Ok(Self {
            models: ModelContainer::new(config.shader_path.clone()),
            viewport: ViewportAndScissor::new(config.width, config.height),
            config,
            device,
            workers,
            graphics_queue,
            compute_queue,
            copy_queue,
            graphics_lists,
            compute_lists,
            copy_lists,
            swap_chain,
            pools: HeapPools::new(),
            descriptor_table: DescriptorTableManager::new(),
            textures: TextureStorage::new(),
            indirect,
            depth_buffer,
            frame_index,
            processed: false,
            placement_failed: false,
        })
    }

    /// Builds the engine on the software reference device, with a `rayon` worker pool
    /// of `config.worker_threads` threads.
    pub fn headless(config: EngineConfig) -> Result<Self, RenderError> {
        let device: Arc<dyn GraphicsDevice> = SoftDevice::new();
        let workers = Arc::new(RayonWorkerPool::new(config.worker_threads)?);
        Self::new(device, workers, config)
    }

    fn ensure_registration_open(&self, operation: &str) -> Result<(), RenderError> {
        if self.processed {
            log::error!("GraphicsEngine: {operation} after process_data");
            return Err(RenderError::OrderingViolation(format!(
                "{operation} called after process_data"
            )));
        }
        Ok(())
    }

    /// Registers a texture and returns its logical index, the value models pass as
    /// their texture index.
    pub fn register_resource(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        pixel_stride: u32,
    ) -> Result<usize, RenderError> {
        self.ensure_registration_open("register_resource")?;
        let index = self
            .textures
            .add_texture(&mut self.descriptor_table, pixels, width, height, pixel_stride)?;
        log::debug!("GraphicsEngine: texture {index} registered ({width}x{height})");
        Ok(index)
    }

    /// Registers a model.
    ///
    /// In indirect mode the model also gets its indirect command right away, and it must
    /// share the vertex layout of the first model submitted.
    pub fn submit_model(&mut self, model: Arc<dyn Model>) -> Result<(), RenderError> {
        self.ensure_registration_open("submit_model")?;
        match self.indirect.as_mut() {
            Some(indirect) => {
                if let Some(layout) = indirect.vertex_layout() {
                    if *layout != model.vertex_layout() {
                        return Err(RenderError::IncompatibleModel(format!(
                            "indirect draws need a {}-byte vertex, the model has {} bytes",
                            layout.stride(),
                            model.vertex_stride()
                        )));
                    }
                }
                let placement = self.models.add_model(Arc::clone(&model));
                indirect.record_indirect_arguments(&[(model, placement)])?;
            }
            None => {
                self.models.add_model(model);
            }
        }
        Ok(())
    }

    /// Places every registered texture and model into GPU memory, uploads them, builds
    /// the descriptor table and the pipelines, then frees the upload memory.
    ///
    /// Runs once, after registration and before the first [`GraphicsEngine::render`].
    /// Any failing step aborts the whole pass. A pass that failed after placement
    /// started cannot be retried, the engine has to be rebuilt.
    ///
    /// ## Errors
    /// * `RenderError::Resource` - If a texture index is unknown or placement fails.
    /// * `RenderError::OrderingViolation` - After a success, or after a failed placement.
    pub fn process_data(&mut self) -> Result<(), RenderError> {
        self.ensure_registration_open("process_data")?;
        if self.placement_failed {
            return Err(RenderError::OrderingViolation(
                "process_data retried after a failed placement".to_string(),
            ));
        }
        self.models.validate_textures(self.textures.texture_count())?;

        let result = self.place_and_upload();
        if let Err(err) = &result {
            self.placement_failed = true;
            log::error!("GraphicsEngine({}): process_data failed: {err}", self.config.app_name);
        }
        result
    }

    fn place_and_upload(&mut self) -> Result<(), RenderError> {
        let device = Arc::clone(&self.device);

        self.textures.reserve(device.as_ref(), &mut self.pools)?;
        self.models.reserve_buffers(device.as_ref(), &mut self.pools)?;
        if let Some(indirect) = self.indirect.as_mut() {
            indirect.reserve_buffers(device.as_ref(), &mut self.pools, &mut self.descriptor_table)?;
        }
        self.pools.create_heaps(device.as_ref())?;
        self.descriptor_table.create_descriptor_table(device.as_ref())?;

        self.textures.create_textures(device.as_ref(), &self.pools)?;
        self.models.create_buffers(device.as_ref(), &self.pools)?;
        if let Some(indirect) = self.indirect.as_mut() {
            indirect.create_buffers(device.as_ref(), &self.pools)?;
        }

        let mut jobs = self.textures.upload_jobs(&device)?;
        jobs.extend(self.models.upload_jobs(&device)?);
        log::debug!(
            "GraphicsEngine: {} upload copies on {} worker threads",
            jobs.len(),
            self.workers.thread_count()
        );
        run_and_wait(self.workers.as_ref(), jobs.into_iter().map(UploadJob::boxed).collect())?;

        self.textures.create_buffer_views(device.as_ref())?;
        self.descriptor_table.copy_upload_heap(device.as_ref())?;
        self.upload_to_gpu()?;

        let formats = RenderTargetFormats {
            render_target: self.swap_chain.format(),
            depth: Some(DEPTH_FORMAT),
        };
        self.models
            .init_pipelines(device.as_ref(), &self.descriptor_table, formats)?;
        if let Some(indirect) = self.indirect.as_mut() {
            let root_signature = self
                .models
                .root_signature()
                .ok_or(RenderError::NotInitialized("model root signature"))?;
            indirect.create_pipeline_objects(device.as_ref(), self.models.shader_path(), root_signature, formats)?;
        }

        self.textures.release_upload_buffers(device.as_ref());
        self.descriptor_table.release_upload_heap(device.as_ref());
        self.models.release_upload_buffers(device.as_ref());
        if let Some(indirect) = self.indirect.as_mut() {
            indirect.release_upload_resource(device.as_ref());
        }

        self.processed = true;
        log::info!(
            "GraphicsEngine({}): processed {} models, {} textures, {} bytes of heaps",
            self.config.app_name,
            self.models.model_count(),
            self.textures.texture_count(),
            self.pools.total_size()
        );
        Ok(())
    }

    /// Records every upload copy on the copy queue and blocks until they executed. The
    /// graphics and compute queues are ordered after the copies on the GPU as well.
    fn upload_to_gpu(&mut self) -> Result<(), RenderError> {
        self.copy_queue.release_completed_allocators(&mut self.copy_lists)?;
        record_or_abandon(&mut self.copy_lists, |lists| {
            let list = lists.command_list();
            self.textures.record_uploads(list)?;
            self.models.record_uploads(list)?;
            if let Some(indirect) = self.indirect.as_ref() {
                indirect.record_resource_upload(list)?;
            }
            lists.close()?;
            self.copy_queue.execute_command_list(lists, SINGLE_SLOT)
        })?;

        let value = self.copy_queue.signal_and_hand_off(SINGLE_SLOT, &self.graphics_queue)?;
        self.compute_queue.wait_on(self.copy_queue.fence()?, value)?;
        self.copy_queue.wait_for_value(value)?;
        self.copy_queue.release_completed_allocators(&mut self.copy_lists)?;
        Ok(())
    }

    /// Records, submits and presents one frame.
    ///
    /// In indirect mode the culling pass of the frame runs first on the compute queue,
    /// and the graphics queue waits for it on the GPU. The call only blocks when the
    /// GPU is `buffer_count - 1` frames behind.
    ///
    /// ## Errors
    /// * `RenderError::NotInitialized` - Before [`GraphicsEngine::process_data`].
    /// * `RenderError::DeviceLost` - If a bounded fence wait expires.
    pub fn render(&mut self) -> Result<(), RenderError> {
        if !self.processed {
            return Err(RenderError::NotInitialized("GraphicsEngine::render before process_data"));
        }
        let frame = self.frame_index;
        let heap = self
            .descriptor_table
            .descriptor_heap()
            .ok_or(RenderError::NotInitialized("descriptor table"))?;

        self.cull_models(heap)?;

        self.graphics_queue.release_completed_allocators(&mut self.graphics_lists)?;
        record_or_abandon(&mut self.graphics_lists, |lists| {
            let list = lists.command_list();
            list.resource_barrier(&[self.swap_chain.render_state_barrier()]);
            list.set_descriptor_heaps(&[heap]);
            self.viewport.bind(list);

            let rtv = self.swap_chain.current_render_target_view();
            list.clear_render_target_view(rtv, self.config.background_colour);
            self.depth_buffer.clear(list);
            list.set_render_targets(rtv, self.depth_buffer.dsv());

            match self.indirect.as_ref() {
                Some(indirect) => {
                    indirect.bind_graphics_pipeline(list)?;
                    self.models.bind_texture_table(list);
                    let stride = indirect.vertex_layout().map_or(0, VertexLayout::stride);
                    self.models.bind_shared_geometry(self.device.as_ref(), list, stride)?;
                    indirect.draw_models(list, frame)?;
                }
                None => self.models.bind_commands(list, &self.textures)?,
            }

            list.resource_barrier(&[self.swap_chain.present_state_barrier()]);
            lists.close()?;
            self.graphics_queue.execute_command_list(lists, frame)
        })?;
        self.swap_chain.present()?;

        let next = self.swap_chain.current_back_buffer_index();
        self.graphics_queue.move_to_next_frame(frame, next)?;
        self.frame_index = next;
        Ok(())
    }

    /// Records and submits the culling pass of the current frame, then makes the
    /// graphics queue wait for it.
    fn cull_models(&mut self, heap: DescriptorHeapId) -> Result<(), RenderError> {
        let Some(indirect) = self.indirect.as_ref() else {
            return Ok(());
        };
        let frame = self.frame_index;

        self.compute_queue.release_completed_allocators(&mut self.compute_lists)?;
        record_or_abandon(&mut self.compute_lists, |lists| {
            let list = lists.command_list();
            list.set_descriptor_heaps(&[heap]);
            indirect.reset_counter_buffer(list, frame)?;
            indirect.bind_compute_pipeline(list)?;
            indirect.dispatch_compute(list, frame)?;
            lists.close()?;
            self.compute_queue.execute_command_list(lists, SINGLE_SLOT)
        })?;
        self.compute_queue
            .signal_and_hand_off(SINGLE_SLOT, &self.graphics_queue)?;
        Ok(())
    }

    /// Resizes the back buffers, the depth buffer and the viewport.
    ///
    /// Waits for the GPU to finish the current back buffer first. A resize to the
    /// current size, or to an empty size, changes nothing.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let back_buffer = self.swap_chain.current_back_buffer_index();
        self.graphics_queue.wait_for_gpu(back_buffer)?;
        self.release_completed_allocators()?;

        if self.swap_chain.resize(width, height)? {
            self.graphics_queue.reset_fence_values_with(back_buffer);
            self.depth_buffer.resize(self.device.as_ref(), width, height)?;
            self.viewport.resize(width, height);
            self.frame_index = self.swap_chain.current_back_buffer_index();
            log::info!("GraphicsEngine({}): resized to {width}x{height}", self.config.app_name);
        }
        Ok(())
    }

    /// Blocks until every queue drained, then frees their allocators.
    pub fn wait_for_async_tasks(&mut self) -> Result<(), RenderError> {
        self.graphics_queue.wait_for_gpu(self.frame_index)?;
        self.compute_queue.wait_for_gpu(SINGLE_SLOT)?;
        self.copy_queue.wait_for_gpu(SINGLE_SLOT)?;
        self.release_completed_allocators()
    }

    fn release_completed_allocators(&mut self) -> Result<(), RenderError> {
        self.graphics_queue
            .release_completed_allocators(&mut self.graphics_lists)?;
        self.compute_queue
            .release_completed_allocators(&mut self.compute_lists)?;
        self.copy_queue.release_completed_allocators(&mut self.copy_lists)?;
        Ok(())
    }

    /// Sets the colour the render target is cleared to.
    pub fn set_background_colour(&mut self, colour: [f32; 4]) {
        self.config.background_colour = colour;
    }

    /// Sets the directory shaders are loaded from. Only pipelines built by a later
    /// [`GraphicsEngine::process_data`] see the change.
    pub fn set_shader_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.processed {
            log::warn!(
                "GraphicsEngine: shader path set to '{}' after the pipelines were built",
                path.display()
            );
        }
        self.models.set_shader_path(path.clone());
        self.config.shader_path = path;
    }

    /// Index of the back buffer the next frame renders into.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// The configuration the engine runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The device every subsystem was built on.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Returns `true` once [`GraphicsEngine::process_data`] succeeded.
    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// Number of submitted models.
    pub fn model_count(&self) -> usize {
        self.models.model_count()
    }

    /// Number of registered textures.
    pub fn texture_count(&self) -> usize {
        self.textures.texture_count()
    }

    /// The depth buffer.
    pub fn depth_buffer(&self) -> &DepthBuffer {
        &self.depth_buffer
    }

    /// The viewport and scissor rectangle.
    pub fn viewport(&self) -> &ViewportAndScissor {
        &self.viewport
    }

    /// The argument buffer culled into for `frame_index`, in indirect mode.
    pub fn indirect_argument_buffer(&self, frame_index: usize) -> Option<ResourceId> {
        self.indirect
            .as_ref()
            .and_then(|indirect| indirect.argument_buffer(frame_index))
    }

    /// Byte offset of the live counter inside every argument buffer, in indirect mode.
    pub fn indirect_counter_offset(&self) -> Option<u64> {
        self.indirect.as_ref().map(IndirectPipeline::counter_offset)
    }

    /// Command allocators not yet returned to their pools, over every queue.
    pub fn allocators_in_use(&self) -> usize {
        self.graphics_lists.in_use_count() + self.compute_lists.in_use_count() + self.copy_lists.in_use_count()
    }
}

impl Drop for GraphicsEngine {
    fn drop(&mut self) {
        if let Err(err) = self.wait_for_async_tasks() {
            log::error!("GraphicsEngine: GPU did not drain before shutdown: {err}");
        }

        let device = self.device.as_ref();
        if let Some(indirect) = self.indirect.as_mut() {
            indirect.release(device);
        }
        self.models.release(device);
        self.textures.release(device);
        self.depth_buffer.release(device);
        self.descriptor_table.release(device);
        for heap_type in HeapType::ALL {
            self.pools.release(heap_type, device);
        }
        log::info!("GraphicsEngine({}): shut down", self.config.app_name);
    }
}

/// Resets `lists`, then runs `record`, which must close and submit the list. On an
/// error the recording is abandoned so the next reset does not trip over it.
fn record_or_abandon(
    lists: &mut CommandListManager,
    record: impl FnOnce(&mut CommandListManager) -> Result<(), RenderError>,
) -> Result<(), RenderError> {
    lists.reset()?;
    record(lists).inspect_err(|_| {
        lists.abandon();
    })
}

impl fmt::Debug for GraphicsEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsEngine")
            .field("app_name", &self.config.app_name)
            .field("render_engine", &self.config.render_engine)
            .field("frame_index", &self.frame_index)
            .field("models", &self.models.model_count())
            .field("textures", &self.textures.texture_count())
            .field("processed", &self.processed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_lists(device: &Arc<dyn GraphicsDevice>) -> CommandListManager {
        CommandListManager::new(Arc::clone(device), CommandListType::Direct, 2).unwrap()
    }

    #[test]
    fn failed_recording_leaves_the_lists_reusable() {
        let device: Arc<dyn GraphicsDevice> = SoftDevice::new();
        let mut lists = direct_lists(&device);

        let err = record_or_abandon(&mut lists, |_| Err(RenderError::NotInitialized("pipeline")));
        assert!(matches!(err, Err(RenderError::NotInitialized("pipeline"))));
        assert_eq!(lists.current_slot(), None);
        assert_eq!(lists.in_use_count(), 0);

        record_or_abandon(&mut lists, |lists| {
            lists.close()?;
            lists.record_submission(1).map(|_| ())
        })
        .unwrap();
        assert_eq!(lists.in_use_count(), 1);
    }

    #[test]
    fn failure_after_close_is_abandoned_too() {
        let device: Arc<dyn GraphicsDevice> = SoftDevice::new();
        let mut lists = direct_lists(&device);

        let err = record_or_abandon(&mut lists, |lists| {
            lists.close()?;
            Err(RenderError::DeviceLost)
        });
        assert!(matches!(err, Err(RenderError::DeviceLost)));
        assert!(!lists.list().is_recording());
        assert_eq!(lists.reset().unwrap(), 0);
    }
}
