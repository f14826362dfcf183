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

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use vesta_core::renderer::api::*;
use vesta_core::renderer::traits::SwapChainDescriptor;
use vesta_core::renderer::{
    CommandList, CommandQueue, Fence, GraphicsDevice, PipelineError, RenderError, ResourceError, ShaderError,
    SwapChain,
};

use super::command_list::SoftCommandList;
use super::descriptors::{SoftDescriptors, DESCRIPTOR_INCREMENT};
use super::fence::SoftFence;
use super::kernels::{ComputeKernel, IndirectCullingKernel};
use super::memory::SoftMemory;
use super::queue::{QueueControl, SoftQueue};
use super::stats::SoftStats;
use super::swap_chain::HeadlessSwapChain;

#[allow(dead_code)]
#[derive(Debug)]
pub(crate) struct SoftRootSignature {
    pub(crate) label: String,
    pub(crate) parameters: Vec<RootParameter>,
}

#[allow(dead_code)]
#[derive(Debug)]
pub(crate) enum SoftPipeline {
    Graphics {
        label: String,
        root_signature: RootSignatureId,
        vertex_stride: u32,
    },
    Compute {
        label: String,
        root_signature: RootSignatureId,
        kernel: Arc<dyn ComputeKernel>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct SoftCommandSignature {
    pub(crate) byte_stride: u32,
    pub(crate) arguments: Vec<IndirectArgument>,
    pub(crate) root_signature: Option<RootSignatureId>,
}

/// Everything the GPU timeline touches, behind a single lock.
#[derive(Debug, Default)]
pub(crate) struct SoftGpu {
    pub(crate) memory: SoftMemory,
    pub(crate) descriptors: SoftDescriptors,
    pub(crate) root_signatures: HashMap<usize, SoftRootSignature>,
    pub(crate) pipelines: HashMap<usize, SoftPipeline>,
    pub(crate) command_signatures: HashMap<usize, SoftCommandSignature>,
    pub(crate) stats: SoftStats,
}

#[derive(Debug)]
struct AllocatorState {
    list_type: CommandListType,
    /// Executions submitted with lists recorded from this allocator and not yet run.
    pending: usize,
}

/// State shared by the device, its command lists and its queue workers.
#[derive(Debug)]
pub(crate) struct SoftShared {
    next_id: AtomicUsize,
    gpu: Mutex<SoftGpu>,
    allocators: Mutex<HashMap<usize, AllocatorState>>,
    kernels: Mutex<HashMap<String, Arc<dyn ComputeKernel>>>,
    queues: Mutex<Vec<Weak<QueueControl>>>,
    fences: Mutex<Vec<Weak<SoftFence>>>,
    lost: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SoftShared {
    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn gpu(&self) -> MutexGuard<'_, SoftGpu> {
        lock(&self.gpu)
    }

    pub(crate) fn allocator_type(&self, id: CommandAllocatorId) -> Result<CommandListType, RenderError> {
        lock(&self.allocators)
            .get(&id.0)
            .map(|state| state.list_type)
            .ok_or_else(|| RenderError::Internal(format!("Unknown command allocator {id:?}")))
    }

    pub(crate) fn begin_execution(&self, id: CommandAllocatorId) {
        if let Some(state) = lock(&self.allocators).get_mut(&id.0) {
            state.pending += 1;
        }
    }

    pub(crate) fn end_execution(&self, id: CommandAllocatorId) {
        if let Some(state) = lock(&self.allocators).get_mut(&id.0) {
            state.pending = state.pending.saturating_sub(1);
        }
    }

    pub(crate) fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    /// Stops all further GPU work and fails every wait on a fence of the device.
    pub(crate) fn mark_lost(&self, reason: &str) {
        if self.lost.swap(true, Ordering::SeqCst) {
            return;
        }
        log::error!("SoftDevice: device lost, {reason}");
        let mut fences = lock(&self.fences);
        fences.retain(|fence| fence.strong_count() > 0);
        for fence in fences.iter().filter_map(Weak::upgrade) {
            fence.mark_lost();
        }
    }

    fn live_queues(&self) -> Vec<Arc<QueueControl>> {
        let mut queues = lock(&self.queues);
        queues.retain(|queue| queue.strong_count() > 0);
        queues.iter().filter_map(Weak::upgrade).collect()
    }
}

/// A software reference GPU.
///
/// Heaps are byte vectors, every queue runs on its own worker thread, and resource
/// states are validated the way an explicit-API debug layer would. Problems found
/// while executing are logged and counted in [`SoftStats::validation_errors`].
///
/// The device ships with the [`IndirectCullingKernel`] registered.
#[derive(Debug)]
pub struct SoftDevice {
    shared: Arc<SoftShared>,
}

impl SoftDevice {
    /// Creates a device.
    pub fn new() -> Arc<Self> {
        let shared = Arc::new(SoftShared {
            next_id: AtomicUsize::new(0),
            gpu: Mutex::new(SoftGpu::default()),
            allocators: Mutex::new(HashMap::new()),
            kernels: Mutex::new(HashMap::new()),
            queues: Mutex::new(Vec::new()),
            fences: Mutex::new(Vec::new()),
            lost: AtomicBool::new(false),
        });
        let device = Self { shared };
        device.register_kernel(Arc::new(IndirectCullingKernel));
        log::info!("SoftDevice: created '{}'", device.adapter_name());
        Arc::new(device)
    }

    /// Makes `kernel` available to compute pipelines created with its shader name.
    pub fn register_kernel(&self, kernel: Arc<dyn ComputeKernel>) {
        log::debug!("SoftDevice: registered compute kernel '{}'", kernel.name());
        lock(&self.shared.kernels).insert(kernel.name().to_string(), kernel);
    }

    /// A snapshot of the execution counters.
    pub fn stats(&self) -> SoftStats {
        self.shared.gpu().stats.clone()
    }

    /// Clears the execution counters.
    pub fn reset_stats(&self) {
        self.shared.gpu().stats = SoftStats::default();
    }

    /// Number of live placement heaps.
    pub fn heap_count(&self) -> usize {
        self.shared.gpu().memory.heap_count()
    }

    /// Number of live resources, committed ones included.
    pub fn resource_count(&self) -> usize {
        self.shared.gpu().memory.resource_count()
    }

    /// Number of live descriptor heaps.
    pub fn descriptor_heap_count(&self) -> usize {
        self.shared.gpu().descriptors.len()
    }

    /// Reads any resource, mapped or not. Textures are tightly packed.
    pub fn debug_read(&self, resource: ResourceId, offset: u64, len: usize) -> Result<Vec<u8>, ResourceError> {
        Ok(self.shared.gpu().memory.read(resource, offset, len as u64)?.to_vec())
    }

    /// The view a shader would read through `handle`.
    pub fn debug_view(&self, handle: GpuDescriptorHandle) -> Option<ViewDescriptor> {
        self.shared.gpu().descriptors.view_at_gpu(handle)
    }

    /// The committed state of a resource, between executions.
    pub fn resource_state(&self, resource: ResourceId) -> Option<ResourceState> {
        self.shared.gpu().memory.resource(resource).ok().map(|resource| resource.state)
    }

    /// Pauses every queue of the given type.
    pub fn pause(&self, list_type: CommandListType) {
        for queue in self.shared.live_queues() {
            if queue.list_type == list_type {
                queue.pause();
            }
        }
    }

    /// Resumes every queue of the given type.
    pub fn resume(&self, list_type: CommandListType) {
        for queue in self.shared.live_queues() {
            if queue.list_type == list_type {
                queue.resume();
            }
        }
    }

    /// Blocks until every queue ran everything submitted so far.
    ///
    /// Never returns while a queue is paused.
    ///
    /// ## Errors
    /// * `RenderError::DeviceLost` - If a queue worker died, before or while waiting.
    pub fn wait_idle(&self) -> Result<(), RenderError> {
        for queue in self.shared.live_queues() {
            queue.wait_idle();
        }
        if self.shared.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        Ok(())
    }

    /// Returns `true` once a queue worker died while executing.
    pub fn is_lost(&self) -> bool {
        self.shared.is_lost()
    }

    fn pipeline_error(label: Option<&str>, details: impl Into<String>) -> PipelineError {
        PipelineError::CompilationFailed {
            label: label.map(str::to_string),
            details: details.into(),
        }
    }
}

impl GraphicsDevice for SoftDevice {
    fn adapter_name(&self) -> String {
        "Vesta Software Reference GPU".to_string()
    }

    fn create_heap(&self, descriptor: &HeapDescriptor) -> Result<HeapId, ResourceError> {
        if descriptor.size == 0 {
            return Err(ResourceError::BackendError("Heaps cannot be empty".to_string()));
        }
        let id = self.shared.next_id();
        let label = descriptor.label.unwrap_or("heap").to_string();
        log::debug!(
            "SoftDevice: {:?} heap '{label}' of {} bytes",
            descriptor.heap_type,
            descriptor.size
        );
        self.shared
            .gpu()
            .memory
            .create_heap(id, label, descriptor.heap_type, descriptor.size, false);
        Ok(HeapId(id))
    }

    fn destroy_heap(&self, id: HeapId) {
        match self.shared.gpu().memory.destroy_heap(id.0) {
            Some(heap) => log::debug!("SoftDevice: destroyed heap '{}'", heap.label),
            None => log::warn!("SoftDevice: destroy_heap on unknown {id:?}"),
        }
    }

    fn resource_allocation_info(&self, descriptor: &ResourceDescriptor) -> ResourceAllocationInfo {
        SoftMemory::allocation_info(descriptor)
    }

    fn create_placed_resource(
        &self,
        heap: HeapId,
        offset: u64,
        descriptor: &ResourceDescriptor,
        initial_state: ResourceState,
    ) -> Result<ResourceId, ResourceError> {
        let is_buffer = matches!(descriptor.dimension, ResourceDimension::Buffer { .. });
        let flags = descriptor.flags;
        if is_buffer && (flags.contains(ResourceFlags::ALLOW_RENDER_TARGET) || flags.contains(ResourceFlags::ALLOW_DEPTH_STENCIL)) {
            return Err(ResourceError::BackendError(format!(
                "Buffer '{}' cannot be a render or depth target",
                descriptor.label_or_default()
            )));
        }
        let mut gpu = self.shared.gpu();
        let heap_type = gpu
            .memory
            .heap(heap.0)
            .map(|heap| heap.heap_type)
            .ok_or_else(|| ResourceError::BackendError(format!("Unknown heap {heap:?}")))?;
        if heap_type != HeapType::GpuOnly && !is_buffer {
            return Err(ResourceError::BackendError(format!(
                "Texture '{}' placed into a {heap_type:?} heap",
                descriptor.label_or_default()
            )));
        }
        if heap_type != HeapType::GpuOnly && flags.contains(ResourceFlags::ALLOW_UNORDERED_ACCESS) {
            return Err(ResourceError::BackendError(format!(
                "Unordered access on '{}' requires a GPU-only heap",
                descriptor.label_or_default()
            )));
        }
        let id = self.shared.next_id();
        gpu.memory.place(id, heap.0, offset, descriptor, initial_state)?;
        Ok(ResourceId(id))
    }

    fn destroy_resource(&self, id: ResourceId) {
        if !self.shared.gpu().memory.destroy_resource(id.0) {
            log::warn!("SoftDevice: destroy_resource on unknown {id:?}");
        }
    }

    fn gpu_virtual_address(&self, id: ResourceId) -> Result<GpuVirtualAddress, ResourceError> {
        self.shared.gpu().memory.gpu_address(id)
    }

    fn write_mapped(&self, id: ResourceId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut gpu = self.shared.gpu();
        if !gpu.memory.resource(id)?.heap_type.is_cpu_writable() {
            return Err(ResourceError::NotCpuVisible(id));
        }
        gpu.memory.write(id, offset, data)
    }

    fn read_mapped(&self, id: ResourceId, offset: u64, out: &mut [u8]) -> Result<(), ResourceError> {
        let gpu = self.shared.gpu();
        if !gpu.memory.resource(id)?.heap_type.is_cpu_readable() {
            return Err(ResourceError::NotCpuVisible(id));
        }
        out.copy_from_slice(gpu.memory.read(id, offset, out.len() as u64)?);
        Ok(())
    }

    fn create_descriptor_heap(&self, descriptor: &DescriptorHeapDescriptor) -> Result<DescriptorHeapId, ResourceError> {
        let id = self.shared.next_id();
        self.shared.gpu().descriptors.create(id, descriptor)?;
        Ok(DescriptorHeapId(id))
    }

    fn destroy_descriptor_heap(&self, id: DescriptorHeapId) {
        if !self.shared.gpu().descriptors.destroy(id.0) {
            log::warn!("SoftDevice: destroy_descriptor_heap on unknown {id:?}");
        }
    }

    fn descriptor_increment_size(&self, _kind: DescriptorHeapKind) -> u32 {
        DESCRIPTOR_INCREMENT
    }

    fn cpu_descriptor_start(&self, heap: DescriptorHeapId) -> Result<CpuDescriptorHandle, ResourceError> {
        self.shared.gpu().descriptors.cpu_start(heap.0)
    }

    fn gpu_descriptor_start(&self, heap: DescriptorHeapId) -> Result<GpuDescriptorHandle, ResourceError> {
        self.shared.gpu().descriptors.gpu_start(heap.0)
    }

    fn create_view(&self, view: &ViewDescriptor, destination: CpuDescriptorHandle) -> Result<(), ResourceError> {
        let mut gpu = self.shared.gpu();
        if let Some(resource) = view.resource() {
            gpu.memory.resource(resource)?;
        }
        gpu.descriptors.write(view, destination)
    }

    fn copy_descriptors_simple(
        &self,
        count: u32,
        destination: CpuDescriptorHandle,
        source: CpuDescriptorHandle,
        kind: DescriptorHeapKind,
    ) -> Result<(), ResourceError> {
        self.shared.gpu().descriptors.copy(count, destination, source, kind)
    }

    fn load_shader(&self, dir: &Path, name: &str) -> Result<ShaderBinary, ShaderError> {
        if dir.join(format!("{name}.{SHADER_BINARY_EXTENSION}")).is_file() {
            return ShaderBinary::load(dir, name);
        }
        log::debug!("SoftDevice: no binary for '{name}' in '{}', using the built-in", dir.display());
        Ok(ShaderBinary::builtin(name))
    }

    fn create_root_signature(&self, descriptor: &RootSignatureDescriptor) -> Result<RootSignatureId, PipelineError> {
        for (index, parameter) in descriptor.parameters.iter().enumerate() {
            let valid = match parameter {
                RootParameter::Constants { num_32bit_values, .. } => *num_32bit_values > 0,
                RootParameter::ConstantBufferView { .. } => true,
                RootParameter::DescriptorTable { ranges, .. } => {
                    !ranges.is_empty() && ranges.iter().all(|range| range.count > 0)
                }
            };
            if !valid {
                return Err(PipelineError::RootSignatureCreationFailed(format!(
                    "Parameter {index} of '{}' is empty",
                    descriptor.label.unwrap_or("root signature")
                )));
            }
        }
        let id = self.shared.next_id();
        self.shared.gpu().root_signatures.insert(
            id,
            SoftRootSignature {
                label: descriptor.label.unwrap_or("root signature").to_string(),
                parameters: descriptor.parameters.clone(),
            },
        );
        Ok(RootSignatureId(id))
    }

    fn create_graphics_pipeline(&self, descriptor: &GraphicsPipelineDescriptor) -> Result<PipelineStateId, PipelineError> {
        let mut gpu = self.shared.gpu();
        if !gpu.root_signatures.contains_key(&descriptor.root_signature.0) {
            return Err(Self::pipeline_error(descriptor.label, "unknown root signature"));
        }
        if descriptor.vertex_layout.is_empty() {
            return Err(Self::pipeline_error(descriptor.label, "empty vertex layout"));
        }
        if descriptor.vertex_shader.name().is_empty() || descriptor.pixel_shader.name().is_empty() {
            return Err(Self::pipeline_error(descriptor.label, "unnamed shader stage"));
        }
        if descriptor.depth_format.is_some_and(|format| format != TextureFormat::D32Float) {
            return Err(Self::pipeline_error(descriptor.label, "unsupported depth format"));
        }
        let id = self.shared.next_id();
        gpu.pipelines.insert(
            id,
            SoftPipeline::Graphics {
                label: descriptor.label.unwrap_or("graphics pipeline").to_string(),
                root_signature: descriptor.root_signature,
                vertex_stride: descriptor.vertex_layout.stride(),
            },
        );
        Ok(PipelineStateId(id))
    }

    fn create_compute_pipeline(&self, descriptor: &ComputePipelineDescriptor) -> Result<PipelineStateId, PipelineError> {
        let kernel = lock(&self.shared.kernels)
            .get(descriptor.shader.name())
            .cloned()
            .ok_or_else(|| {
                Self::pipeline_error(
                    descriptor.label,
                    format!("no compute kernel registered for shader '{}'", descriptor.shader.name()),
                )
            })?;
        let mut gpu = self.shared.gpu();
        if !gpu.root_signatures.contains_key(&descriptor.root_signature.0) {
            return Err(Self::pipeline_error(descriptor.label, "unknown root signature"));
        }
        let id = self.shared.next_id();
        gpu.pipelines.insert(
            id,
            SoftPipeline::Compute {
                label: descriptor.label.unwrap_or("compute pipeline").to_string(),
                root_signature: descriptor.root_signature,
                kernel,
            },
        );
        Ok(PipelineStateId(id))
    }

    fn create_command_signature(
        &self,
        descriptor: &CommandSignatureDescriptor,
    ) -> Result<CommandSignatureId, PipelineError> {
        let fail = |details: &str| {
            PipelineError::CommandSignatureCreationFailed(format!(
                "'{}': {details}",
                descriptor.label.unwrap_or("command signature")
            ))
        };
        let size: u32 = descriptor.arguments.iter().map(IndirectArgument::byte_size).sum();
        if size > descriptor.byte_stride {
            return Err(fail("arguments do not fit in the byte stride"));
        }
        if descriptor.arguments.last() != Some(&IndirectArgument::DrawIndexed)
            || descriptor
                .arguments
                .iter()
                .filter(|argument| **argument == IndirectArgument::DrawIndexed)
                .count()
                != 1
        {
            return Err(fail("exactly one draw, placed last, is supported"));
        }
        let gpu = self.shared.gpu();
        for argument in descriptor.arguments {
            if let IndirectArgument::Constant {
                root_parameter_index,
                dest_offset_in_32bit_values,
                num_32bit_values,
            } = argument
            {
                let root = descriptor
                    .root_signature
                    .ok_or_else(|| fail("constant arguments need a root signature"))?;
                let declared = gpu
                    .root_signatures
                    .get(&root.0)
                    .and_then(|signature| signature.parameters.get(*root_parameter_index as usize));
                let Some(RootParameter::Constants {
                    num_32bit_values: available,
                    ..
                }) = declared
                else {
                    return Err(fail("constant argument targets a non-constant root parameter"));
                };
                if dest_offset_in_32bit_values + num_32bit_values > *available {
                    return Err(fail("constant argument overruns its root parameter"));
                }
            }
        }
        drop(gpu);
        let id = self.shared.next_id();
        self.shared.gpu().command_signatures.insert(
            id,
            SoftCommandSignature {
                byte_stride: descriptor.byte_stride,
                arguments: descriptor.arguments.to_vec(),
                root_signature: descriptor.root_signature,
            },
        );
        Ok(CommandSignatureId(id))
    }

    fn create_command_allocator(&self, list_type: CommandListType) -> Result<CommandAllocatorId, RenderError> {
        let id = self.shared.next_id();
        lock(&self.shared.allocators).insert(id, AllocatorState { list_type, pending: 0 });
        Ok(CommandAllocatorId(id))
    }

    fn reset_command_allocator(&self, id: CommandAllocatorId) -> Result<(), RenderError> {
        let allocators = lock(&self.shared.allocators);
        let state = allocators
            .get(&id.0)
            .ok_or_else(|| RenderError::Internal(format!("Unknown command allocator {id:?}")))?;
        if state.pending > 0 {
            log::error!(
                "SoftDevice: {} allocator {id:?} reset with {} executions in flight",
                state.list_type.name(),
                state.pending
            );
            return Err(RenderError::OrderingViolation(format!(
                "{} command allocator reset while the GPU may still execute from it",
                state.list_type.name()
            )));
        }
        Ok(())
    }

    fn create_command_list(&self, list_type: CommandListType) -> Result<Box<dyn CommandList>, RenderError> {
        Ok(Box::new(SoftCommandList::new(Arc::clone(&self.shared), list_type)))
    }

    fn create_command_queue(&self, list_type: CommandListType) -> Result<Arc<dyn CommandQueue>, RenderError> {
        let queue = SoftQueue::spawn(Arc::clone(&self.shared), list_type)?;
        lock(&self.shared.queues).push(Arc::downgrade(queue.control()));
        Ok(queue)
    }

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>, RenderError> {
        if self.shared.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        let fence = Arc::new(SoftFence::new(initial_value));
        lock(&self.shared.fences).push(Arc::downgrade(&fence));
        if self.shared.is_lost() {
            fence.mark_lost();
        }
        Ok(fence)
    }

    fn create_swap_chain(
        &self,
        queue: &Arc<dyn CommandQueue>,
        descriptor: &SwapChainDescriptor,
    ) -> Result<Box<dyn SwapChain>, RenderError> {
        if queue.as_any().downcast_ref::<SoftQueue>().is_none() || queue.list_type() != CommandListType::Direct {
            return Err(RenderError::InitializationFailed(
                "A swap chain needs a direct queue of the software device".to_string(),
            ));
        }
        let swap_chain = HeadlessSwapChain::new(Arc::clone(&self.shared), Arc::clone(queue), *descriptor)?;
        Ok(Box::new(swap_chain))
    }
}

impl SoftShared {
    /// Creates a resource in its own implicit heap, as the swap chain does for its back buffers.
    pub(crate) fn create_committed(
        &self,
        descriptor: &ResourceDescriptor,
        initial_state: ResourceState,
    ) -> Result<ResourceId, ResourceError> {
        let heap = self.next_id();
        let id = self.next_id();
        let info = SoftMemory::allocation_info(descriptor);
        let mut gpu = self.gpu();
        gpu.memory.create_heap(
            heap,
            descriptor.label_or_default().to_string(),
            HeapType::GpuOnly,
            info.size,
            true,
        );
        gpu.memory.place(id, heap, 0, descriptor, initial_state)?;
        Ok(ResourceId(id))
    }

    pub(crate) fn destroy_resource(&self, id: ResourceId) {
        self.gpu().memory.destroy_resource(id.0);
    }

    pub(crate) fn create_descriptor_heap(&self, descriptor: &DescriptorHeapDescriptor) -> Result<DescriptorHeapId, ResourceError> {
        let id = self.next_id();
        self.gpu().descriptors.create(id, descriptor)?;
        Ok(DescriptorHeapId(id))
    }

    pub(crate) fn destroy_descriptor_heap(&self, id: DescriptorHeapId) {
        self.gpu().descriptors.destroy(id.0);
    }

    pub(crate) fn write_view(&self, view: &ViewDescriptor, destination: CpuDescriptorHandle) -> Result<(), ResourceError> {
        self.gpu().descriptors.write(view, destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_signature(device: &SoftDevice) -> RootSignatureId {
        device
            .create_root_signature(&RootSignatureDescriptor {
                label: Some("test"),
                parameters: vec![RootParameter::Constants {
                    register: 0,
                    num_32bit_values: 1,
                    visibility: ShaderVisibility::All,
                }],
                allow_input_assembler: true,
            })
            .unwrap()
    }

    #[test]
    fn mapped_access_follows_heap_visibility() {
        let device = SoftDevice::new();
        let descriptor = ResourceDescriptor::buffer("b", 16);
        let info = device.resource_allocation_info(&descriptor);
        let heap = device
            .create_heap(&HeapDescriptor {
                label: Some("gpu"),
                heap_type: HeapType::GpuOnly,
                size: info.size,
                alignment: info.alignment,
            })
            .unwrap();
        let buffer = device
            .create_placed_resource(heap, 0, &descriptor, ResourceState::Common)
            .unwrap();

        assert!(matches!(
            device.write_mapped(buffer, 0, &[1]),
            Err(ResourceError::NotCpuVisible(_))
        ));
        device.destroy_heap(heap);
        assert_eq!(device.resource_count(), 0);
    }

    #[test]
    fn unknown_compute_shaders_fail_to_compile() {
        let device = SoftDevice::new();
        let root = root_signature(&device);
        let shader = ShaderBinary::builtin("CSUnknown");
        let err = device
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some("cull"),
                root_signature: root,
                shader: &shader,
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::CompilationFailed { .. }));

        let culling = ShaderBinary::builtin(INDIRECT_CULLING_SHADER);
        assert!(device
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some("cull"),
                root_signature: root,
                shader: &culling,
            })
            .is_ok());
    }

    #[test]
    fn missing_shader_files_fall_back_to_builtins() {
        let device = SoftDevice::new();
        let shader = device.load_shader(Path::new("does/not/exist"), "VSIndirect").unwrap();
        assert!(shader.is_builtin());
        assert_eq!(shader.name(), "VSIndirect");
    }

    #[test]
    fn command_signature_constants_must_match_the_root_signature() {
        let device = SoftDevice::new();
        let root = root_signature(&device);
        let arguments = [
            IndirectArgument::Constant {
                root_parameter_index: 0,
                dest_offset_in_32bit_values: 0,
                num_32bit_values: 1,
            },
            IndirectArgument::DrawIndexed,
        ];
        let mut descriptor = CommandSignatureDescriptor {
            label: Some("draws"),
            byte_stride: IndirectCommand::STRIDE,
            arguments: &arguments,
            root_signature: Some(root),
        };
        assert!(device.create_command_signature(&descriptor).is_ok());

        descriptor.root_signature = None;
        assert!(device.create_command_signature(&descriptor).is_err());
        descriptor.root_signature = Some(root);
        descriptor.byte_stride = 16;
        assert!(device.create_command_signature(&descriptor).is_err());
    }

    #[test]
    fn allocators_with_work_in_flight_refuse_to_reset() {
        let device = SoftDevice::new();
        let queue = device.create_command_queue(CommandListType::Copy).unwrap();
        let allocator = device.create_command_allocator(CommandListType::Copy).unwrap();
        let mut list = device.create_command_list(CommandListType::Copy).unwrap();
        list.reset(allocator).unwrap();
        list.close().unwrap();

        device.pause(CommandListType::Copy);
        queue.execute_command_lists(&[list.as_ref()]).unwrap();
        assert!(matches!(
            device.reset_command_allocator(allocator),
            Err(RenderError::OrderingViolation(_))
        ));

        device.resume(CommandListType::Copy);
        device.wait_idle().unwrap();
        device.reset_command_allocator(allocator).unwrap();
        assert_eq!(device.stats().command_lists, 1);
    }
}
