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

//! Compute kernels: the CPU stand-ins for compiled compute shaders.
//!
//! A compute pipeline is bound to the kernel registered under its shader name.
//! Kernels reach their inputs the way a shader does, by register, and the context
//! resolves registers through the bound root signature and root arguments.

use std::collections::HashMap;
use std::fmt::Debug;

use thiserror::Error;
use vesta_core::math::Float3;
use vesta_core::renderer::api::{
    CullingData, DescriptorRangeType, GpuVirtualAddress, ResourceFlags, ResourceState, RootParameter,
    ViewDescriptor, CULLING_THREAD_BLOCK_SIZE, INDIRECT_CULLING_SHADER,
};
use vesta_core::renderer::ResourceError;

use super::descriptors::{SoftDescriptors, DESCRIPTOR_INCREMENT};
use super::memory::SoftMemory;
use super::state::StateTracker;

/// A value bound to a root parameter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RootArgument {
    Table(vesta_core::renderer::api::GpuDescriptorHandle),
    ConstantBuffer(GpuVirtualAddress),
    Constants(Vec<u32>),
}

pub(crate) type RootArguments = HashMap<u32, RootArgument>;

/// An error raised while a kernel runs.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The shader register is not declared by the root signature.
    #[error("register {register} of type {range_type:?} is not declared by the root signature")]
    Undeclared {
        /// Register class.
        range_type: DescriptorRangeType,
        /// Register number.
        register: u32,
    },
    /// The root parameter holding the register has no argument bound.
    #[error("root parameter {0} is not bound")]
    Unbound(u32),
    /// The bound view does not fit the access.
    #[error("{0}")]
    Binding(String),
    /// A memory access failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Elements of a structured buffer, copied out of GPU memory.
#[derive(Debug, Clone)]
pub struct StructuredBuffer {
    bytes: Vec<u8>,
    stride: u32,
}

impl StructuredBuffer {
    /// Number of elements.
    pub fn len(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.bytes.len() / self.stride as usize
        }
    }

    /// Returns `true` if the view covers no element.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bytes of element `index`.
    pub fn element(&self, index: usize) -> Option<&[u8]> {
        let stride = self.stride as usize;
        self.bytes.get(index * stride..(index + 1) * stride)
    }
}

/// What a kernel sees of the GPU while it runs.
pub struct KernelContext<'a> {
    pub(crate) memory: &'a mut SoftMemory,
    pub(crate) descriptors: &'a SoftDescriptors,
    pub(crate) tracker: &'a mut StateTracker,
    pub(crate) layout: &'a [RootParameter],
    pub(crate) arguments: &'a RootArguments,
}

impl KernelContext<'_> {
    fn table_view(&self, range_type: DescriptorRangeType, register: u32) -> Result<ViewDescriptor, KernelError> {
        for (index, parameter) in self.layout.iter().enumerate() {
            let RootParameter::DescriptorTable { ranges, .. } = parameter else {
                continue;
            };
            let mut slot = 0u32;
            for range in ranges {
                let declared = range.base_register..range.base_register + range.count;
                if range.range_type == range_type && declared.contains(&register) {
                    let index = index as u32;
                    let Some(RootArgument::Table(base)) = self.arguments.get(&index) else {
                        return Err(KernelError::Unbound(index));
                    };
                    let handle = base.offset(u64::from(slot + register - range.base_register), DESCRIPTOR_INCREMENT);
                    return self.descriptors.view_at_gpu(handle).ok_or_else(|| {
                        KernelError::Binding(format!("no view written for {range_type:?} register {register}"))
                    });
                }
                slot += range.count;
            }
        }
        Err(KernelError::Undeclared { range_type, register })
    }

    /// Reads the structured buffer bound to SRV register `register`.
    pub fn structured_buffer(&mut self, register: u32) -> Result<StructuredBuffer, KernelError> {
        let ViewDescriptor::BufferSrv {
            resource,
            first_element,
            element_count,
            stride,
        } = self.table_view(DescriptorRangeType::Srv, register)?
        else {
            return Err(KernelError::Binding(format!("t{register} is not a buffer view")));
        };
        self.tracker
            .require(self.memory, resource, ResourceState::NonPixelShaderResource)
            .map_err(KernelError::Binding)?;
        let bytes = self
            .memory
            .read(resource, first_element * u64::from(stride), u64::from(element_count) * u64::from(stride))?
            .to_vec();
        Ok(StructuredBuffer { bytes, stride })
    }

    /// Reads `size` bytes of the constant buffer bound to CBV register `register`.
    pub fn constant_buffer(&mut self, register: u32, size: u64) -> Result<Vec<u8>, KernelError> {
        let index = self
            .layout
            .iter()
            .position(|parameter| {
                matches!(parameter, RootParameter::ConstantBufferView { register: declared, .. } if *declared == register)
            })
            .ok_or(KernelError::Undeclared {
                range_type: DescriptorRangeType::Cbv,
                register,
            })? as u32;
        let Some(RootArgument::ConstantBuffer(address)) = self.arguments.get(&index) else {
            return Err(KernelError::Unbound(index));
        };
        if let Some((resource, _)) = self.memory.resource_at(*address) {
            self.tracker
                .require(self.memory, resource, ResourceState::VertexAndConstantBuffer)
                .map_err(KernelError::Binding)?;
        }
        Ok(self.memory.read_address(*address, size)?.to_vec())
    }

    /// Appends `element` to the buffer bound to UAV register `register`, bumping its
    /// counter. Returns `false` when the buffer is full.
    pub fn append(&mut self, register: u32, element: &[u8]) -> Result<bool, KernelError> {
        let ViewDescriptor::BufferUav {
            resource,
            first_element,
            element_count,
            stride,
            counter_offset,
        } = self.table_view(DescriptorRangeType::Uav, register)?
        else {
            return Err(KernelError::Binding(format!("u{register} is not a buffer view")));
        };
        let counter_offset = counter_offset
            .ok_or_else(|| KernelError::Binding(format!("u{register} has no append counter")))?;
        if element.len() != stride as usize {
            return Err(KernelError::Binding(format!(
                "appending {} bytes to u{register}, whose stride is {stride}",
                element.len()
            )));
        }
        if !self.memory.resource(resource)?.flags.contains(ResourceFlags::ALLOW_UNORDERED_ACCESS) {
            return Err(KernelError::Binding(format!(
                "u{register} views a buffer created without unordered access"
            )));
        }
        self.tracker
            .require(self.memory, resource, ResourceState::UnorderedAccess)
            .map_err(KernelError::Binding)?;

        let counter: u32 = bytemuck::pod_read_unaligned(self.memory.read(resource, counter_offset, 4)?);
        if counter >= element_count {
            return Ok(false);
        }
        let offset = (first_element + u64::from(counter)) * u64::from(stride);
        self.memory.write(resource, offset, element)?;
        self.memory.write(resource, counter_offset, bytemuck::bytes_of(&(counter + 1)))?;
        Ok(true)
    }
}

/// A CPU implementation of a compute shader.
pub trait ComputeKernel: Send + Sync + Debug {
    /// The shader name pipelines are created with.
    fn name(&self) -> &str;

    /// Threads per group along each axis.
    fn thread_group_size(&self) -> [u32; 3];

    /// Runs `groups` thread groups.
    fn dispatch(&self, context: &mut KernelContext<'_>, groups: [u32; 3]) -> Result<(), KernelError>;
}

/// Culls indirect commands against an axis-aligned box, appending survivors to an
/// output buffer with a counter.
///
/// Registers: `t0` commands, `t1` model positions, `u0` output, `b0` [`CullingData`].
#[derive(Debug, Default, Clone, Copy)]
pub struct IndirectCullingKernel;

impl ComputeKernel for IndirectCullingKernel {
    fn name(&self) -> &str {
        INDIRECT_CULLING_SHADER
    }

    fn thread_group_size(&self) -> [u32; 3] {
        [CULLING_THREAD_BLOCK_SIZE, 1, 1]
    }

    fn dispatch(&self, context: &mut KernelContext<'_>, groups: [u32; 3]) -> Result<(), KernelError> {
        let culling: CullingData =
            bytemuck::pod_read_unaligned(&context.constant_buffer(0, std::mem::size_of::<CullingData>() as u64)?);
        let commands = context.structured_buffer(0)?;
        let positions = context.structured_buffer(1)?;
        let bounds = culling.bounds();

        let threads = u64::from(groups[0]) * u64::from(groups[1]) * u64::from(groups[2]) * u64::from(CULLING_THREAD_BLOCK_SIZE);
        let live = threads.min(u64::from(culling.command_count)) as usize;
        for thread in 0..live {
            let (Some(command), Some(position)) = (commands.element(thread), positions.element(thread)) else {
                break;
            };
            let position: Float3 = bytemuck::pod_read_unaligned(position);
            if bounds.contains(position) && !context.append(0, command)? {
                break;
            }
        }
        Ok(())
    }
}
