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

//! Indirect argument layouts and command signatures.

use super::pipeline::RootSignatureId;
use crate::math::{AxisBounds, AxisRange};
use bytemuck::{Pod, Zeroable};

/// Entry name of the culling compute shader.
pub const INDIRECT_CULLING_SHADER: &str = "CSIndirectArgs";

/// Threads per group of the culling shader; one thread handles one command.
pub const CULLING_THREAD_BLOCK_SIZE: u32 = 128;

/// Arguments of one indexed draw, laid out the way the GPU reads them from an
/// argument buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedArguments {
    /// Number of indices read per instance.
    pub index_count_per_instance: u32,
    /// Number of instances drawn.
    pub instance_count: u32,
    /// Location of the first index read.
    pub start_index_location: u32,
    /// Value added to each index before reading a vertex.
    pub base_vertex_location: i32,
    /// Value added to each instance index.
    pub start_instance_location: u32,
}

/// One GPU-driven draw: the model index root constant followed by the draw arguments.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectCommand {
    /// Written into the model-index root constant before the draw.
    pub model_index: u32,
    /// The draw itself.
    pub draw: DrawIndexedArguments,
}

impl IndirectCommand {
    /// Size of one command in an argument buffer.
    pub const STRIDE: u32 = std::mem::size_of::<IndirectCommand>() as u32;

    /// A single-instance draw of `index_count` indices starting at `start_index`,
    /// with indices relative to `base_vertex`.
    pub const fn new(model_index: u32, index_count: u32, start_index: u32, base_vertex: i32) -> Self {
        Self {
            model_index,
            draw: DrawIndexedArguments {
                index_count_per_instance: index_count,
                instance_count: 1,
                start_index_location: start_index,
                base_vertex_location: base_vertex,
                start_instance_location: 0,
            },
        }
    }
}

/// Constants read by the culling shader, bound as a root constant buffer.
///
/// Register layout (compute root signature):
/// - `t0`: input [`IndirectCommand`]s, `t1`: model positions (three `f32`s each),
/// - `u0`: output commands with an append counter,
/// - `b0`: this struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CullingData {
    /// Number of valid entries in `t0`.
    pub command_count: u32,
    /// Kept range on the X axis.
    pub x_bounds: AxisRange,
    /// Kept range on the Y axis.
    pub y_bounds: AxisRange,
    /// Kept range on the Z axis.
    pub z_bounds: AxisRange,
}

impl CullingData {
    /// Builds the constants for `command_count` commands culled against `bounds`.
    pub const fn new(command_count: u32, bounds: &AxisBounds) -> Self {
        Self {
            command_count,
            x_bounds: bounds.x,
            y_bounds: bounds.y,
            z_bounds: bounds.z,
        }
    }

    /// Returns the bounds the commands are tested against.
    pub const fn bounds(&self) -> AxisBounds {
        AxisBounds::new(self.x_bounds, self.y_bounds, self.z_bounds)
    }
}

/// One argument of a command signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectArgument {
    /// Root constants written from the argument buffer.
    Constant {
        /// Root parameter receiving the constants.
        root_parameter_index: u32,
        /// First 32-bit slot written.
        dest_offset_in_32bit_values: u32,
        /// Number of 32-bit values written.
        num_32bit_values: u32,
    },
    /// A [`DrawIndexedArguments`] block.
    DrawIndexed,
}

impl IndirectArgument {
    /// Bytes the argument occupies in an argument buffer.
    pub const fn byte_size(&self) -> u32 {
        match self {
            IndirectArgument::Constant {
                num_32bit_values, ..
            } => *num_32bit_values * 4,
            IndirectArgument::DrawIndexed => std::mem::size_of::<DrawIndexedArguments>() as u32,
        }
    }
}

/// An opaque handle to a command signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandSignatureId(pub usize);

/// Describes how an argument buffer is interpreted by `execute_indirect`.
#[derive(Debug, Clone)]
pub struct CommandSignatureDescriptor<'a> {
    /// A debug label.
    pub label: Option<&'a str>,
    /// Bytes between two commands.
    pub byte_stride: u32,
    /// Arguments of one command, in buffer order.
    pub arguments: &'a [IndirectArgument],
    /// The root signature, required whenever an argument writes root constants.
    pub root_signature: Option<RootSignatureId>,
}
