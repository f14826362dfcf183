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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::renderer::api::{CommandListType, HeapType, PipelineStateId, ResourceId};
use std::path::PathBuf;
use thiserror::Error;

/// An error related to loading a compiled shader binary.
#[derive(Debug, Error)]
pub enum ShaderError {
    /// The binary could not be read from disk.
    #[error("Failed to load shader binary from '{path}': {source_error}")]
    LoadError {
        /// The path of the file that failed to load.
        path: PathBuf,
        /// The underlying I/O error message.
        source_error: String,
    },
    /// The backend does not know how to run the given shader.
    #[error("Shader '{name}' is not supported by the backend")]
    Unsupported {
        /// Name of the shader entry.
        name: String,
    },
}

/// An error related to the creation or use of a pipeline state object.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The root signature layout could not be created.
    #[error("Root signature creation failed: {0}")]
    RootSignatureCreationFailed(String),
    /// The backend failed to build the pipeline state object.
    #[error("Pipeline compilation failed for '{}': {details}", .label.as_deref().unwrap_or("Unknown"))]
    CompilationFailed {
        /// A descriptive label for the pipeline, if available.
        label: Option<String>,
        /// Detailed error messages from the backend.
        details: String,
    },
    /// A pipeline handle does not refer to a live pipeline.
    #[error("Invalid pipeline state ID: {id:?}")]
    InvalidPipeline {
        /// The invalid handle.
        id: PipelineStateId,
    },
    /// A command signature could not be created.
    #[error("Command signature creation failed: {0}")]
    CommandSignatureCreationFailed(String),
}

/// An error related to the creation or use of a GPU resource (heaps, buffers, textures,
/// descriptor tables).
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    #[error("Shader resource error: {0}")]
    Shader(#[from] ShaderError),
    /// A pipeline-specific error occurred.
    #[error("Pipeline resource error: {0}")]
    Pipeline(#[from] PipelineError),
    /// The handle used to reference a resource is invalid.
    #[error("Invalid resource handle: {0:?}")]
    InvalidHandle(ResourceId),
    /// A heap of the given class was created a second time, or reserved into after creation.
    #[error("{0:?} heap was already created")]
    HeapAlreadyCreated(HeapType),
    /// A deferred address was resolved a second time.
    #[error("{0} was already resolved")]
    AlreadyResolved(&'static str),
    /// A placed resource was requested before its heap was created.
    #[error("{0:?} heap has not been created yet")]
    HeapNotCreated(HeapType),
    /// The resource lives in memory the CPU cannot map.
    #[error("Resource {0:?} is not CPU visible")]
    NotCpuVisible(ResourceId),
    /// An error originating from the specific backend implementation.
    #[error("Backend-specific resource error: {0}")]
    BackendError(String),
    /// Texture data does not match its declared size or format.
    #[error("Invalid texture data: {0}")]
    InvalidTextureData(String),
    /// An access fell outside of a resource's bounds.
    #[error("Resource access out of bounds: offset {offset} + size {size} > {capacity}")]
    OutOfBounds {
        /// Start of the access in bytes.
        offset: u64,
        /// Size of the access in bytes.
        size: u64,
        /// Size of the resource in bytes.
        capacity: u64,
    },
}

/// A high-level error that can occur within the rendering engine or graphics device.
#[derive(Debug, Error)]
pub enum RenderError {
    /// An operation was attempted before the engine finished its data pass.
    #[error("The rendering engine is not initialized: {0}")]
    NotInitialized(&'static str),
    /// A failure occurred while creating a device, queue or swap chain.
    #[error("Failed to initialize graphics backend: {0}")]
    InitializationFailed(String),
    /// Failed to present or resize the swap chain.
    #[error("Swap chain operation failed: {0}")]
    SwapChainFailed(String),
    /// Every command allocator of a queue is still in use.
    #[error("All {capacity} command allocators of the {list_type:?} queue are in use")]
    AllocatorPoolExhausted {
        /// The queue type whose pool ran dry.
        list_type: CommandListType,
        /// Number of allocators in the pool.
        capacity: usize,
    },
    /// A command list was used outside of a reset/close pair.
    #[error("Command list ordering violation: {0}")]
    OrderingViolation(String),
    /// A model cannot be drawn by the selected render engine.
    #[error("Model rejected: {0}")]
    IncompatibleModel(String),
    /// An error occurred while managing a GPU resource.
    #[error("Graphics resource operation failed: {0}")]
    ResourceError(#[from] ResourceError),
    /// The graphics device stopped making progress, or was removed.
    /// This is a catastrophic error; the engine has to be rebuilt.
    #[error("The graphics device was lost and needs to be reinitialized.")]
    DeviceLost,
    /// An unexpected or internal error occurred.
    #[error("An internal or unexpected error occurred: {0}")]
    Internal(String),
}

impl From<PipelineError> for RenderError {
    fn from(err: PipelineError) -> Self {
        RenderError::ResourceError(err.into())
    }
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::ResourceError(err.into())
    }
}
