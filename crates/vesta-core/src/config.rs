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

//! Engine-wide configuration.
//!
//! The configuration is a plain serde structure so it can be embedded in a host
//! application's own settings, or loaded on its own from a RON file.

use crate::math::AxisBounds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Smallest number of frames the engine can keep in flight.
pub const MIN_BUFFER_COUNT: u32 = 2;
/// Largest number of frames the engine can keep in flight.
pub const MAX_BUFFER_COUNT: u32 = 3;

/// Selects how models are turned into draw calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RenderEngineKind {
    /// One CPU-recorded `draw_indexed` per model.
    IndividualDraw,
    /// GPU-culled commands consumed by a single `execute_indirect` per frame.
    #[default]
    IndirectDraw,
}

/// Errors raised while loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path of the file that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The RON text could not be parsed into an [`EngineConfig`].
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// A field holds a value the engine cannot run with.
    #[error("invalid engine config: {0}")]
    Invalid(String),
}

/// Settings the root engine context is constructed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Application name, used for labels and logging.
    pub app_name: String,
    /// Initial width of the presentation target in pixels.
    pub width: u32,
    /// Initial height of the presentation target in pixels.
    pub height: u32,
    /// Number of back buffers, which is also the maximum number of frames in flight.
    pub buffer_count: u32,
    /// Draw submission strategy.
    pub render_engine: RenderEngineKind,
    /// Clear colour of the render target (RGBA).
    pub background_colour: [f32; 4],
    /// Directory compiled shader binaries are loaded from.
    pub shader_path: PathBuf,
    /// Upper bound for any CPU wait on a GPU fence. `None` waits forever.
    pub fence_timeout_ms: Option<u64>,
    /// Worker threads used for CPU-side upload preparation. `0` picks the host default.
    pub worker_threads: usize,
    /// Region outside of which the culling pass discards models.
    pub culling_bounds: AxisBounds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "Vesta".to_string(),
            width: 1280,
            height: 720,
            buffer_count: MIN_BUFFER_COUNT,
            render_engine: RenderEngineKind::default(),
            background_colour: [0.1, 0.1, 0.1, 0.1],
            shader_path: PathBuf::from("shaders"),
            fence_timeout_ms: None,
            worker_threads: 0,
            culling_bounds: AxisBounds::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from RON text and validates it.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a RON configuration file.
    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    /// Checks that every field holds a value the engine can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_BUFFER_COUNT..=MAX_BUFFER_COUNT).contains(&self.buffer_count) {
            return Err(ConfigError::Invalid(format!(
                "buffer_count must be between {MIN_BUFFER_COUNT} and {MAX_BUFFER_COUNT}, got {}",
                self.buffer_count
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "initial size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// The fence wait bound as a [`Duration`], if one is configured.
    pub fn fence_timeout(&self) -> Option<Duration> {
        self.fence_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_ron_falls_back_to_defaults() {
        let config = EngineConfig::from_ron_str(
            "(app_name: \"demo\", buffer_count: 3, render_engine: IndividualDraw, fence_timeout_ms: Some(250))",
        )
        .expect("config should parse");

        assert_eq!(config.app_name, "demo");
        assert_eq!(config.buffer_count, 3);
        assert_eq!(config.render_engine, RenderEngineKind::IndividualDraw);
        assert_eq!(config.fence_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.width, 1280);
    }

    #[test]
    fn out_of_range_buffer_count_is_rejected() {
        let err = EngineConfig::from_ron_str("(buffer_count: 7)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_ron_is_a_parse_error() {
        let err = EngineConfig::from_ron_str("(buffer_count: )").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
