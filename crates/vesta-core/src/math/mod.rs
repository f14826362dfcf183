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

//! Small math types shared by the culling pipeline and the configuration.

use serde::{Deserialize, Serialize};

/// A position or direction in 3D space, laid out as three packed `f32`s.
pub type Float3 = [f32; 3];

/// An inclusive `[min, max]` range on a single axis.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AxisRange {
    /// Lower bound (inclusive).
    pub min: f32,
    /// Upper bound (inclusive).
    pub max: f32,
}

impl AxisRange {
    /// Creates a new range.
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Returns `true` if `value` lies inside the range.
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// An axis-aligned box described by one range per axis.
///
/// This is the shape the culling shader tests model positions against.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AxisBounds {
    /// Range on the X axis.
    pub x: AxisRange,
    /// Range on the Y axis.
    pub y: AxisRange,
    /// Range on the Z axis.
    pub z: AxisRange,
}

impl AxisBounds {
    /// Creates bounds from three ranges.
    pub const fn new(x: AxisRange, y: AxisRange, z: AxisRange) -> Self {
        Self { x, y, z }
    }

    /// Returns `true` if the point lies inside the box (borders included).
    pub fn contains(&self, point: Float3) -> bool {
        self.x.contains(point[0]) && self.y.contains(point[1]) && self.z.contains(point[2])
    }
}

impl Default for AxisBounds {
    fn default() -> Self {
        Self {
            x: AxisRange::new(-1.0, 1.0),
            y: AxisRange::new(-1.0, 1.0),
            z: AxisRange::new(0.0, 100.0),
        }
    }
}
