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

use vesta_core::renderer::api::{ScissorRect, Viewport};
use vesta_core::renderer::CommandList;

/// The viewport and scissor rectangle covering the whole back buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportAndScissor {
    viewport: Viewport,
    scissor: ScissorRect,
}

impl ViewportAndScissor {
    /// Covers a `width` x `height` target.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Viewport::full(width, height),
            scissor: ScissorRect::full(width, height),
        }
    }

    /// Follows the back buffers to their new size.
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    /// The viewport.
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// The scissor rectangle.
    pub fn scissor_rect(&self) -> &ScissorRect {
        &self.scissor
    }

    /// Sets both on `list`.
    pub fn bind(&self, list: &mut dyn CommandList) {
        list.set_viewport(&self.viewport);
        list.set_scissor_rect(&self.scissor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn covers_the_whole_target() {
        let area = ViewportAndScissor::new(800, 600);

        assert_relative_eq!(area.viewport().width, 800.0);
        assert_relative_eq!(area.viewport().height, 600.0);
        assert_relative_eq!(area.viewport().max_depth, 1.0);
        assert_eq!(area.scissor_rect().right, 800);
        assert_eq!(area.scissor_rect().bottom, 600);
    }

    #[test]
    fn resize_replaces_both_rectangles() {
        let mut area = ViewportAndScissor::new(800, 600);
        area.resize(320, 200);
        assert_eq!(area, ViewportAndScissor::new(320, 200));
        assert_relative_eq!(area.viewport().x, 0.0);
    }
}
