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
use std::sync::{Arc, OnceLock};

/// A write-once, read-many cell handed out before its value exists.
///
/// Subsystems request slots (descriptor indices, buffer addresses) while the data pass
/// is still collecting work, and only learn the final value once the backing table or
/// heap is created. Every clone observes the same resolution.
///
/// Reading before [`SharedAddress::resolve`] is a programming error: it trips a debug
/// assertion, and release builds fall back to `T::default()`.
pub struct SharedAddress<T> {
    cell: Arc<OnceLock<T>>,
}

impl<T> SharedAddress<T> {
    /// Creates an unresolved cell.
    pub fn new() -> Self {
        Self {
            cell: Arc::new(OnceLock::new()),
        }
    }

    /// Creates a cell that is already resolved to `value`.
    pub fn resolved(value: T) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(value);
        Self { cell: Arc::new(cell) }
    }

    /// Sets the value. Resolving twice is rejected and hands the value back.
    pub fn resolve(&self, value: T) -> Result<(), T> {
        let result = self.cell.set(value);
        debug_assert!(result.is_ok(), "SharedAddress resolved twice");
        result
    }

    /// Returns `true` once the value is set.
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Returns `true` if both handles point to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: Copy> SharedAddress<T> {
    /// The value, or `None` while unresolved.
    pub fn get(&self) -> Option<T> {
        self.cell.get().copied()
    }
}

impl<T: Copy + Default> SharedAddress<T> {
    /// The value. Must only be called after resolution.
    pub fn get_or_default(&self) -> T {
        debug_assert!(self.is_resolved(), "SharedAddress read before it was resolved");
        self.get().unwrap_or_default()
    }
}

impl<T> Default for SharedAddress<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SharedAddress<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedAddress<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => f.debug_tuple("SharedAddress").field(value).finish(),
            None => f.write_str("SharedAddress(<unresolved>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_the_resolution() {
        let address = SharedAddress::<u64>::new();
        let reader = address.clone();
        assert!(!reader.is_resolved());
        assert_eq!(reader.get(), None);

        address.resolve(0x1000).unwrap();

        assert!(reader.ptr_eq(&address));
        assert_eq!(reader.get(), Some(0x1000));
        assert_eq!(reader.get_or_default(), 0x1000);
    }

    #[test]
    fn pre_resolved_cell() {
        let address = SharedAddress::resolved(7usize);
        assert!(address.is_resolved());
        assert_eq!(format!("{address:?}"), "SharedAddress(7)");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "read before it was resolved")]
    fn early_read_trips_the_debug_assertion() {
        let address = SharedAddress::<u32>::new();
        let _ = address.get_or_default();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "resolved twice")]
    fn double_resolution_trips_the_debug_assertion() {
        let address = SharedAddress::<u32>::new();
        let _ = address.resolve(1);
        let _ = address.resolve(2);
    }
}
