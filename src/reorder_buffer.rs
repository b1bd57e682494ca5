//! Reorder buffer for ordered concurrent mapping
//!
//! Results arrive tagged with the sequence index of the input that produced
//! them, in any order. The buffer releases them strictly by index: the result
//! at the emission cursor goes out immediately together with every buffered
//! successor that is now contiguous; anything further ahead waits.

use std::collections::HashMap;

#[derive(Debug)]
pub struct ReorderBuffer<U> {
    cursor: usize,
    pending: HashMap<usize, U>,
    high_water_mark: usize,
}

impl<U> Default for ReorderBuffer<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> ReorderBuffer<U> {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            pending: HashMap::new(),
            high_water_mark: 0,
        }
    }

    /// Record the result for `index` and return everything that is now
    /// ready to emit, in index order.
    ///
    /// Each index must be completed exactly once and never below the cursor.
    pub fn complete(&mut self, index: usize, value: U) -> Vec<U> {
        debug_assert!(index >= self.cursor, "index {} already emitted", index);

        if index != self.cursor {
            self.pending.insert(index, value);
            self.high_water_mark = self.high_water_mark.max(self.pending.len());
            return Vec::new();
        }

        let mut ready = vec![value];
        self.cursor += 1;
        while let Some(next) = self.pending.remove(&self.cursor) {
            ready.push(next);
            self.cursor += 1;
        }
        ready
    }

    /// Index of the next result to emit
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Largest number of results that waited at the same time
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }
}
