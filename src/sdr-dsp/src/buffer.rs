// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

/// Fixed-capacity output accumulator shared by every pipeline stage.
///
/// Samples are appended one at a time; the whole block is handed to the
/// flush closure exactly when it becomes full and the buffer starts over.
/// A partially filled block is never flushed.
#[derive(Debug, Clone)]
pub struct FlushBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
}

impl<T: Copy> FlushBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn push<F: FnMut(&[T])>(&mut self, value: T, flush: &mut F) {
        self.buf.push(value);
        if self.buf.len() >= self.capacity {
            flush(&self.buf);
            self.buf.clear();
        }
    }

    /// Number of samples waiting for the block to fill.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
