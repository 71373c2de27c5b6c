// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Bounded sample queues for the two thread boundaries of the engine.
//!
//! [`BlockingQueue`] sits between a device's capture thread and the
//! reader thread and never loses samples. [`DroppingQueue`] feeds the
//! audio callback, which must never wait: overflow is discarded and
//! underrun reads as silence.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Fixed-capacity FIFO ring indexed by head and length.
#[derive(Debug)]
struct Ring<T> {
    buf: Vec<T>,
    head: usize,
    len: usize,
}

impl<T: Copy + Default> Ring<T> {
    fn new(capacity: usize) -> Self {
        Self {
            buf: vec![T::default(); capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push(&mut self, value: T) -> bool {
        if self.is_full() {
            return false;
        }
        let tail = (self.head + self.len) % self.buf.len();
        self.buf[tail] = value;
        self.len += 1;
        true
    }

    fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.buf[self.head];
        self.head = (self.head + 1) % self.buf.len();
        self.len -= 1;
        Some(value)
    }

    fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

fn relock<G>(res: Result<G, PoisonError<G>>) -> G {
    res.unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct BlockingState<T> {
    ring: Ring<T>,
    closed: bool,
}

/// Bounded FIFO where `push` waits while full and `pop` waits while empty.
///
/// Waits have no timeout. [`BlockingQueue::close`] is the cancel path: it
/// wakes every waiter, after which pushes fail and pops drain what is left
/// and then return `None`.
#[derive(Debug)]
pub struct BlockingQueue<T> {
    state: Mutex<BlockingState<T>>,
    cond: Condvar,
}

impl<T: Copy + Default> BlockingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(BlockingState {
                ring: Ring::new(capacity),
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BlockingState<T>> {
        relock(self.state.lock())
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, BlockingState<T>>) -> MutexGuard<'a, BlockingState<T>> {
        relock(self.cond.wait(guard))
    }

    /// Returns `false` if the queue was closed before the value fit.
    pub fn push(&self, value: T) -> bool {
        let mut state = self.lock();
        while state.ring.is_full() && !state.closed {
            state = self.wait(state);
        }
        if state.closed {
            return false;
        }
        state.ring.push(value);
        self.cond.notify_all();
        true
    }

    /// Push every value in order, waiting for room as needed. Returns how
    /// many were queued (fewer than `values.len()` only if closed).
    pub fn push_slice(&self, values: &[T]) -> usize {
        let mut state = self.lock();
        let mut pushed = 0;
        for &v in values {
            while state.ring.is_full() && !state.closed {
                self.cond.notify_all();
                state = self.wait(state);
            }
            if state.closed {
                break;
            }
            state.ring.push(v);
            pushed += 1;
        }
        self.cond.notify_all();
        pushed
    }

    /// Waits for a value; `None` once closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        while state.ring.is_empty() && !state.closed {
            state = self.wait(state);
        }
        let value = state.ring.pop();
        self.cond.notify_all();
        value
    }

    /// Waits until at least one value is available, then moves up to
    /// `out.len()` values. Returns 0 only when closed and drained.
    pub fn pop_into(&self, out: &mut [T]) -> usize {
        if out.is_empty() {
            return 0;
        }
        let mut state = self.lock();
        while state.ring.is_empty() && !state.closed {
            state = self.wait(state);
        }
        let mut n = 0;
        while n < out.len() {
            match state.ring.pop() {
                Some(v) => {
                    out[n] = v;
                    n += 1;
                }
                None => break,
            }
        }
        self.cond.notify_all();
        n
    }

    pub fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            tracing::debug!("sample queue closed with {} pending", state.ring.len);
        }
        state.closed = true;
        self.cond.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().ring.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().ring.capacity()
    }
}

/// Bounded FIFO that never blocks: a full queue rejects pushes and an
/// empty one yields `T::default()`.
#[derive(Debug)]
pub struct DroppingQueue<T> {
    ring: Mutex<Ring<T>>,
}

impl<T: Copy + Default> DroppingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring::new(capacity)),
        }
    }

    /// `false` when full; the value is dropped and the contents untouched.
    pub fn push(&self, value: T) -> bool {
        relock(self.ring.lock()).push(value)
    }

    /// Queue as many values as fit; returns how many were accepted.
    pub fn push_slice(&self, values: &[T]) -> usize {
        let mut ring = relock(self.ring.lock());
        values.iter().take_while(|&&v| ring.push(v)).count()
    }

    pub fn pop(&self) -> T {
        relock(self.ring.lock()).pop().unwrap_or_default()
    }

    /// Fill `out` completely, padding with `T::default()` on underrun.
    /// Returns the number of real values copied.
    pub fn pop_into(&self, out: &mut [T]) -> usize {
        let mut ring = relock(self.ring.lock());
        let mut real = 0;
        for slot in out.iter_mut() {
            *slot = match ring.pop() {
                Some(v) => {
                    real += 1;
                    v
                }
                None => T::default(),
            };
        }
        real
    }

    pub fn len(&self) -> usize {
        relock(self.ring.lock()).len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        relock(self.ring.lock()).capacity()
    }

    pub fn clear(&self) {
        relock(self.ring.lock()).clear();
    }
}
