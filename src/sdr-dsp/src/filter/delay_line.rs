// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use super::fir::Sample;

/// Circular delay line of fixed length.
///
/// `push` overwrites the oldest entry; `newest_to_oldest` walks backwards
/// from the entry just written, wrapping at the start of the storage.
#[derive(Debug, Clone)]
pub struct DelayLine<T> {
    buf: Vec<T>,
    head: usize,
}

impl<T: Sample> DelayLine<T> {
    /// `len` must be at least one.
    pub fn new(len: usize) -> Self {
        assert!(len >= 1, "delay line must hold at least one sample");
        Self {
            buf: vec![T::default(); len],
            head: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn push(&mut self, sample: T) {
        self.buf[self.head] = sample;
        self.head += 1;
        if self.head == self.buf.len() {
            self.head = 0;
        }
    }

    /// Iterate from the most recently pushed sample back to the oldest.
    #[inline]
    pub fn newest_to_oldest(&self) -> impl Iterator<Item = &T> + '_ {
        let newest = if self.head == 0 {
            self.buf.len() - 1
        } else {
            self.head - 1
        };
        self.buf[..=newest]
            .iter()
            .rev()
            .chain(self.buf[newest + 1..].iter().rev())
    }

    /// Inner product of `coeffs` (first to last) with the history
    /// (newest to oldest).
    #[inline]
    pub fn convolve(&self, coeffs: &[f32]) -> T {
        coeffs
            .iter()
            .zip(self.newest_to_oldest())
            .fold(T::default(), |acc, (&c, &x)| acc + x * c)
    }

    pub fn reset(&mut self) {
        self.buf.fill(T::default());
        self.head = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::DelayLine;

    #[test]
    fn walks_newest_first_across_wrap() {
        let mut line = DelayLine::<f32>::new(4);
        for v in 1..=6 {
            line.push(v as f32);
        }
        let order: Vec<f32> = line.newest_to_oldest().copied().collect();
        assert_eq!(order, vec![6.0, 5.0, 4.0, 3.0]);
    }

    #[test]
    fn convolve_weights_newest_with_first_coeff() {
        let mut line = DelayLine::<f32>::new(3);
        line.push(1.0);
        line.push(10.0);
        line.push(100.0);
        assert_eq!(line.convolve(&[1.0, 0.0, 0.0]), 100.0);
        assert_eq!(line.convolve(&[0.0, 0.0, 1.0]), 1.0);
    }

    #[test]
    fn reset_clears_history() {
        let mut line = DelayLine::<f32>::new(2);
        line.push(3.0);
        line.reset();
        assert!(line.newest_to_oldest().all(|&v| v == 0.0));
    }
}
