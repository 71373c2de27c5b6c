// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::ops::{Add, Mul};
use std::sync::Arc;

use num_complex::Complex;

use super::delay_line::DelayLine;
use super::design::{self, Window};

/// Sample types a filter can run over: real or complex single precision.
pub trait Sample:
    Copy + Default + Add<Output = Self> + Mul<f32, Output = Self> + Send + 'static
{
}

impl Sample for f32 {}
impl Sample for Complex<f32> {}

/// FIR filter over a circular delay line.
///
/// Coefficients are immutable once designed and may be shared between a
/// real and a complex instance via [`Fir::share`].
#[derive(Debug, Clone)]
pub struct Fir<T> {
    coeffs: Arc<[f32]>,
    line: DelayLine<T>,
}

impl<T: Sample> Fir<T> {
    /// All-zero filter of `size` taps.
    pub fn new(size: usize) -> Self {
        Self::from_coeffs(vec![0.0; size])
    }

    pub fn from_coeffs(coeffs: Vec<f32>) -> Self {
        let line = DelayLine::new(coeffs.len());
        Self {
            coeffs: coeffs.into(),
            line,
        }
    }

    pub fn lowpass(size: usize, cutoff_hz: f32, sample_rate: f32, window: Window) -> Self {
        Self::from_coeffs(design::lowpass(size, cutoff_hz, sample_rate, window))
    }

    pub fn highpass(size: usize, cutoff_hz: f32, sample_rate: f32, window: Window) -> Self {
        Self::from_coeffs(design::highpass(size, cutoff_hz, sample_rate, window))
    }

    pub fn bandpass(
        size: usize,
        lo_hz: f32,
        hi_hz: f32,
        sample_rate: f32,
        window: Window,
    ) -> Self {
        Self::from_coeffs(design::bandpass(size, lo_hz, hi_hz, sample_rate, window))
    }

    /// A fresh filter over another sample type with the same coefficients.
    pub fn share<U: Sample>(&self) -> Fir<U> {
        Fir {
            coeffs: Arc::clone(&self.coeffs),
            line: DelayLine::new(self.coeffs.len()),
        }
    }

    pub fn coeffs(&self) -> &[f32] {
        &self.coeffs
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Store a sample without computing an output.
    #[inline]
    pub fn push(&mut self, sample: T) {
        self.line.push(sample);
    }

    /// Output for the current delay-line contents.
    #[inline]
    pub fn convolve(&self) -> T {
        self.line.convolve(&self.coeffs)
    }

    #[inline]
    pub fn update(&mut self, sample: T) -> T {
        self.push(sample);
        self.convolve()
    }

    pub fn reset(&mut self) {
        self.line.reset();
    }
}
