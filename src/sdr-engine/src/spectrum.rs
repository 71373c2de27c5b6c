// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f32::consts::PI;
use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Power spectrum of raw IQ chunks.
///
/// Each chunk contributes its first `fft_size` samples (zero padded when
/// shorter), Hann windowed. Bins are FFT-shifted so DC sits in the middle
/// and reported in dB relative to full scale.
pub struct Spectrum {
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    bins: Vec<f32>,
}

impl Spectrum {
    pub fn new(fft_size: usize) -> Self {
        let size = fft_size.max(2);
        let window: Vec<f32> = (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (size - 1) as f32).cos()))
            .collect();
        let fft = FftPlanner::<f32>::new().plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            window,
            fft,
            buf: vec![Complex::new(0.0, 0.0); size],
            scratch,
            bins: vec![0.0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.window.len()
    }

    pub fn update<F: FnMut(&[f32])>(&mut self, samples: &[Complex<f32>], emit: &mut F) {
        let size = self.size();
        let take = samples.len().min(size);
        for (i, slot) in self.buf.iter_mut().enumerate() {
            *slot = if i < take {
                samples[i] * self.window[i]
            } else {
                Complex::new(0.0, 0.0)
            };
        }
        self.fft.process_with_scratch(&mut self.buf, &mut self.scratch);

        // Coherent gain of the Hann window is 1/2.
        let norm = 2.0 / size as f32;
        let half = size / 2;
        let shifted = self.buf[half..].iter().chain(self.buf[..half].iter());
        for (bin, value) in self.bins.iter_mut().zip(shifted) {
            let mag = value.norm() * norm;
            *bin = 20.0 * mag.max(1e-10_f32).log10();
        }
        emit(&self.bins);
    }
}
