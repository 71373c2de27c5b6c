// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Arbitrary-ratio polyphase resampler for real audio.
//!
//! Same accumulator scheme as the decimator, generalised to both
//! directions: a fractional read position advances by `in_rate / out_rate`
//! per output sample and every time it passes a whole input sample the
//! next input is consumed. The fractional part selects one of
//! `PHASES + 1` precomputed windowed-sinc kernels.

use crate::buffer::FlushBuffer;
use crate::filter::delay_line::DelayLine;

/// Sub-sample positions in the kernel bank.
const PHASES: usize = 32;
/// Kernel cutoff relative to the lower of the two Nyquist rates.
const CUTOFF: f64 = 0.94;
pub const DEFAULT_TAPS: usize = 16;

#[derive(Debug, Clone)]
pub struct Resampler {
    taps: usize,
    in_rate: f32,
    out_rate: f32,
    step: f64,
    /// `PHASES + 1` kernels, each stored newest-input-first.
    bank: Vec<Vec<f32>>,
    line: DelayLine<f32>,
    phase: f64,
    out: FlushBuffer<f32>,
}

impl Resampler {
    pub fn new(taps: usize, in_rate: f32, out_rate: f32, block_size: usize) -> Self {
        let taps = taps.max(2);
        let mut rs = Self {
            taps,
            in_rate,
            out_rate,
            step: 1.0,
            bank: Vec::new(),
            line: DelayLine::new(taps),
            phase: 0.0,
            out: FlushBuffer::new(block_size),
        };
        rs.rebuild();
        rs
    }

    /// Must follow every change of the upstream rate.
    pub fn set_in_rate(&mut self, in_rate: f32) {
        if in_rate != self.in_rate {
            self.in_rate = in_rate;
            self.rebuild();
        }
    }

    pub fn set_out_rate(&mut self, out_rate: f32) {
        if out_rate != self.out_rate {
            self.out_rate = out_rate;
            self.rebuild();
        }
    }

    pub fn in_rate(&self) -> f32 {
        self.in_rate
    }

    pub fn out_rate(&self) -> f32 {
        self.out_rate
    }

    pub fn taps(&self) -> usize {
        self.taps
    }

    fn rebuild(&mut self) {
        if self.in_rate > 0.0 && self.out_rate > 0.0 {
            self.step = self.in_rate as f64 / self.out_rate as f64;
        } else {
            self.step = 1.0;
        }
        let ratio = (1.0 / self.step).min(1.0);
        self.bank = build_bank(self.taps, CUTOFF * ratio);
        tracing::trace!("resampler {} -> {} Hz", self.in_rate, self.out_rate);
    }

    pub fn update<F: FnMut(&[f32])>(&mut self, samples: &[f32], flush: &mut F) {
        for &s in samples {
            self.line.push(s);
            while self.phase < 1.0 {
                let idx = (self.phase * PHASES as f64).round() as usize;
                let kernel = &self.bank[idx.min(PHASES)];
                let y = self.line.convolve(kernel);
                self.out.push(y, flush);
                self.phase += self.step;
            }
            self.phase -= 1.0;
        }
    }
}

/// Hann-windowed sinc kernels. Kernel `p` interpolates at `p / PHASES` of
/// a sample past the centre of the delay line; each sums to one.
fn build_bank(taps: usize, cutoff: f64) -> Vec<Vec<f32>> {
    use std::f64::consts::PI;

    let half = taps as f64 / 2.0;
    let centre = taps / 2;
    (0..=PHASES)
        .map(|p| {
            let frac = p as f64 / PHASES as f64;
            let mut kernel: Vec<f64> = (0..taps)
                .map(|j| {
                    let t = j as f64 - centre as f64 + frac;
                    let x = PI * cutoff * t;
                    let sinc = if x.abs() < 1e-12 { 1.0 } else { x.sin() / x };
                    let window = if t.abs() >= half {
                        0.0
                    } else {
                        0.5 + 0.5 * (PI * t / half).cos()
                    };
                    sinc * window
                })
                .collect();
            let sum: f64 = kernel.iter().sum();
            if sum.abs() > 1e-12 {
                kernel.iter_mut().for_each(|c| *c /= sum);
            }
            kernel.into_iter().map(|c| c as f32).collect()
        })
        .collect()
}
