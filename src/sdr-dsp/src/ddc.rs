// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Digital down-conversion: complex mix to baseband, anti-alias lowpass
//! and fractional-rate decimation.

use num_complex::Complex;

use crate::buffer::FlushBuffer;
use crate::filter::design::Window;
use crate::filter::fir::Fir;
use crate::oscillator::Oscillator;

/// Headroom applied on top of the Nyquist rate of the passband.
const OVERSAMPLE: f32 = 1.25;
/// Floor for the derived output rate.
const MIN_OUT_RATE: f32 = 1_000.0;
/// Smallest anti-alias cutoff, used for degenerate zero-width passbands.
const MIN_CUTOFF_HZ: f32 = 1.0;

/// Anti-alias FIR followed by an accumulator-driven sample picker.
///
/// Every input sample goes into the delay line; the convolution is only
/// computed when the accumulator crosses zero, which happens on average
/// `ratio` times per input sample for any `out_rate <= in_rate`.
#[derive(Debug, Clone)]
pub struct Decimator {
    fir: Fir<Complex<f32>>,
    ratio: f32,
    acc: f32,
}

impl Decimator {
    pub fn new(taps: usize, in_rate: f32, out_rate: f32, cutoff_hz: f32, window: Window) -> Self {
        let ratio = if in_rate > 0.0 {
            (out_rate / in_rate).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let cutoff = cutoff_hz.clamp(MIN_CUTOFF_HZ, (in_rate * 0.5).max(MIN_CUTOFF_HZ));
        Self {
            fir: Fir::lowpass(taps, cutoff, in_rate, window),
            ratio,
            acc: 0.0,
        }
    }

    /// Output samples per input sample.
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn taps(&self) -> usize {
        self.fir.len()
    }

    /// Push one input sample; returns a filtered output sample when the
    /// accumulator fires.
    #[inline]
    pub fn step(&mut self, sample: Complex<f32>) -> Option<Complex<f32>> {
        self.fir.push(sample);
        self.acc += self.ratio;
        if self.acc > 0.0 {
            self.acc -= 1.0;
            Some(self.fir.convolve())
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.fir.reset();
        self.acc = 0.0;
    }
}

/// Down-converter for one narrow channel of a wide-band IQ stream.
///
/// The VFO offset is relative to the device centre frequency. The
/// passband edges are relative to the VFO and may be asymmetric; the
/// stream is mixed to the passband centre, filtered to half the passband
/// width, decimated and finally rotated back so the VFO sits at DC.
#[derive(Debug, Clone)]
pub struct Ddc {
    taps: usize,
    window: Window,
    in_rate: f32,
    out_rate: f32,
    vfo: f32,
    pb_lo: f32,
    pb_hi: f32,
    mixer: Oscillator,
    restore: Oscillator,
    decimator: Decimator,
    out: FlushBuffer<Complex<f32>>,
}

impl Ddc {
    pub fn new(taps: usize, vfo: f32, pb_lo: f32, pb_hi: f32, in_rate: f32, block_size: usize) -> Self {
        let (pb_lo, pb_hi) = ordered(pb_lo, pb_hi);
        let out_rate = derive_out_rate(pb_lo, pb_hi, in_rate);
        let centre = (pb_lo + pb_hi) * 0.5;
        let window = Window::default();
        Self {
            taps,
            window,
            in_rate,
            out_rate,
            vfo,
            pb_lo,
            pb_hi,
            mixer: Oscillator::new(-(vfo + centre), in_rate),
            restore: Oscillator::new(centre, out_rate),
            decimator: Decimator::new(taps, in_rate, out_rate, (pb_hi - pb_lo) * 0.5, window),
            out: FlushBuffer::new(block_size),
        }
    }

    /// Retune VFO and passband in place. Phase of the mixer is kept; the
    /// anti-alias filter is only redesigned when the passband changed.
    pub fn set_freqs(&mut self, vfo: f32, pb_lo: f32, pb_hi: f32) {
        let (pb_lo, pb_hi) = ordered(pb_lo, pb_hi);
        let passband_changed = pb_lo != self.pb_lo || pb_hi != self.pb_hi;
        self.vfo = vfo;
        self.pb_lo = pb_lo;
        self.pb_hi = pb_hi;
        if passband_changed {
            self.redesign();
        }
        self.mixer.set_frequency(-(self.vfo + self.centre()));
    }

    /// Follow a device sample-rate change.
    pub fn set_in_rate(&mut self, in_rate: f32) {
        if in_rate == self.in_rate {
            return;
        }
        self.in_rate = in_rate;
        self.mixer.set_sample_rate(in_rate);
        self.redesign();
    }

    fn redesign(&mut self) {
        let out_rate = derive_out_rate(self.pb_lo, self.pb_hi, self.in_rate);
        if out_rate != self.out_rate {
            // A block never mixes samples taken at two rates.
            self.out.clear();
            self.out_rate = out_rate;
        }
        self.decimator = Decimator::new(
            self.taps,
            self.in_rate,
            self.out_rate,
            (self.pb_hi - self.pb_lo) * 0.5,
            self.window,
        );
        self.restore.set_sample_rate(self.out_rate);
        self.restore.set_frequency(self.centre());
        self.mixer.set_frequency(-(self.vfo + self.centre()));
        tracing::debug!(
            "DDC redesigned: {} -> {} Hz, passband {}..{} Hz",
            self.in_rate,
            self.out_rate,
            self.pb_lo,
            self.pb_hi
        );
    }

    fn centre(&self) -> f32 {
        (self.pb_lo + self.pb_hi) * 0.5
    }

    pub fn in_rate(&self) -> f32 {
        self.in_rate
    }

    pub fn out_rate(&self) -> f32 {
        self.out_rate
    }

    pub fn ratio(&self) -> f32 {
        self.decimator.ratio()
    }

    pub fn vfo(&self) -> f32 {
        self.vfo
    }

    pub fn passband_lo(&self) -> f32 {
        self.pb_lo
    }

    pub fn passband_hi(&self) -> f32 {
        self.pb_hi
    }

    pub fn update<F: FnMut(&[Complex<f32>])>(&mut self, samples: &[Complex<f32>], flush: &mut F) {
        for &s in samples {
            let mixed = self.mixer.update(s);
            if let Some(y) = self.decimator.step(mixed) {
                let y = self.restore.update(y);
                self.out.push(y, flush);
            }
        }
    }
}

fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn derive_out_rate(pb_lo: f32, pb_hi: f32, in_rate: f32) -> f32 {
    let edge = pb_lo.abs().max(pb_hi.abs());
    let rate = (2.0 * edge * OVERSAMPLE).max(MIN_OUT_RATE);
    if in_rate > 0.0 {
        rate.min(in_rate)
    } else {
        rate
    }
}
