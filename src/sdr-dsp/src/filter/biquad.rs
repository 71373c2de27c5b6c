// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

/// Q used when the caller passes zero (Butterworth).
pub const DEFAULT_Q: f32 = 0.707;

/// Response shape of a [`Biquad`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadKind {
    LowPass,
    HighPass,
    /// Constant 0 dB peak gain at the centre frequency.
    BandPass,
    Notch,
}

/// 2nd-order IIR section (RBJ cookbook), coefficients pre-divided by `a0`.
///
/// Real and complex histories are kept separately so one instance can
/// filter either kind of stream.
#[derive(Debug, Clone)]
pub struct Biquad {
    kind: BiquadKind,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
    cx1: Complex<f32>,
    cx2: Complex<f32>,
    cy1: Complex<f32>,
    cy2: Complex<f32>,
}

impl Biquad {
    pub fn new(kind: BiquadKind, frequency: f32, sample_rate: f32, q: f32) -> Self {
        let q = if q == 0.0 { DEFAULT_Q } else { q };
        let w0 = 2.0 * std::f32::consts::PI * frequency / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a0_inv = 1.0 / (1.0 + alpha);

        let (b0, b1, b2) = match kind {
            BiquadKind::LowPass => {
                let b = (1.0 - cos_w0) * 0.5;
                (b, 1.0 - cos_w0, b)
            }
            BiquadKind::HighPass => {
                let b = (1.0 + cos_w0) * 0.5;
                (b, -(1.0 + cos_w0), b)
            }
            BiquadKind::BandPass => (alpha, 0.0, -alpha),
            BiquadKind::Notch => (1.0, -2.0 * cos_w0, 1.0),
        };

        Self {
            kind,
            b0: b0 * a0_inv,
            b1: b1 * a0_inv,
            b2: b2 * a0_inv,
            a1: -2.0 * cos_w0 * a0_inv,
            a2: (1.0 - alpha) * a0_inv,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
            cx1: Complex::default(),
            cx2: Complex::default(),
            cy1: Complex::default(),
            cy2: Complex::default(),
        }
    }

    pub fn lowpass(frequency: f32, sample_rate: f32, q: f32) -> Self {
        Self::new(BiquadKind::LowPass, frequency, sample_rate, q)
    }

    pub fn highpass(frequency: f32, sample_rate: f32, q: f32) -> Self {
        Self::new(BiquadKind::HighPass, frequency, sample_rate, q)
    }

    pub fn bandpass(frequency: f32, sample_rate: f32, q: f32) -> Self {
        Self::new(BiquadKind::BandPass, frequency, sample_rate, q)
    }

    pub fn notch(frequency: f32, sample_rate: f32, q: f32) -> Self {
        Self::new(BiquadKind::Notch, frequency, sample_rate, q)
    }

    pub fn kind(&self) -> BiquadKind {
        self.kind
    }

    #[inline]
    pub fn update(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    #[inline]
    pub fn update_complex(&mut self, x: Complex<f32>) -> Complex<f32> {
        let y = x * self.b0 + self.cx1 * self.b1 + self.cx2 * self.b2
            - self.cy1 * self.a1
            - self.cy2 * self.a2;
        self.cx2 = self.cx1;
        self.cx1 = x;
        self.cy2 = self.cy1;
        self.cy1 = y;
        y
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
        self.cx1 = Complex::default();
        self.cx2 = Complex::default();
        self.cy1 = Complex::default();
        self.cy2 = Complex::default();
    }
}
