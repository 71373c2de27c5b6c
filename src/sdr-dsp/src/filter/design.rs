// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Window-method FIR coefficient design.
//!
//! Lowpass prototypes are ideal sinc responses around the centre tap,
//! multiplied by a window and scaled to unity DC gain.  Highpass and
//! bandpass responses are built from those normalized prototypes, so each
//! design has unity gain in its pass-band.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Taper applied to a truncated sinc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    None,
    #[default]
    Hamming,
    Hann,
    Blackman,
}

impl Window {
    /// Window value at tap `i` of `size`.
    pub fn value(self, i: usize, size: usize) -> f32 {
        if size <= 1 {
            return 1.0;
        }
        let x = 2.0 * PI * i as f64 / (size - 1) as f64;
        let w = match self {
            Window::None => 1.0,
            Window::Hamming => 0.54 - 0.46 * x.cos(),
            Window::Hann => 0.5 - 0.5 * x.cos(),
            Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
        };
        w as f32
    }
}

fn windowize(coeffs: &mut [f32], window: Window) {
    let size = coeffs.len();
    for (i, c) in coeffs.iter_mut().enumerate() {
        *c *= window.value(i, size);
    }
}

/// Scale so the coefficients sum to one.
fn normalize(coeffs: &mut [f32]) {
    let sum: f32 = coeffs.iter().sum();
    if sum.abs() > 1e-12 {
        let scale = 1.0 / sum;
        for c in coeffs.iter_mut() {
            *c *= scale;
        }
    }
}

fn sinc_lowpass(size: usize, cutoff_hz: f32, sample_rate: f32) -> Vec<f32> {
    let omega = 2.0 * PI * cutoff_hz as f64 / sample_rate as f64;
    let center = (size as i64 - 1) / 2;
    (0..size)
        .map(|idx| {
            let k = idx as i64 - center;
            let c = if k == 0 {
                omega / PI
            } else {
                (omega * k as f64).sin() / (PI * k as f64)
            };
            c as f32
        })
        .collect()
}

/// Windowed-sinc lowpass with unity DC gain.
pub fn lowpass(size: usize, cutoff_hz: f32, sample_rate: f32, window: Window) -> Vec<f32> {
    let mut coeffs = sinc_lowpass(size, cutoff_hz, sample_rate);
    windowize(&mut coeffs, window);
    normalize(&mut coeffs);
    coeffs
}

/// Spectral inversion of [`lowpass`]: unit impulse at the centre tap minus
/// the lowpass response.  An odd `size` gives a symmetric result.
pub fn highpass(size: usize, cutoff_hz: f32, sample_rate: f32, window: Window) -> Vec<f32> {
    let mut coeffs = lowpass(size, cutoff_hz, sample_rate, window);
    let center = (size.max(1) - 1) / 2;
    for (i, c) in coeffs.iter_mut().enumerate() {
        *c = if i == center { 1.0 - *c } else { -*c };
    }
    coeffs
}

/// Difference of the lowpass designs at the two band edges.
pub fn bandpass(
    size: usize,
    lo_hz: f32,
    hi_hz: f32,
    sample_rate: f32,
    window: Window,
) -> Vec<f32> {
    let (lo_hz, hi_hz) = if lo_hz <= hi_hz {
        (lo_hz, hi_hz)
    } else {
        (hi_hz, lo_hz)
    };
    let upper = lowpass(size, hi_hz, sample_rate, window);
    let lower = lowpass(size, lo_hz, sample_rate, window);
    upper.iter().zip(lower.iter()).map(|(u, l)| u - l).collect()
}

/// Windowed Hilbert transformer: `2 / (pi k)` on odd offsets from the
/// centre tap, zero elsewhere.  Delay is `(size - 1) / 2` samples.
pub fn hilbert(size: usize, window: Window) -> Vec<f32> {
    let center = (size as i64 - 1) / 2;
    let mut coeffs: Vec<f32> = (0..size)
        .map(|idx| {
            let k = idx as i64 - center;
            if k % 2 == 0 {
                0.0
            } else {
                (2.0 / (PI * k as f64)) as f32
            }
        })
        .collect();
    windowize(&mut coeffs, window);
    coeffs
}

/// Pure delay of `(size - 1) / 2` samples, aligned with [`hilbert`].
pub fn delay(size: usize) -> Vec<f32> {
    let mut coeffs = vec![0.0; size];
    if size > 0 {
        coeffs[(size - 1) / 2] = 1.0;
    }
    coeffs
}
