// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

use crate::filter::design::{self, Window};
use crate::filter::fir::Fir;

/// Hilbert transformer length; odd so the delay is a whole number of samples.
const HILBERT_TAPS: usize = 65;

/// Which sideband the phasing detector keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sideband {
    Lower,
    Upper,
}

/// Phasing-method single-sideband detector.
///
/// I is delayed to match the group delay of the Hilbert-transformed Q; the
/// sum or difference cancels the unwanted sideband.
#[derive(Debug, Clone)]
pub(crate) struct SsbDetector {
    sideband: Sideband,
    hilbert: Fir<f32>,
    delay: Fir<f32>,
}

impl SsbDetector {
    pub(crate) fn new(sideband: Sideband) -> Self {
        Self {
            sideband,
            hilbert: Fir::from_coeffs(design::hilbert(HILBERT_TAPS, Window::Hamming)),
            delay: Fir::from_coeffs(design::delay(HILBERT_TAPS)),
        }
    }

    #[inline]
    pub(crate) fn process(&mut self, sample: Complex<f32>) -> f32 {
        let i = self.delay.update(sample.re);
        let q = self.hilbert.update(sample.im);
        match self.sideband {
            Sideband::Upper => 0.5 * (i - q),
            Sideband::Lower => 0.5 * (i + q),
        }
    }
}
