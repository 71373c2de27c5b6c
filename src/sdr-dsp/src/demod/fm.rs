// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

/// Quadrature discriminator: `arg(s[n] * conj(s[n-1])) / pi`.
///
/// Output is in [-1, 1], with 1 meaning a phase step of half the sample
/// rate. The first sample after construction yields 0.
#[derive(Debug, Clone, Default)]
pub(crate) struct FmDiscriminator {
    prev: Option<Complex<f32>>,
}

impl FmDiscriminator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn process(&mut self, sample: Complex<f32>) -> f32 {
        let out = match self.prev {
            Some(prev) => (sample * prev.conj()).arg() * std::f32::consts::FRAC_1_PI,
            None => 0.0,
        };
        self.prev = Some(sample);
        out
    }
}
