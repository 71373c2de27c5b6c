// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

/// Pole radius of the carrier-removal high-pass.
const DC_POLE: f32 = 0.9999;

/// One-pole DC blocker: `y[n] = x[n] - x[n-1] + r * y[n-1]`.
#[derive(Debug, Clone)]
pub(crate) struct DcBlocker {
    r: f32,
    x1: f32,
    y1: f32,
}

impl DcBlocker {
    pub(crate) fn new(r: f32) -> Self {
        Self {
            r: r.clamp(0.9, 0.9999),
            x1: 0.0,
            y1: 0.0,
        }
    }

    #[inline]
    pub(crate) fn process(&mut self, x: f32) -> f32 {
        let y = x - self.x1 + self.r * self.y1;
        self.x1 = x;
        self.y1 = y;
        y
    }
}

/// Envelope detector with the carrier level removed.
#[derive(Debug, Clone)]
pub(crate) struct AmDetector {
    dc: DcBlocker,
}

impl AmDetector {
    pub(crate) fn new() -> Self {
        Self {
            dc: DcBlocker::new(DC_POLE),
        }
    }

    #[inline]
    pub(crate) fn process(&mut self, sample: Complex<f32>) -> f32 {
        self.dc.process(sample.norm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn assert_approx_eq(a: f32, b: f32, tol: f32, label: &str) {
        assert!(
            (a - b).abs() <= tol,
            "{}: expected {} ~= {} (tol {})",
            label,
            a,
            b,
            tol
        );
    }

    #[test]
    fn steady_carrier_settles_to_zero() {
        let mut am = AmDetector::new();
        let mut last = 1.0;
        for _ in 0..200_000 {
            last = am.process(Complex::new(0.6, 0.8));
        }
        assert_approx_eq(last, 0.0, 1e-3, "carrier residue");
    }

    #[test]
    fn recovers_modulating_tone() {
        let rate = 8_000.0;
        let tone = 500.0;
        let mut am = AmDetector::new();
        let n = 80_000;
        let mut peak = 0.0_f32;
        for i in 0..n {
            let t = i as f32 / rate;
            let env = 1.0 + 0.5 * (TAU * tone * t).cos();
            // carrier phase must not leak into the envelope
            let s = Complex::from_polar(env, 1.3 * i as f32);
            let y = am.process(s);
            if i > n - 1_000 {
                peak = peak.max(y.abs());
            }
        }
        assert_approx_eq(peak, 0.5, 0.02, "AM tone amplitude");
    }

    #[test]
    fn dc_blocker_clamps_pole() {
        let blk = DcBlocker::new(2.0);
        assert_approx_eq(blk.r, 0.9999, 0.0, "pole");
    }
}
