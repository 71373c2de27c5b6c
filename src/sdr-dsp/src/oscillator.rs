// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Rotating-phasor oscillator used for complex mixing.

use num_complex::Complex;

/// Updates between magnitude corrections of the running phasor.
const RENORM_INTERVAL: u32 = 1024;

/// Complex oscillator: a unit phasor rotated by a fixed increment per sample.
///
/// Retuning only replaces the increment, so the phase stays continuous.
#[derive(Debug, Clone)]
pub struct Oscillator {
    phase: Complex<f32>,
    rotation: Complex<f32>,
    frequency: f32,
    sample_rate: f32,
    since_renorm: u32,
}

impl Oscillator {
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        let mut osc = Self {
            phase: Complex::new(1.0, 0.0),
            rotation: Complex::new(1.0, 0.0),
            frequency,
            sample_rate,
            since_renorm: 0,
        };
        osc.set_frequency(frequency);
        osc
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
        self.rotation = if self.sample_rate > 0.0 {
            let angle = std::f64::consts::TAU * frequency as f64 / self.sample_rate as f64;
            Complex::new(angle.cos() as f32, angle.sin() as f32)
        } else {
            Complex::new(1.0, 0.0)
        };
    }

    /// Change the rate the increment is computed against, keeping the
    /// configured frequency.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.set_frequency(self.frequency);
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Current phasor value.
    pub fn phase(&self) -> Complex<f32> {
        self.phase
    }

    /// Advance the phasor one step and mix `sample` with it.
    #[inline]
    pub fn update(&mut self, sample: Complex<f32>) -> Complex<f32> {
        self.phase *= self.rotation;
        self.since_renorm += 1;
        if self.since_renorm >= RENORM_INTERVAL {
            self.since_renorm = 0;
            let norm = self.phase.norm();
            if norm > 0.0 {
                self.phase /= norm;
            }
        }
        sample * self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::Oscillator;
    use num_complex::Complex;
    use std::f32::consts::{PI, TAU};

    fn wrap(angle: f32) -> f32 {
        let mut a = angle % TAU;
        if a > PI {
            a -= TAU;
        } else if a < -PI {
            a += TAU;
        }
        a
    }

    #[test]
    fn phase_tracks_expected_angle() {
        let freq = 1_234.0;
        let rate = 48_000.0;
        let mut osc = Oscillator::new(freq, rate);
        let one = Complex::new(1.0_f32, 0.0);
        let n = 500;
        let mut out = one;
        for _ in 0..n {
            out = osc.update(one);
        }
        let expected = wrap(n as f32 * TAU * freq / rate);
        let err = wrap(out.arg() - expected);
        assert!(err.abs() < 1e-3, "phase error {}", err);
    }

    #[test]
    fn magnitude_stays_near_unity() {
        let mut osc = Oscillator::new(-7_000.0, 2_048_000.0);
        let one = Complex::new(1.0_f32, 0.0);
        for n in 0..100_000 {
            let out = osc.update(one);
            assert!((out.norm() - 1.0).abs() < 1e-3, "drift at {}: {}", n, out.norm());
        }
    }

    #[test]
    fn retune_keeps_phase() {
        let mut osc = Oscillator::new(1_000.0, 8_000.0);
        let one = Complex::new(1.0_f32, 0.0);
        for _ in 0..3 {
            osc.update(one);
        }
        let before = osc.phase();
        osc.set_frequency(2_000.0);
        assert_eq!(osc.phase(), before);
        let after = osc.update(one);
        // 2 kHz at 8 kHz is a quarter turn per sample.
        let step = (after * before.conj()).arg();
        assert!((step - PI / 2.0).abs() < 1e-4, "step {}", step);
    }

    #[test]
    fn zero_rate_is_stationary() {
        let mut osc = Oscillator::new(100.0, 0.0);
        let s = Complex::new(0.5_f32, -0.25);
        assert_eq!(osc.update(s), s);
    }
}
