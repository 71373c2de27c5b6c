// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Baseband demodulators.
//!
//! Every mode shares one contract: complex samples in, real audio blocks
//! out through a flush closure. [`DemodBank`] keeps one instance per mode
//! so switching away and back resumes the earlier state.

mod am;
mod fm;
mod ssb;

use std::fmt;
use std::str::FromStr;

use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::buffer::FlushBuffer;
use am::AmDetector;
use fm::FmDiscriminator;
use ssb::{Sideband, SsbDetector};

/// Demodulation mode. Discriminants are the stable numeric ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Null = 0,
    Am = 1,
    #[default]
    Fm = 2,
    Lsb = 3,
    Usb = 4,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Null, Mode::Am, Mode::Fm, Mode::Lsb, Mode::Usb];

    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Null => "NULL",
            Mode::Am => "AM",
            Mode::Fm => "FM",
            Mode::Lsb => "LSB",
            Mode::Usb => "USB",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unhandled mode: {0}")]
pub struct UnknownMode(pub String);

impl TryFrom<i32> for Mode {
    type Error = UnknownMode;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        Mode::ALL
            .into_iter()
            .find(|m| m.id() == id)
            .ok_or_else(|| UnknownMode(id.to_string()))
    }
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

#[derive(Debug, Clone)]
enum Detector {
    Null,
    Am(AmDetector),
    Fm(FmDiscriminator),
    Lsb(SsbDetector),
    Usb(SsbDetector),
}

impl Detector {
    fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Null => Detector::Null,
            Mode::Am => Detector::Am(AmDetector::new()),
            Mode::Fm => Detector::Fm(FmDiscriminator::new()),
            Mode::Lsb => Detector::Lsb(SsbDetector::new(Sideband::Lower)),
            Mode::Usb => Detector::Usb(SsbDetector::new(Sideband::Upper)),
        }
    }

    #[inline]
    fn process(&mut self, sample: Complex<f32>) -> f32 {
        match self {
            Detector::Null => sample.re,
            Detector::Am(d) => d.process(sample),
            Detector::Fm(d) => d.process(sample),
            Detector::Lsb(d) | Detector::Usb(d) => d.process(sample),
        }
    }
}

/// One demodulator instance with its own output block.
#[derive(Debug, Clone)]
pub struct Demodulator {
    mode: Mode,
    detector: Detector,
    out: FlushBuffer<f32>,
}

impl Demodulator {
    pub fn new(mode: Mode, block_size: usize) -> Self {
        Self {
            mode,
            detector: Detector::for_mode(mode),
            out: FlushBuffer::new(block_size),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn update<F: FnMut(&[f32])>(&mut self, samples: &[Complex<f32>], flush: &mut F) {
        for &s in samples {
            let y = self.detector.process(s);
            self.out.push(y, flush);
        }
    }
}

/// Pre-built demodulators for every [`Mode`] plus the active selection.
#[derive(Debug, Clone)]
pub struct DemodBank {
    demods: Vec<Demodulator>,
    active: Mode,
}

impl DemodBank {
    pub fn new(active: Mode, block_size: usize) -> Self {
        Self {
            demods: Mode::ALL
                .iter()
                .map(|&m| Demodulator::new(m, block_size))
                .collect(),
            active,
        }
    }

    pub fn mode(&self) -> Mode {
        self.active
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.active = mode;
    }

    pub fn update<F: FnMut(&[f32])>(&mut self, samples: &[Complex<f32>], flush: &mut F) {
        // Mode::ALL order matches the discriminants.
        if let Some(demod) = self.demods.get_mut(self.active.id() as usize) {
            demod.update(samples, flush);
        }
    }
}
