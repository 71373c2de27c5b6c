// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Streaming DSP primitives for a single receive chain: oscillator,
//! FIR/biquad filters, decimating down-converter, demodulators and
//! resampler.  Every stage is single-threaded and flushes fixed-size
//! output blocks through a caller-supplied closure.

pub mod buffer;
pub mod ddc;
pub mod demod;
pub mod filter;
pub mod oscillator;
pub mod resampler;

pub use buffer::FlushBuffer;
pub use ddc::{Ddc, Decimator};
pub use demod::{DemodBank, Demodulator, Mode, UnknownMode};
pub use filter::biquad::{Biquad, BiquadKind};
pub use filter::delay_line::DelayLine;
pub use filter::design::Window;
pub use filter::fir::{Fir, Sample};
pub use oscillator::Oscillator;
pub use resampler::Resampler;

pub use num_complex::Complex;
