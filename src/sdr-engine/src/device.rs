// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receiver hardware abstraction.

#[cfg(feature = "soapysdr")]
pub mod soapy;
pub mod synthetic;

use num_complex::Complex;

use crate::error::DeviceError;

#[cfg(feature = "soapysdr")]
pub use soapy::SoapyDevice;
pub use synthetic::{SyntheticDevice, DEFAULT_QUEUE_CAPACITY};

/// An IQ source the engine can open, read and tune.
///
/// All methods take `&self`: the reader thread reads while control calls
/// arrive from other threads, so implementations do their own locking.
/// `close` must also release a reader blocked inside `read`.
pub trait Device: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self) -> Result<(), DeviceError>;

    fn close(&self);

    fn is_open(&self) -> bool;

    /// Copy captured samples into `buf`. Returns 0 when nothing is ready
    /// or the device has been closed; that is never an error.
    fn read(&self, buf: &mut [Complex<f32>]) -> usize;

    /// RF gain normalized to 0..1 of the device's native range.
    fn set_gain(&self, gain: f32) -> Result<(), DeviceError>;

    fn gain(&self) -> f32;

    fn set_sample_rate(&self, rate_hz: f64) -> Result<(), DeviceError>;

    fn sample_rate(&self) -> f64;

    fn set_center_frequency(&self, freq_hz: f64) -> Result<(), DeviceError>;

    fn center_frequency(&self) -> f64;
}
