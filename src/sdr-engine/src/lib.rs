// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receive-chain orchestrator.
//!
//! [`SdrEngine`] owns a reader thread that pulls IQ chunks from a
//! [`Device`] and fans each chunk out to the spectrum stage and the
//! DDC -> demodulator -> resampler chain, whose output reaches the audio
//! sink, an optional encoder and any PCM subscribers.

pub mod audio;
pub mod config;
pub mod device;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod queue;
pub mod spectrum;

pub use audio::{AudioOutput, AudioPlayback, AudioSink};
#[cfg(feature = "cpal")]
pub use audio::CpalPlayback;
pub use config::EngineConfig;
#[cfg(feature = "soapysdr")]
pub use device::SoapyDevice;
pub use device::{Device, SyntheticDevice};
pub use encoder::{Encoder, Pcm16Encoder};
pub use engine::{EngineBuilder, EngineState, SdrEngine};
pub use error::{DeviceError, EngineError, EngineResult};
pub use queue::{BlockingQueue, DroppingQueue};
pub use spectrum::Spectrum;

pub use sdr_dsp::Mode;
