// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

/// Failure reported by a [`crate::Device`] implementation.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device is not open")]
    NotOpen,

    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no device available")]
    NoDevice,

    #[error("engine already running")]
    AlreadyRunning,

    #[error("failed to open device '{name}': {source}")]
    DeviceOpen {
        name: String,
        #[source]
        source: DeviceError,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("failed to spawn reader thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Mode(#[from] sdr_dsp::UnknownMode),

    #[error("audio output error: {0}")]
    Audio(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
