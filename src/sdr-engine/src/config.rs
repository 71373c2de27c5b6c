// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Engine configuration.
//!
//! Loaded from the `[sdr-engine]` section of `sdr-rs.toml`. Default search
//! order:
//! 1. An explicit path passed by the caller
//! 2. `./sdr-rs.toml`
//! 3. `~/.config/sdr-rs/sdr-rs.toml`
//! 4. `/etc/sdr-rs/sdr-rs.toml`

use serde::{Deserialize, Serialize};

use sdr_app::ConfigFile;
use sdr_dsp::Mode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub general: GeneralConfig,
    pub device: DeviceConfig,
    pub ddc: DdcConfig,
    pub demod: DemodConfig,
    pub audio: AudioConfig,
    pub spectrum: SpectrumConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// Settings applied to the device on every `start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub center_frequency_hz: f64,
    pub sample_rate_hz: f64,
    /// Normalized 0..1 of the device's gain range.
    pub rf_gain: f32,
    /// Samples per device read on the reader thread.
    pub read_chunk: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            center_frequency_hz: 88_700_000.0,
            sample_rate_hz: 2_048_000.0,
            rf_gain: 1.0,
            read_chunk: 16_384,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DdcConfig {
    /// Anti-alias FIR length.
    pub taps: usize,
    /// Channel offset from the device centre frequency.
    pub vfo_hz: f32,
    /// Passband edges relative to the VFO.
    pub passband_lo_hz: f32,
    pub passband_hi_hz: f32,
    pub block_size: usize,
}

impl Default for DdcConfig {
    fn default() -> Self {
        Self {
            taps: 255,
            vfo_hz: 0.0,
            passband_lo_hz: -5_000.0,
            passband_hi_hz: 5_000.0,
            block_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemodConfig {
    pub mode: Mode,
    pub block_size: usize,
}

impl Default for DemodConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Fm,
            block_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Start with audio output enabled.
    pub enabled: bool,
    pub sample_rate: u32,
    pub af_gain: f32,
    /// Drop-when-full queue size in samples.
    pub queue_capacity: usize,
    pub resampler_taps: usize,
    pub block_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sample_rate: 44_100,
            af_gain: 1.0,
            queue_capacity: 65_536,
            resampler_taps: sdr_dsp::resampler::DEFAULT_TAPS,
            block_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub fft_size: usize,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self { fft_size: 16_384 }
    }
}

impl EngineConfig {
    /// Semantic checks beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        let dev = &self.device;
        if !(dev.sample_rate_hz > 0.0) {
            return Err("[device].sample_rate_hz must be > 0".to_string());
        }
        if !(dev.center_frequency_hz > 0.0) {
            return Err("[device].center_frequency_hz must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&dev.rf_gain) {
            return Err("[device].rf_gain must be in range 0.0..=1.0".to_string());
        }
        if dev.read_chunk == 0 {
            return Err("[device].read_chunk must be > 0".to_string());
        }

        let ddc = &self.ddc;
        if ddc.taps == 0 {
            return Err("[ddc].taps must be > 0".to_string());
        }
        if ddc.block_size == 0 {
            return Err("[ddc].block_size must be > 0".to_string());
        }
        if ddc.vfo_hz.abs() as f64 >= dev.sample_rate_hz / 2.0 {
            return Err(format!(
                "[ddc].vfo_hz {} is outside the captured bandwidth (+/-{} Hz)",
                ddc.vfo_hz,
                dev.sample_rate_hz / 2.0
            ));
        }
        if ddc.passband_lo_hz == ddc.passband_hi_hz {
            return Err("[ddc] passband_lo_hz and passband_hi_hz must differ".to_string());
        }

        if self.demod.block_size == 0 {
            return Err("[demod].block_size must be > 0".to_string());
        }

        let audio = &self.audio;
        if audio.sample_rate < 8_000 || audio.sample_rate > 192_000 {
            return Err("[audio].sample_rate must be in range 8000..=192000".to_string());
        }
        if !(audio.af_gain >= 0.0) {
            return Err("[audio].af_gain must be >= 0".to_string());
        }
        if audio.queue_capacity == 0 {
            return Err("[audio].queue_capacity must be > 0".to_string());
        }
        if audio.resampler_taps < 2 {
            return Err("[audio].resampler_taps must be >= 2".to_string());
        }
        if audio.block_size == 0 {
            return Err("[audio].block_size must be > 0".to_string());
        }

        if self.spectrum.fft_size < 2 {
            return Err("[spectrum].fft_size must be >= 2".to_string());
        }
        Ok(())
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for EngineConfig {
    fn section_key() -> &'static str {
        "sdr-engine"
    }
}
