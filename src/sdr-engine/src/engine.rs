// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Engine state machine and the reader thread driving the DSP chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use num_complex::Complex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use sdr_dsp::{Ddc, DemodBank, Mode, Resampler};

use crate::audio::{AudioOutput, AudioPlayback, AudioSink};
use crate::config::EngineConfig;
use crate::device::Device;
use crate::encoder::Encoder;
use crate::error::{EngineError, EngineResult};
use crate::spectrum::Spectrum;

/// Receives dB magnitudes, one call per raw chunk.
pub type SpectrumCallback = Box<dyn FnMut(&[f32]) + Send>;
/// Receives encoded bytes.
pub type EncodedCallback = Box<dyn FnMut(&[u8]) + Send>;

/// PCM broadcast capacity in blocks.
const PCM_BROADCAST_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Stopped,
    Running,
}

/// Where resampled audio goes.
struct Sinks {
    audio: Box<dyn AudioSink>,
    audio_enabled: Arc<AtomicBool>,
    encoder: Option<(Box<dyn Encoder>, EncodedCallback)>,
    pcm_tx: broadcast::Sender<Vec<f32>>,
}

impl Sinks {
    fn deliver(&mut self, pcm: &[f32]) {
        if self.audio_enabled.load(Ordering::Relaxed) {
            self.audio.play(pcm);
        }
        if let Some((encoder, on_bytes)) = self.encoder.as_mut() {
            encoder.encode(pcm, &mut |bytes: &[u8]| on_bytes(bytes));
        }
        // Ignore send errors (no active receivers is fine).
        if self.pcm_tx.receiver_count() > 0 {
            let _ = self.pcm_tx.send(pcm.to_vec());
        }
    }
}

/// Every DSP stage of one session. Only the reader thread runs `process`;
/// control calls lock it briefly to retune.
struct Chain {
    spectrum: Option<(Spectrum, SpectrumCallback)>,
    ddc: Ddc,
    demods: DemodBank,
    resampler: Resampler,
    sinks: Sinks,
}

impl Chain {
    /// The same raw chunk feeds the spectrum and the DDC.
    fn process(&mut self, samples: &[Complex<f32>]) {
        if let Some((spectrum, on_bins)) = self.spectrum.as_mut() {
            spectrum.update(samples, on_bins);
        }
        let Chain {
            ddc,
            demods,
            resampler,
            sinks,
            ..
        } = self;
        ddc.update(samples, &mut |baseband: &[Complex<f32>]| {
            demods.update(baseband, &mut |audio: &[f32]| {
                resampler.update(audio, &mut |pcm: &[f32]| sinks.deliver(pcm));
            });
        });
    }

    /// Keep the resampler's input rate in step with the DDC output.
    fn sync_rates(&mut self) {
        self.resampler.set_in_rate(self.ddc.out_rate());
    }
}

/// Collects the optional collaborators of an [`SdrEngine`].
pub struct EngineBuilder {
    config: EngineConfig,
    devices: Vec<Arc<dyn Device>>,
    audio: Option<Box<dyn AudioSink>>,
    encoder: Option<(Box<dyn Encoder>, EncodedCallback)>,
    spectrum: Option<SpectrumCallback>,
}

impl EngineBuilder {
    /// Candidate device. `start` uses the first one.
    pub fn device(mut self, device: Arc<dyn Device>) -> Self {
        self.devices.push(device);
        self
    }

    /// Replace the default [`AudioOutput`].
    pub fn audio_sink(mut self, sink: Box<dyn AudioSink>) -> Self {
        self.audio = Some(sink);
        self
    }

    pub fn encoder<F>(mut self, encoder: Box<dyn Encoder>, on_bytes: F) -> Self
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.encoder = Some((encoder, Box::new(on_bytes)));
        self
    }

    pub fn spectrum<F>(mut self, on_bins: F) -> Self
    where
        F: FnMut(&[f32]) + Send + 'static,
    {
        self.spectrum = Some(Box::new(on_bins));
        self
    }

    pub fn build(self) -> EngineResult<SdrEngine> {
        let mut config = self.config;
        config.validate().map_err(|e| {
            error!("Invalid engine configuration: {}", e);
            EngineError::Config(e)
        })?;

        let ddc = Ddc::new(
            config.ddc.taps,
            config.ddc.vfo_hz,
            config.ddc.passband_lo_hz,
            config.ddc.passband_hi_hz,
            config.device.sample_rate_hz as f32,
            config.ddc.block_size,
        );
        let mut playback = None;
        let audio: Box<dyn AudioSink> = match self.audio {
            Some(mut sink) => {
                sink.set_gain(config.audio.af_gain);
                sink
            }
            None => {
                let output = AudioOutput::new(
                    config.audio.sample_rate,
                    config.audio.queue_capacity,
                    config.audio.af_gain,
                );
                playback = Some(output.playback());
                Box::new(output)
            }
        };
        if audio.sample_rate() == 0 {
            error!("Audio sink reports a zero sample rate");
            return Err(EngineError::Config(
                "audio sink sample rate must be > 0".to_string(),
            ));
        }
        // The resampler must land on whatever rate the sink plays at.
        if audio.sample_rate() != config.audio.sample_rate {
            info!(
                "Audio sink runs at {} Hz, overriding configured {} Hz",
                audio.sample_rate(),
                config.audio.sample_rate
            );
            config.audio.sample_rate = audio.sample_rate();
        }
        let resampler = Resampler::new(
            config.audio.resampler_taps,
            ddc.out_rate(),
            config.audio.sample_rate as f32,
            config.audio.block_size,
        );

        let audio_enabled = Arc::new(AtomicBool::new(config.audio.enabled));
        let (pcm_tx, _pcm_rx) = broadcast::channel::<Vec<f32>>(PCM_BROADCAST_CAPACITY);
        let spectrum = self
            .spectrum
            .map(|cb| (Spectrum::new(config.spectrum.fft_size), cb));

        info!(
            "SDR engine created: mode {}, DDC {} -> {} Hz, audio {} Hz",
            config.demod.mode,
            config.device.sample_rate_hz,
            ddc.out_rate(),
            config.audio.sample_rate
        );

        let chain = Chain {
            spectrum,
            ddc,
            demods: DemodBank::new(config.demod.mode, config.demod.block_size),
            resampler,
            sinks: Sinks {
                audio,
                audio_enabled: Arc::clone(&audio_enabled),
                encoder: self.encoder,
                pcm_tx: pcm_tx.clone(),
            },
        };

        Ok(SdrEngine {
            config,
            devices: self.devices,
            device: None,
            chain: Arc::new(Mutex::new(chain)),
            running: Arc::new(AtomicBool::new(false)),
            audio_enabled,
            pcm_tx,
            playback,
            reader: None,
            state: EngineState::Created,
        })
    }
}

/// One receive session: device, reader thread and DSP chain.
///
/// Control calls take `&mut self` and are therefore serialized by the
/// owner; the chain itself is shared with the reader thread.
pub struct SdrEngine {
    config: EngineConfig,
    devices: Vec<Arc<dyn Device>>,
    device: Option<Arc<dyn Device>>,
    chain: Arc<Mutex<Chain>>,
    running: Arc<AtomicBool>,
    audio_enabled: Arc<AtomicBool>,
    pcm_tx: broadcast::Sender<Vec<f32>>,
    playback: Option<AudioPlayback>,
    reader: Option<JoinHandle<()>>,
    state: EngineState,
}

impl SdrEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            devices: Vec::new(),
            audio: None,
            encoder: None,
            spectrum: None,
        }
    }

    /// Engine with the default audio output and no device yet.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Self::builder(config).build()
    }

    fn chain(&self) -> MutexGuard<'_, Chain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_device(&mut self, device: Arc<dyn Device>) {
        self.devices.push(device);
    }

    /// `Stopped` as soon as the reader thread has gone, even before `stop`.
    pub fn state(&self) -> EngineState {
        if self.state == EngineState::Running && !self.running.load(Ordering::Acquire) {
            EngineState::Stopped
        } else {
            self.state
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The device in use since the last `start`, if any.
    pub fn device(&self) -> Option<&Arc<dyn Device>> {
        self.device.as_ref()
    }

    /// Open the first device, apply the configured rate, gain and
    /// frequency, and spawn the reader thread.
    pub fn start(&mut self) -> EngineResult<()> {
        if self.is_running() {
            warn!("SDR engine already running");
            return Err(EngineError::AlreadyRunning);
        }
        // Reap a reader that exited on its own.
        self.stop();
        self.chain.clear_poison();
        let Some(device) = self.devices.first().cloned() else {
            error!("No SDR device available");
            return Err(EngineError::NoDevice);
        };

        device.open().map_err(|source| {
            error!("Failed to open device '{}': {}", device.name(), source);
            EngineError::DeviceOpen {
                name: device.name().to_string(),
                source,
            }
        })?;

        if let Err(e) = self.apply_device_settings(device.as_ref()) {
            device.close();
            return Err(e);
        }

        let rate = device.sample_rate() as f32;
        {
            let mut chain = self.chain();
            chain.ddc.set_in_rate(rate);
            chain.sync_rates();
        }

        self.running.store(true, Ordering::Release);
        let spawned = std::thread::Builder::new()
            .name("sdr-reader".to_string())
            .spawn({
                let device = Arc::clone(&device);
                let chain = Arc::clone(&self.chain);
                let running = Arc::clone(&self.running);
                let read_chunk = self.config.device.read_chunk;
                move || reader_loop(device, chain, running, read_chunk)
            });
        let reader = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                device.close();
                error!("Failed to spawn sdr-reader thread: {}", e);
                return Err(EngineError::ThreadSpawn(e));
            }
        };

        info!(
            "SDR engine started on '{}' ({} Hz @ {} Hz)",
            device.name(),
            device.sample_rate(),
            device.center_frequency()
        );
        self.reader = Some(reader);
        self.device = Some(device);
        self.state = EngineState::Running;
        Ok(())
    }

    fn apply_device_settings(&self, device: &dyn Device) -> EngineResult<()> {
        device.set_sample_rate(self.config.device.sample_rate_hz)?;
        device.set_gain(self.config.device.rf_gain)?;
        device.set_center_frequency(self.config.device.center_frequency_hz)?;
        Ok(())
    }

    /// Stop the reader thread and close the device. A no-op unless running.
    pub fn stop(&mut self) {
        if self.state != EngineState::Running {
            return;
        }
        self.running.store(false, Ordering::Release);
        // Closing first releases a reader parked on an empty capture queue.
        if let Some(device) = self.device.as_ref() {
            device.close();
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                error!("sdr-reader thread panicked");
            }
        }
        self.state = EngineState::Stopped;
        info!("SDR engine stopped");
    }

    fn with_device<F>(&self, f: F) -> EngineResult<()>
    where
        F: FnOnce(&dyn Device) -> Result<(), crate::error::DeviceError>,
    {
        match self.device.as_ref() {
            Some(device) if device.is_open() => Ok(f(device.as_ref())?),
            _ => Ok(()),
        }
    }

    pub fn center_frequency(&self) -> f64 {
        match self.device.as_ref() {
            Some(d) if d.is_open() => d.center_frequency(),
            _ => self.config.device.center_frequency_hz,
        }
    }

    pub fn set_center_frequency(&mut self, freq_hz: f64) -> EngineResult<()> {
        self.with_device(|d| d.set_center_frequency(freq_hz))?;
        self.config.device.center_frequency_hz = freq_hz;
        debug!("Center frequency set to {} Hz", freq_hz);
        Ok(())
    }

    pub fn sample_rate(&self) -> f64 {
        match self.device.as_ref() {
            Some(d) if d.is_open() => d.sample_rate(),
            _ => self.config.device.sample_rate_hz,
        }
    }

    /// Change the device rate and retune the DDC and resampler to match.
    pub fn set_sample_rate(&mut self, rate_hz: f64) -> EngineResult<()> {
        if !(rate_hz > 0.0) {
            return Err(EngineError::Config(format!("invalid sample rate {rate_hz}")));
        }
        self.with_device(|d| d.set_sample_rate(rate_hz))?;
        self.config.device.sample_rate_hz = rate_hz;
        let mut chain = self.chain();
        chain.ddc.set_in_rate(rate_hz as f32);
        chain.sync_rates();
        info!("Sample rate set to {} Hz (DDC out {} Hz)", rate_hz, chain.ddc.out_rate());
        Ok(())
    }

    pub fn rf_gain(&self) -> f32 {
        match self.device.as_ref() {
            Some(d) if d.is_open() => d.gain(),
            _ => self.config.device.rf_gain,
        }
    }

    /// RF gain in 0..1 of the device's range.
    pub fn set_rf_gain(&mut self, gain: f32) -> EngineResult<()> {
        let gain = gain.clamp(0.0, 1.0);
        self.with_device(|d| d.set_gain(gain))?;
        self.config.device.rf_gain = gain;
        debug!("RF gain set to {:.2}", gain);
        Ok(())
    }

    pub fn af_gain(&self) -> f32 {
        self.chain().sinks.audio.gain()
    }

    pub fn set_af_gain(&mut self, gain: f32) {
        let gain = gain.max(0.0);
        self.chain().sinks.audio.set_gain(gain);
        self.config.audio.af_gain = gain;
        debug!("AF gain set to {:.2}", gain);
    }

    pub fn mode(&self) -> Mode {
        self.chain().demods.mode()
    }

    /// Switch the active demodulator. The previous one keeps its state.
    pub fn set_mode(&mut self, mode: Mode) {
        self.chain().demods.set_mode(mode);
        self.config.demod.mode = mode;
        info!("Demodulation mode set to {}", mode);
    }

    /// Numeric-id variant of [`SdrEngine::set_mode`].
    pub fn set_mode_id(&mut self, id: i32) -> EngineResult<()> {
        let mode = Mode::try_from(id).map_err(|e| {
            warn!("{}", e);
            EngineError::from(e)
        })?;
        self.set_mode(mode);
        Ok(())
    }

    pub fn vfo(&self) -> f32 {
        self.chain().ddc.vfo()
    }

    pub fn passband_lo(&self) -> f32 {
        self.chain().ddc.passband_lo()
    }

    pub fn passband_hi(&self) -> f32 {
        self.chain().ddc.passband_hi()
    }

    pub fn set_vfo(&mut self, vfo_hz: f32) {
        let (lo, hi) = (self.passband_lo(), self.passband_hi());
        self.set_ddc_freqs(vfo_hz, lo, hi);
    }

    pub fn set_passband_lo(&mut self, lo_hz: f32) {
        let (vfo, hi) = (self.vfo(), self.passband_hi());
        self.set_ddc_freqs(vfo, lo_hz, hi);
    }

    pub fn set_passband_hi(&mut self, hi_hz: f32) {
        let (vfo, lo) = (self.vfo(), self.passband_lo());
        self.set_ddc_freqs(vfo, lo, hi_hz);
    }

    /// Retune the DDC and bring the resampler's input rate along.
    pub fn set_ddc_freqs(&mut self, vfo_hz: f32, lo_hz: f32, hi_hz: f32) {
        let mut chain = self.chain.lock().unwrap_or_else(PoisonError::into_inner);
        chain.ddc.set_freqs(vfo_hz, lo_hz, hi_hz);
        chain.sync_rates();
        self.config.ddc.vfo_hz = chain.ddc.vfo();
        self.config.ddc.passband_lo_hz = chain.ddc.passband_lo();
        self.config.ddc.passband_hi_hz = chain.ddc.passband_hi();
        info!(
            "DDC retuned: vfo {} Hz, passband {}..{} Hz, out {} Hz",
            chain.ddc.vfo(),
            chain.ddc.passband_lo(),
            chain.ddc.passband_hi(),
            chain.ddc.out_rate()
        );
    }

    pub fn ddc_out_rate(&self) -> f32 {
        self.chain().ddc.out_rate()
    }

    pub fn resampler_in_rate(&self) -> f32 {
        self.chain().resampler.in_rate()
    }

    pub fn enable_audio(&mut self, enabled: bool) {
        self.audio_enabled.store(enabled, Ordering::Relaxed);
        self.config.audio.enabled = enabled;
        info!("Audio output {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled.load(Ordering::Relaxed)
    }

    /// Read side of the default audio output; `None` with a custom sink.
    pub fn audio_playback(&self) -> Option<AudioPlayback> {
        self.playback.clone()
    }

    pub fn attach_encoder<F>(&mut self, encoder: Box<dyn Encoder>, on_bytes: F)
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.chain().sinks.encoder = Some((encoder, Box::new(on_bytes)));
        debug!("Encoder attached");
    }

    pub fn detach_encoder(&mut self) {
        self.chain().sinks.encoder = None;
        debug!("Encoder detached");
    }

    /// Every resampled block, best effort; slow receivers see `Lagged`.
    pub fn subscribe_pcm(&self) -> broadcast::Receiver<Vec<f32>> {
        self.pcm_tx.subscribe()
    }
}

impl Drop for SdrEngine {
    fn drop(&mut self) {
        self.stop();
        debug!("SDR engine released");
    }
}

/// Clears the running flag however the reader leaves, unwinding included.
struct ReaderExit(Arc<AtomicBool>);

impl Drop for ReaderExit {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("sdr-reader panicked in the DSP chain, engine no longer running");
        }
        self.0.store(false, Ordering::Release);
    }
}

fn reader_loop(
    device: Arc<dyn Device>,
    chain: Arc<Mutex<Chain>>,
    running: Arc<AtomicBool>,
    read_chunk: usize,
) {
    let _exit = ReaderExit(Arc::clone(&running));
    let mut block = vec![Complex::new(0.0_f32, 0.0_f32); read_chunk.max(1)];
    while running.load(Ordering::Acquire) && device.is_open() {
        let n = device.read(&mut block);
        if n == 0 {
            std::thread::yield_now();
            continue;
        }
        match chain.lock() {
            Ok(mut chain) => chain.process(&block[..n]),
            Err(e) => {
                error!("DSP chain mutex poisoned: {}", e);
            }
        }
    }
    debug!("sdr-reader exiting");
}
