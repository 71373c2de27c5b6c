// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use num_complex::Complex;
use tokio::sync::broadcast::error::TryRecvError;
use sdr_engine::{
    AudioSink, Device, DeviceError, EngineConfig, EngineError, EngineState, Mode, Pcm16Encoder,
    SdrEngine, SyntheticDevice,
};

const IQ_RATE: f64 = 240_000.0;
const AUDIO_RATE: u32 = 48_000;
const TONE_HZ: f64 = 1_000.0;
const DEVIATION_HZ: f64 = 3_000.0;

/// Endless FM carrier at baseband modulated by a sine tone.
fn fm_tone_device() -> SyntheticDevice {
    let mut phase = 0.0_f64;
    let mut n = 0u64;
    SyntheticDevice::new("fm-tone", IQ_RATE, move |buf: &mut [Complex<f32>]| {
        for s in buf.iter_mut() {
            let t = n as f64 / IQ_RATE;
            phase += TAU * DEVIATION_HZ * (TAU * TONE_HZ * t).sin() / IQ_RATE;
            phase %= TAU;
            *s = Complex::new(phase.cos() as f32, phase.sin() as f32);
            n += 1;
        }
        buf.len()
    })
    .with_queue_capacity(1 << 16)
}

fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.device.sample_rate_hz = IQ_RATE;
    config.device.read_chunk = 4096;
    config.ddc.taps = 127;
    config.ddc.passband_lo_hz = -8_000.0;
    config.ddc.passband_hi_hz = 8_000.0;
    config.ddc.block_size = 256;
    config.demod.block_size = 256;
    config.audio.sample_rate = AUDIO_RATE;
    config.audio.block_size = 256;
    config.spectrum.fft_size = 1024;
    config
}

/// Audio sink recording everything it is handed.
struct CaptureSink {
    samples: Arc<Mutex<Vec<f32>>>,
    rate: u32,
    gain: f32,
}

impl CaptureSink {
    fn boxed(samples: &Arc<Mutex<Vec<f32>>>, rate: u32) -> Box<Self> {
        Box::new(Self {
            samples: Arc::clone(samples),
            rate,
            gain: 1.0,
        })
    }
}

impl AudioSink for CaptureSink {
    fn play(&mut self, samples: &[f32]) {
        let mut buf = self.samples.lock().unwrap();
        buf.extend(samples.iter().map(|s| s * self.gain));
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    fn gain(&self) -> f32 {
        self.gain
    }
}

/// Device that refuses to open.
struct BrokenDevice;

impl Device for BrokenDevice {
    fn name(&self) -> &str {
        "broken"
    }
    fn open(&self) -> Result<(), DeviceError> {
        Err(DeviceError::Backend("no hardware".into()))
    }
    fn close(&self) {}
    fn is_open(&self) -> bool {
        false
    }
    fn read(&self, _buf: &mut [Complex<f32>]) -> usize {
        0
    }
    fn set_gain(&self, _gain: f32) -> Result<(), DeviceError> {
        Err(DeviceError::NotOpen)
    }
    fn gain(&self) -> f32 {
        0.0
    }
    fn set_sample_rate(&self, _rate_hz: f64) -> Result<(), DeviceError> {
        Err(DeviceError::NotOpen)
    }
    fn sample_rate(&self) -> f64 {
        0.0
    }
    fn set_center_frequency(&self, _freq_hz: f64) -> Result<(), DeviceError> {
        Err(DeviceError::NotOpen)
    }
    fn center_frequency(&self) -> f64 {
        0.0
    }
}

fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

/// Frequency estimate from rising zero crossings.
fn dominant_frequency(samples: &[f32], rate: f32) -> f32 {
    let mean = samples.iter().sum::<f32>() / samples.len() as f32;
    let rising: Vec<usize> = samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] - mean < 0.0 && w[1] - mean >= 0.0)
        .map(|(i, _)| i)
        .collect();
    assert!(rising.len() > 2, "no oscillation in decoded audio");
    let span = (rising[rising.len() - 1] - rising[0]) as f32;
    (rising.len() - 1) as f32 * rate / span
}

#[test]
fn fm_tone_decodes_to_modulation_frequency() {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let device = Arc::new(fm_tone_device());
    let mut engine = SdrEngine::builder(test_config())
        .device(device.clone())
        .audio_sink(CaptureSink::boxed(&captured, AUDIO_RATE))
        .build()
        .expect("build");
    engine.enable_audio(true);
    assert_eq!(engine.state(), EngineState::Created);

    engine.start().expect("start");
    assert!(engine.is_running());
    let enough = AUDIO_RATE as usize / 2;
    assert!(
        wait_for(Duration::from_secs(20), || captured.lock().unwrap().len() >= enough),
        "audio never arrived"
    );
    engine.stop();
    assert_eq!(engine.state(), EngineState::Stopped);

    let audio = captured.lock().unwrap().clone();
    let settled = &audio[audio.len() / 5..];
    let freq = dominant_frequency(settled, AUDIO_RATE as f32);
    assert!(
        (freq - TONE_HZ as f32).abs() < TONE_HZ as f32 * 0.05,
        "decoded {freq} Hz"
    );
    let peak = settled.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
    // 3 kHz deviation at a 20 kHz channel rate: arg step / pi ~= 0.3.
    assert!(peak > 0.2 && peak < 0.45, "peak {peak}");

    drop(engine);
    assert!(!device.is_open());
    assert_eq!(Arc::strong_count(&device), 1);
}

#[test]
fn resampler_follows_custom_sink_rate() {
    const SINK_RATE: u32 = 16_000;
    let captured = Arc::new(Mutex::new(Vec::new()));
    let mut engine = SdrEngine::builder(test_config())
        .device(Arc::new(fm_tone_device()))
        .audio_sink(CaptureSink::boxed(&captured, SINK_RATE))
        .build()
        .expect("build");
    assert_eq!(engine.config().audio.sample_rate, SINK_RATE);
    engine.enable_audio(true);

    engine.start().expect("start");
    let enough = SINK_RATE as usize / 2;
    assert!(
        wait_for(Duration::from_secs(20), || captured.lock().unwrap().len() >= enough),
        "audio never arrived"
    );
    engine.stop();

    let audio = captured.lock().unwrap().clone();
    let freq = dominant_frequency(&audio[audio.len() / 5..], SINK_RATE as f32);
    assert!(
        (freq - TONE_HZ as f32).abs() < TONE_HZ as f32 * 0.05,
        "decoded {freq} Hz at {SINK_RATE} Hz"
    );
}

#[test]
fn zero_rate_sink_is_rejected() {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let built = SdrEngine::builder(test_config())
        .audio_sink(CaptureSink::boxed(&captured, 0))
        .build();
    assert!(matches!(built, Err(EngineError::Config(_))));
}

#[test]
fn panicking_callback_marks_engine_stopped() {
    let panicked = Arc::new(AtomicBool::new(false));
    let spectra = Arc::new(AtomicUsize::new(0));
    let mut engine = SdrEngine::builder(test_config())
        .device(Arc::new(fm_tone_device()))
        .spectrum({
            let (panicked, spectra) = (Arc::clone(&panicked), Arc::clone(&spectra));
            move |_: &[f32]| {
                if !panicked.swap(true, Ordering::SeqCst) {
                    panic!("spectrum consumer failed");
                }
                spectra.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build()
        .expect("build");

    engine.start().expect("start");
    assert!(
        wait_for(Duration::from_secs(10), || !engine.is_running()),
        "reader died but engine still reports running"
    );
    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(panicked.load(Ordering::SeqCst));

    engine.start().expect("restart after reader panic");
    assert!(engine.is_running());
    assert!(wait_for(Duration::from_secs(10), || {
        spectra.load(Ordering::SeqCst) > 0
    }));
    engine.stop();
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[test]
fn exhausted_device_stops_engine() {
    let mut remaining = 3 * IQ_RATE as usize / 10;
    let device = Arc::new(
        SyntheticDevice::new("short", IQ_RATE, move |buf: &mut [Complex<f32>]| {
            let n = buf.len().min(remaining);
            buf[..n].fill(Complex::new(1.0, 0.0));
            remaining -= n;
            n
        })
        .with_queue_capacity(1 << 16),
    );
    let mut engine = SdrEngine::builder(test_config())
        .device(device.clone())
        .build()
        .expect("build");

    engine.start().expect("start");
    assert!(
        wait_for(Duration::from_secs(10), || !engine.is_running()),
        "engine kept running on an exhausted device"
    );
    assert!(!device.is_open());
    engine.stop();
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[test]
fn start_without_device_fails() {
    let mut engine = SdrEngine::new(test_config()).expect("build");
    assert!(matches!(engine.start(), Err(EngineError::NoDevice)));
    assert_eq!(engine.state(), EngineState::Created);
}

#[test]
fn start_twice_fails_and_restart_works() {
    let device = Arc::new(SyntheticDevice::silence(IQ_RATE).with_queue_capacity(8192));
    let mut engine = SdrEngine::builder(test_config())
        .device(device.clone())
        .build()
        .expect("build");
    engine.start().expect("start");
    assert!(matches!(engine.start(), Err(EngineError::AlreadyRunning)));
    engine.stop();
    engine.stop();
    assert!(!device.is_open());
    engine.start().expect("restart");
    assert!(device.is_open());
    engine.stop();
}

#[test]
fn device_open_failure_is_reported() {
    let mut engine = SdrEngine::builder(test_config())
        .device(Arc::new(BrokenDevice))
        .build()
        .expect("build");
    let err = engine.start().unwrap_err();
    assert!(
        matches!(err, EngineError::DeviceOpen { ref name, .. } if name == "broken"),
        "{err}"
    );
    assert!(!engine.is_running());
}

#[test]
fn start_applies_configured_tuning() {
    let mut config = test_config();
    config.device.center_frequency_hz = 101_100_000.0;
    config.device.rf_gain = 0.4;
    let device = Arc::new(SyntheticDevice::silence(1.0).with_queue_capacity(8192));
    let mut engine = SdrEngine::builder(config)
        .device(device.clone())
        .build()
        .expect("build");
    engine.start().expect("start");
    assert_eq!(device.center_frequency(), 101_100_000.0);
    assert_eq!(device.sample_rate(), IQ_RATE);
    assert!((device.gain() - 0.4).abs() < 1e-6);

    engine.set_center_frequency(99_000_000.0).expect("retune");
    assert_eq!(device.center_frequency(), 99_000_000.0);
    engine.set_rf_gain(3.0).expect("gain");
    assert_eq!(engine.rf_gain(), 1.0);
    engine.stop();
    assert_eq!(engine.center_frequency(), 99_000_000.0);
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = test_config();
    config.audio.sample_rate = 1;
    assert!(matches!(
        SdrEngine::new(config),
        Err(EngineError::Config(_))
    ));
}

#[test]
fn retune_keeps_resampler_in_step() {
    let mut engine = SdrEngine::new(test_config()).expect("build");
    assert_eq!(engine.ddc_out_rate(), 20_000.0);
    assert_eq!(engine.resampler_in_rate(), 20_000.0);

    engine.set_ddc_freqs(20_000.0, -10_000.0, 10_000.0);
    assert_eq!(engine.vfo(), 20_000.0);
    assert_eq!(engine.ddc_out_rate(), 25_000.0);
    assert_eq!(engine.resampler_in_rate(), 25_000.0);

    engine.set_passband_hi(2_000.0);
    assert_eq!(engine.passband_lo(), -10_000.0);
    assert_eq!(engine.passband_hi(), 2_000.0);
    assert_eq!(engine.resampler_in_rate(), engine.ddc_out_rate());

    engine.set_vfo(-5_000.0);
    assert_eq!(engine.config().ddc.vfo_hz, -5_000.0);

    engine.set_sample_rate(48_000.0).expect("rate");
    assert_eq!(engine.ddc_out_rate(), 25_000.0);
    engine.set_sample_rate(20_000.0).expect("rate");
    assert_eq!(engine.ddc_out_rate(), 20_000.0);
    assert_eq!(engine.resampler_in_rate(), 20_000.0);
    assert!(engine.set_sample_rate(0.0).is_err());
}

#[test]
fn mode_and_gain_controls() {
    let mut engine = SdrEngine::new(test_config()).expect("build");
    assert_eq!(engine.mode(), Mode::Fm);
    engine.set_mode(Mode::Usb);
    assert_eq!(engine.mode(), Mode::Usb);
    engine.set_mode_id(1).expect("AM id");
    assert_eq!(engine.mode(), Mode::Am);
    assert!(matches!(engine.set_mode_id(9), Err(EngineError::Mode(_))));
    assert_eq!(engine.mode(), Mode::Am);

    engine.set_af_gain(0.3);
    assert!((engine.af_gain() - 0.3).abs() < 1e-6);
    assert!(!engine.audio_enabled());
    engine.enable_audio(true);
    assert!(engine.audio_enabled());
    assert!(engine.audio_playback().is_some());
}

#[test]
fn spectrum_encoder_and_pcm_subscribers_receive_data() {
    let spectra = Arc::new(AtomicUsize::new(0));
    let bins_ok = Arc::new(AtomicBool::new(true));
    let bytes = Arc::new(AtomicUsize::new(0));
    let device = Arc::new(fm_tone_device());

    let mut engine = SdrEngine::builder(test_config())
        .device(device)
        .spectrum({
            let (spectra, bins_ok) = (Arc::clone(&spectra), Arc::clone(&bins_ok));
            move |bins: &[f32]| {
                if bins.len() != 1024 {
                    bins_ok.store(false, Ordering::SeqCst);
                }
                spectra.fetch_add(1, Ordering::SeqCst);
            }
        })
        .encoder(Box::new(Pcm16Encoder::new()), {
            let bytes = Arc::clone(&bytes);
            move |b: &[u8]| {
                bytes.fetch_add(b.len(), Ordering::SeqCst);
            }
        })
        .build()
        .expect("build");
    let mut pcm = engine.subscribe_pcm();

    engine.start().expect("start");
    assert!(wait_for(Duration::from_secs(20), || {
        spectra.load(Ordering::SeqCst) > 2 && bytes.load(Ordering::SeqCst) >= 2 * 256
    }));
    engine.stop();

    assert!(bins_ok.load(Ordering::SeqCst));
    assert_eq!(bytes.load(Ordering::SeqCst) % (2 * 256), 0);
    let frame = loop {
        match pcm.try_recv() {
            Ok(frame) => break frame,
            Err(TryRecvError::Lagged(_)) => continue,
            Err(e) => panic!("no pcm frame: {e}"),
        }
    };
    assert_eq!(frame.len(), 256);

    engine.detach_encoder();
}
