// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! SoapySDR hardware device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use num_complex::Complex;
use soapysdr::Direction;

use super::synthetic::DEFAULT_QUEUE_CAPACITY;
use super::Device;
use crate::error::DeviceError;
use crate::queue::BlockingQueue;

const CHANNEL: usize = 0;
/// Stream read timeout so the capture thread notices `close`.
const READ_TIMEOUT_US: i64 = 100_000;
const READ_CHUNK: usize = 16_384;

#[derive(Debug, Clone, Copy)]
struct Tuning {
    gain: f32,
    sample_rate: f64,
    center_frequency: f64,
}

struct Session {
    device: soapysdr::Device,
    queue: Arc<BlockingQueue<Complex<f32>>>,
    capture: JoinHandle<()>,
}

/// RX channel 0 of a SoapySDR device, streamed on a capture thread into
/// a blocking queue.
pub struct SoapyDevice {
    args: String,
    queue_capacity: usize,
    open: Arc<AtomicBool>,
    tuning: Mutex<Tuning>,
    session: Mutex<Option<Session>>,
}

fn backend(context: &str, err: soapysdr::Error) -> DeviceError {
    DeviceError::Backend(format!("{context}: {err}"))
}

impl SoapyDevice {
    /// `args` is a SoapySDR device string, e.g. `"driver=rtlsdr"`.
    pub fn new(args: impl Into<String>) -> Self {
        Self {
            args: args.into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            open: Arc::new(AtomicBool::new(false)),
            tuning: Mutex::new(Tuning {
                gain: 1.0,
                sample_rate: 2_048_000.0,
                center_frequency: 88.7e6,
            }),
            session: Mutex::new(None),
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tuning(&self) -> MutexGuard<'_, Tuning> {
        self.tuning.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_gain(device: &soapysdr::Device, gain: f32) -> Result<(), DeviceError> {
        let range = device
            .gain_range(Direction::Rx, CHANNEL)
            .map_err(|e| backend("gain range", e))?;
        let db = range.minimum + (range.maximum - range.minimum) * gain as f64;
        device
            .set_gain(Direction::Rx, CHANNEL, db)
            .map_err(|e| backend("set gain", e))?;
        tracing::debug!("soapysdr: gain {:.2} -> {:.1} dB", gain, db);
        Ok(())
    }
}

/// Consecutive non-timeout read errors before the stream is abandoned.
const MAX_READ_FAILURES: u32 = 20;

/// 10 ms doubling per consecutive failure, capped at 640 ms.
fn read_backoff(failures: u32) -> Duration {
    Duration::from_millis(10 << failures.saturating_sub(1).min(6))
}

fn capture_loop(
    mut stream: soapysdr::RxStream<Complex<f32>>,
    queue: Arc<BlockingQueue<Complex<f32>>>,
    open: Arc<AtomicBool>,
) {
    if let Err(e) = stream.activate(None) {
        tracing::error!("soapysdr: failed to activate stream: {}", e);
        queue.close();
        return;
    }
    let mut chunk = vec![Complex::new(0.0_f32, 0.0); READ_CHUNK];
    let mut failures = 0u32;
    while open.load(Ordering::Acquire) {
        match stream.read(&mut [&mut chunk[..]], READ_TIMEOUT_US) {
            Ok(n) => {
                failures = 0;
                if queue.push_slice(&chunk[..n]) < n {
                    break;
                }
            }
            Err(e) if e.code == soapysdr::ErrorCode::Timeout => {}
            Err(e) => {
                failures += 1;
                if failures >= MAX_READ_FAILURES {
                    tracing::error!(
                        "soapysdr: giving up after {} consecutive read errors: {}",
                        failures,
                        e
                    );
                    break;
                }
                tracing::warn!("soapysdr: read error: {}; retrying", e);
                std::thread::sleep(read_backoff(failures));
            }
        }
    }
    if let Err(e) = stream.deactivate(None) {
        tracing::warn!("soapysdr: failed to deactivate stream: {}", e);
    }
    queue.close();
}

impl Device for SoapyDevice {
    fn name(&self) -> &str {
        &self.args
    }

    fn open(&self) -> Result<(), DeviceError> {
        let mut session = self.session();
        if session.is_some() {
            return Err(DeviceError::Backend(format!("{} is already open", self.args)));
        }
        tracing::info!("Opening SoapySDR device with args: {}", self.args);
        let device =
            soapysdr::Device::new(self.args.as_str()).map_err(|e| backend("open", e))?;
        let tuning = *self.tuning();
        device
            .set_sample_rate(Direction::Rx, CHANNEL, tuning.sample_rate)
            .map_err(|e| backend("set sample rate", e))?;
        device
            .set_frequency(Direction::Rx, CHANNEL, tuning.center_frequency, ())
            .map_err(|e| backend("set frequency", e))?;
        if let Err(e) = Self::apply_gain(&device, tuning.gain) {
            tracing::warn!("soapysdr: {}; using device default gain", e);
        }
        let stream = device
            .rx_stream::<Complex<f32>>(&[CHANNEL])
            .map_err(|e| backend("rx stream", e))?;

        let queue = Arc::new(BlockingQueue::new(self.queue_capacity));
        self.open.store(true, Ordering::Release);
        let capture = std::thread::Builder::new()
            .name("soapy-rx".to_string())
            .spawn({
                let queue = Arc::clone(&queue);
                let open = Arc::clone(&self.open);
                move || capture_loop(stream, queue, open)
            })
            .map_err(|e| {
                self.open.store(false, Ordering::Release);
                DeviceError::Backend(format!("failed to spawn capture thread: {e}"))
            })?;
        *session = Some(Session {
            device,
            queue,
            capture,
        });
        tracing::info!(
            "SoapySDR device opened ({} Hz @ {} Hz)",
            tuning.sample_rate,
            tuning.center_frequency
        );
        Ok(())
    }

    fn close(&self) {
        let Some(session) = self.session().take() else {
            return;
        };
        self.open.store(false, Ordering::Release);
        session.queue.close();
        if session.capture.join().is_err() {
            tracing::error!("soapysdr: capture thread panicked");
        }
        drop(session.device);
        tracing::info!("SoapySDR device closed");
    }

    /// Also false once the capture thread has given up and its queue is drained.
    fn is_open(&self) -> bool {
        if !self.open.load(Ordering::Acquire) {
            return false;
        }
        self.session()
            .as_ref()
            .is_some_and(|s| !(s.queue.is_closed() && s.queue.is_empty()))
    }

    fn read(&self, buf: &mut [Complex<f32>]) -> usize {
        let queue = match self.session().as_ref() {
            Some(s) if self.open.load(Ordering::Acquire) => Arc::clone(&s.queue),
            _ => return 0,
        };
        queue.pop_into(buf)
    }

    fn set_gain(&self, gain: f32) -> Result<(), DeviceError> {
        let gain = gain.clamp(0.0, 1.0);
        if let Some(s) = self.session().as_ref() {
            Self::apply_gain(&s.device, gain)?;
        }
        self.tuning().gain = gain;
        Ok(())
    }

    fn gain(&self) -> f32 {
        self.tuning().gain
    }

    fn set_sample_rate(&self, rate_hz: f64) -> Result<(), DeviceError> {
        if let Some(s) = self.session().as_ref() {
            s.device
                .set_sample_rate(Direction::Rx, CHANNEL, rate_hz)
                .map_err(|e| backend("set sample rate", e))?;
        }
        self.tuning().sample_rate = rate_hz;
        Ok(())
    }

    fn sample_rate(&self) -> f64 {
        self.tuning().sample_rate
    }

    fn set_center_frequency(&self, freq_hz: f64) -> Result<(), DeviceError> {
        if let Some(s) = self.session().as_ref() {
            s.device
                .set_frequency(Direction::Rx, CHANNEL, freq_hz, ())
                .map_err(|e| backend("set frequency", e))?;
        }
        self.tuning().center_frequency = freq_hz;
        Ok(())
    }

    fn center_frequency(&self) -> f64 {
        self.tuning().center_frequency
    }
}

impl Drop for SoapyDevice {
    fn drop(&mut self) {
        self.close();
    }
}
