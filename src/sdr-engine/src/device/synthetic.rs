// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Software device fed by a sample generator on its own capture thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use num_complex::Complex;

use super::Device;
use crate::error::DeviceError;
use crate::queue::BlockingQueue;

/// Capture queue size in samples.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1 << 20;

/// Samples produced per generator call.
const GENERATOR_CHUNK: usize = 4096;

/// Fills the buffer and returns how many samples were written. Returning 0
/// ends the capture.
pub type Generator = Box<dyn FnMut(&mut [Complex<f32>]) -> usize + Send>;

#[derive(Debug, Clone, Copy)]
struct Tuning {
    gain: f32,
    sample_rate: f64,
    center_frequency: f64,
}

/// Device whose "hardware callback" is a thread running a generator
/// closure into a [`BlockingQueue`].
pub struct SyntheticDevice {
    name: String,
    generator: Arc<Mutex<Generator>>,
    queue_capacity: usize,
    queue: Mutex<Option<Arc<BlockingQueue<Complex<f32>>>>>,
    capture: Mutex<Option<JoinHandle<()>>>,
    open: Arc<AtomicBool>,
    tuning: Mutex<Tuning>,
}

impl SyntheticDevice {
    pub fn new<G>(name: impl Into<String>, sample_rate: f64, generator: G) -> Self
    where
        G: FnMut(&mut [Complex<f32>]) -> usize + Send + 'static,
    {
        Self {
            name: name.into(),
            generator: Arc::new(Mutex::new(Box::new(generator))),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue: Mutex::new(None),
            capture: Mutex::new(None),
            open: Arc::new(AtomicBool::new(false)),
            tuning: Mutex::new(Tuning {
                gain: 0.0,
                sample_rate,
                center_frequency: 0.0,
            }),
        }
    }

    /// Endless stream of zeros.
    pub fn silence(sample_rate: f64) -> Self {
        Self::new("silence", sample_rate, |buf: &mut [Complex<f32>]| {
            buf.fill(Complex::new(0.0, 0.0));
            buf.len()
        })
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    fn tuning(&self) -> Tuning {
        *self.tuning.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_tuning(&self, f: impl FnOnce(&mut Tuning)) {
        f(&mut self.tuning.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn current_queue(&self) -> Option<Arc<BlockingQueue<Complex<f32>>>> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn capture_loop(
    generator: Arc<Mutex<Generator>>,
    queue: Arc<BlockingQueue<Complex<f32>>>,
    open: Arc<AtomicBool>,
) {
    let mut chunk = vec![Complex::new(0.0_f32, 0.0); GENERATOR_CHUNK];
    while open.load(Ordering::Acquire) {
        let n = match generator.lock() {
            Ok(mut gen) => gen(&mut chunk),
            Err(e) => {
                tracing::error!("synthetic generator poisoned: {}", e);
                0
            }
        };
        if n == 0 {
            tracing::debug!("synthetic generator exhausted");
            break;
        }
        if queue.push_slice(&chunk[..n.min(chunk.len())]) < n {
            break;
        }
    }
    // Lets a reader drain what is left instead of waiting forever.
    queue.close();
}

impl Device for SyntheticDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<(), DeviceError> {
        let mut capture = self.capture.lock().unwrap_or_else(PoisonError::into_inner);
        if capture.is_some() {
            return Err(DeviceError::Backend(format!("{} is already open", self.name)));
        }
        let queue = Arc::new(BlockingQueue::new(self.queue_capacity));
        self.open.store(true, Ordering::Release);
        let handle = std::thread::Builder::new()
            .name("synthetic-iq".to_string())
            .spawn({
                let generator = Arc::clone(&self.generator);
                let queue = Arc::clone(&queue);
                let open = Arc::clone(&self.open);
                move || capture_loop(generator, queue, open)
            })
            .map_err(|e| {
                self.open.store(false, Ordering::Release);
                DeviceError::Backend(format!("failed to spawn capture thread: {e}"))
            })?;
        *self.queue.lock().unwrap_or_else(PoisonError::into_inner) = Some(queue);
        *capture = Some(handle);
        tracing::info!("{}: opened ({} Hz)", self.name, self.tuning().sample_rate);
        Ok(())
    }

    fn close(&self) {
        let handle = self
            .capture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };
        self.open.store(false, Ordering::Release);
        if let Some(queue) = self.current_queue() {
            queue.close();
        }
        if handle.join().is_err() {
            tracing::error!("{}: capture thread panicked", self.name);
        }
        tracing::info!("{}: closed", self.name);
    }

    /// False once closed, and also once the generator is exhausted and
    /// its last samples have been read.
    fn is_open(&self) -> bool {
        if !self.open.load(Ordering::Acquire) {
            return false;
        }
        match self.current_queue() {
            Some(queue) => !(queue.is_closed() && queue.is_empty()),
            None => false,
        }
    }

    fn read(&self, buf: &mut [Complex<f32>]) -> usize {
        match self.current_queue() {
            Some(queue) if self.open.load(Ordering::Acquire) => queue.pop_into(buf),
            _ => 0,
        }
    }

    fn set_gain(&self, gain: f32) -> Result<(), DeviceError> {
        self.update_tuning(|t| t.gain = gain.clamp(0.0, 1.0));
        Ok(())
    }

    fn gain(&self) -> f32 {
        self.tuning().gain
    }

    fn set_sample_rate(&self, rate_hz: f64) -> Result<(), DeviceError> {
        if rate_hz <= 0.0 {
            return Err(DeviceError::Backend(format!("invalid sample rate {rate_hz}")));
        }
        self.update_tuning(|t| t.sample_rate = rate_hz);
        Ok(())
    }

    fn sample_rate(&self) -> f64 {
        self.tuning().sample_rate
    }

    fn set_center_frequency(&self, freq_hz: f64) -> Result<(), DeviceError> {
        self.update_tuning(|t| t.center_frequency = freq_hz);
        Ok(())
    }

    fn center_frequency(&self) -> f64 {
        self.tuning().center_frequency
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_device(limit: usize) -> SyntheticDevice {
        let mut next = 0usize;
        SyntheticDevice::new("counter", 48_000.0, move |buf: &mut [Complex<f32>]| {
            let n = buf.len().min(limit - next);
            for s in &mut buf[..n] {
                *s = Complex::new(next as f32, 0.0);
                next += 1;
            }
            n
        })
        .with_queue_capacity(256)
    }

    #[test]
    fn reads_generated_samples_in_order() {
        let dev = counter_device(10_000);
        dev.open().expect("open");
        let mut got = Vec::new();
        let mut buf = vec![Complex::new(0.0, 0.0); 300];
        while got.len() < 10_000 {
            let n = dev.read(&mut buf);
            assert!(n > 0);
            got.extend(buf[..n].iter().map(|s| s.re as usize));
        }
        assert!(got.into_iter().eq(0..10_000));
        dev.close();
        assert!(!dev.is_open());
    }

    #[test]
    fn exhausted_generator_drains_then_reads_zero() {
        let dev = counter_device(100);
        dev.open().expect("open");
        let mut buf = vec![Complex::new(0.0, 0.0); 64];
        let mut total = 0;
        loop {
            let n = dev.read(&mut buf);
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, 100);
        assert!(!dev.is_open());
        dev.close();
        dev.open().expect("reopen after exhaustion");
        dev.close();
    }

    #[test]
    fn close_releases_blocked_capture_thread() {
        let dev = SyntheticDevice::silence(1_000.0).with_queue_capacity(16);
        dev.open().expect("open");
        // Nobody reads, so the capture thread is parked on a full queue.
        std::thread::sleep(std::time::Duration::from_millis(20));
        dev.close();
        assert!(!dev.is_open());
        let mut buf = [Complex::new(0.0, 0.0); 4];
        assert_eq!(dev.read(&mut buf), 0);
    }

    #[test]
    fn reopen_after_close() {
        let dev = SyntheticDevice::silence(1_000.0).with_queue_capacity(64);
        dev.open().expect("open");
        assert!(dev.open().is_err());
        dev.close();
        dev.open().expect("reopen");
        let mut buf = [Complex::new(1.0, 1.0); 8];
        assert!(dev.read(&mut buf) > 0);
        dev.close();
    }

    #[test]
    fn tuning_round_trips() {
        let dev = SyntheticDevice::silence(2_048_000.0);
        dev.set_gain(1.7).expect("gain");
        assert_eq!(dev.gain(), 1.0);
        dev.set_center_frequency(88.7e6).expect("freq");
        assert_eq!(dev.center_frequency(), 88.7e6);
        assert!(dev.set_sample_rate(0.0).is_err());
        assert_eq!(dev.sample_rate(), 2_048_000.0);
    }
}
