// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Audio output: AF gain plus a drop-when-full queue drained by the
//! playback callback.

use std::sync::Arc;

use crate::queue::DroppingQueue;

/// Destination for resampled audio. `play` is best effort and must not
/// block the reader thread.
pub trait AudioSink: Send {
    fn play(&mut self, samples: &[f32]);

    fn sample_rate(&self) -> u32;

    fn set_gain(&mut self, gain: f32);

    fn gain(&self) -> f32;
}

/// Default sink: scales by the AF gain and queues for a playback backend.
pub struct AudioOutput {
    queue: Arc<DroppingQueue<f32>>,
    sample_rate: u32,
    gain: f32,
    scratch: Vec<f32>,
    dropped: u64,
}

impl AudioOutput {
    pub fn new(sample_rate: u32, queue_capacity: usize, gain: f32) -> Self {
        Self {
            queue: Arc::new(DroppingQueue::new(queue_capacity)),
            sample_rate,
            gain,
            scratch: Vec::new(),
            dropped: 0,
        }
    }

    /// Consumer side for a playback callback.
    pub fn playback(&self) -> AudioPlayback {
        AudioPlayback {
            queue: Arc::clone(&self.queue),
            sample_rate: self.sample_rate,
        }
    }

    /// Samples discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl AudioSink for AudioOutput {
    fn play(&mut self, samples: &[f32]) {
        self.scratch.clear();
        self.scratch.extend(samples.iter().map(|s| s * self.gain));
        let accepted = self.queue.push_slice(&self.scratch);
        if accepted < samples.len() {
            let lost = (samples.len() - accepted) as u64;
            if self.dropped == 0 {
                tracing::warn!("audio queue full, dropping samples");
            }
            self.dropped += lost;
            tracing::trace!("audio overflow: {} dropped ({} total)", lost, self.dropped);
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
    }

    fn gain(&self) -> f32 {
        self.gain
    }
}

/// Read side of an [`AudioOutput`]. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct AudioPlayback {
    queue: Arc<DroppingQueue<f32>>,
    sample_rate: u32,
}

impl AudioPlayback {
    /// Fill `out` entirely, with silence past the queued samples. Returns
    /// the number of real samples.
    pub fn pull(&self, out: &mut [f32]) -> usize {
        self.queue.pop_into(out)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(feature = "cpal")]
pub use self::cpal_backend::CpalPlayback;

#[cfg(feature = "cpal")]
mod cpal_backend {
    use std::sync::mpsc;
    use std::thread::JoinHandle;

    use tracing::{info, warn};

    use super::AudioPlayback;
    use crate::error::EngineError;

    /// Owns a cpal output stream on its own thread; dropping stops it.
    pub struct CpalPlayback {
        stop: Option<mpsc::Sender<()>>,
        thread: Option<JoinHandle<()>>,
    }

    impl CpalPlayback {
        pub fn start(playback: AudioPlayback, device_name: Option<String>) -> Result<Self, EngineError> {
            let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
            let (stop_tx, stop_rx) = mpsc::channel::<()>();
            let thread = std::thread::Builder::new()
                .name("audio-playback".to_string())
                .spawn(move || {
                    match build_stream(&playback, device_name.as_deref()) {
                        Ok(stream) => {
                            let _ = ready_tx.send(Ok(()));
                            // Parked until the handle is dropped.
                            let _ = stop_rx.recv();
                            drop(stream);
                            info!("Audio playback: stopped");
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                        }
                    }
                })
                .map_err(EngineError::ThreadSpawn)?;
            match ready_rx.recv() {
                Ok(Ok(())) => Ok(Self {
                    stop: Some(stop_tx),
                    thread: Some(thread),
                }),
                Ok(Err(e)) => {
                    let _ = thread.join();
                    Err(EngineError::Audio(e))
                }
                Err(_) => {
                    let _ = thread.join();
                    Err(EngineError::Audio("playback thread exited".into()))
                }
            }
        }
    }

    fn build_stream(playback: &AudioPlayback, device_name: Option<&str>) -> Result<cpal::Stream, String> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = if let Some(name) = device_name {
            host.output_devices()
                .map_err(|e| e.to_string())?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| format!("audio output device '{}' not found", name))?
        } else {
            host.default_output_device()
                .ok_or("no default audio output device")?
        };
        let channels = device
            .default_output_config()
            .map(|c| c.channels())
            .unwrap_or(1)
            .max(1);

        info!(
            "Audio playback: using device '{}' ({} Hz, {} ch)",
            device.name().unwrap_or_else(|_| "unknown".into()),
            playback.sample_rate(),
            channels
        );

        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(playback.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };

        let source = playback.clone();
        let mut mono = Vec::<f32>::new();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels as usize;
                    mono.resize(frames, 0.0);
                    source.pull(&mut mono);
                    for (frame, &s) in data.chunks_mut(channels as usize).zip(mono.iter()) {
                        frame.fill(s);
                    }
                },
                |err| warn!("Audio output stream error: {}", err),
                None,
            )
            .map_err(|e| e.to_string())?;
        stream.play().map_err(|e| e.to_string())?;
        Ok(stream)
    }

    impl Drop for CpalPlayback {
        fn drop(&mut self) {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }
}
