// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

/// Turns resampled audio blocks into bytes for a transport or recorder.
pub trait Encoder: Send {
    /// Encode one block; `out` may be called any number of times.
    fn encode(&mut self, samples: &[f32], out: &mut dyn FnMut(&[u8]));
}

/// Signed 16-bit little-endian PCM, clipped to full scale.
#[derive(Debug, Default)]
pub struct Pcm16Encoder {
    buf: Vec<u8>,
}

impl Pcm16Encoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Encoder for Pcm16Encoder {
    fn encode(&mut self, samples: &[f32], out: &mut dyn FnMut(&[u8])) {
        self.buf.clear();
        self.buf.reserve(samples.len() * 2);
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
        out(&self.buf);
    }
}
