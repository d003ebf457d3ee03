//! Audio playback
//!
//! Owns the cpal output stream on a dedicated thread, fed through a
//! bounded channel. A stalled output device blocks the writer instead of
//! dropping samples; transient bursts land in the socket's own buffer.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::log_error;

pub const SAMPLE_RATE: u32 = 48000;
pub const CHANNELS: u16 = 2;

/// Frames per hardware buffer requested from the device.
const FRAMES_PER_BUFFER: cpal::FrameCount = 1024;
/// Queued-sample ceiling; writers block above it rather than drop.
const MAX_QUEUED_SAMPLES: usize = FRAMES_PER_BUFFER as usize * CHANNELS as usize * 8;
/// In-flight chunks between the network reader and the playback thread.
const CHANNEL_DEPTH: usize = 64;

/// Handle to the playback thread; dropping it stops playback and
/// releases the output device.
pub struct AudioSink {
    tx: Sender<Vec<i16>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AudioSink {
    /// Open the default output device at the fixed stream format
    /// (i16, 2 channels, 48 kHz). No format negotiation takes place.
    pub fn open() -> Result<Self> {
        let (tx, rx) = bounded::<Vec<i16>>(CHANNEL_DEPTH);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();

        let handle = thread::spawn(move || playback_thread(rx, ready_tx, thread_running));

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                tx,
                running,
                handle: Some(handle),
            }),
            Ok(Err(e)) => Err(e.context("audio output unavailable")),
            Err(_) => Err(anyhow::anyhow!("audio playback thread died during startup")),
        }
    }

    pub fn writer(&self) -> SinkWriter {
        SinkWriter::new(self.tx.clone())
    }
}

impl Drop for AudioSink {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Write side handed to the streaming loop.
pub struct SinkWriter {
    tx: Sender<Vec<i16>>,
    carry: Option<u8>,
}

impl SinkWriter {
    pub(crate) fn new(tx: Sender<Vec<i16>>) -> Self {
        Self { tx, carry: None }
    }

    /// Queue PCM bytes for playback; blocks while the device catches up.
    /// A chunk ending mid-sample holds the dangling byte for the next
    /// call so sample framing survives arbitrary read boundaries.
    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let samples = self.frame(bytes);
        if samples.is_empty() {
            return Ok(());
        }
        self.tx
            .send(samples)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "audio playback stopped"))
    }

    /// Reassemble little-endian i16 samples from a byte chunk.
    fn frame(&mut self, bytes: &[u8]) -> Vec<i16> {
        let joined;
        let bytes = match self.carry.take() {
            Some(first) => {
                let mut buf = Vec::with_capacity(bytes.len() + 1);
                buf.push(first);
                buf.extend_from_slice(bytes);
                joined = buf;
                &joined[..]
            }
            None => bytes,
        };

        let mut pairs = bytes.chunks_exact(2);
        let samples: Vec<i16> = pairs
            .by_ref()
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        if let [dangling] = pairs.remainder() {
            self.carry = Some(*dangling);
        }
        samples
    }
}

fn playback_thread(rx: Receiver<Vec<i16>>, ready: Sender<Result<()>>, running: Arc<AtomicBool>) {
    let queue: Arc<Mutex<VecDeque<i16>>> =
        Arc::new(Mutex::new(VecDeque::with_capacity(MAX_QUEUED_SAMPLES)));

    let _stream = match open_stream(queue.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        let samples = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(samples) => samples,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        // Block here instead of dropping when the device falls behind.
        loop {
            if queue.lock().unwrap().len() + samples.len() <= MAX_QUEUED_SAMPLES {
                break;
            }
            if !running.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }

        queue.lock().unwrap().extend(samples);
    }
}

fn open_stream(queue: Arc<Mutex<VecDeque<i16>>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no audio output device found")?;

    let config = StreamConfig {
        channels: CHANNELS,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Fixed(FRAMES_PER_BUFFER),
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                let mut queue = queue.lock().unwrap();
                for sample in data.iter_mut() {
                    *sample = queue.pop_front().unwrap_or(0);
                }
            },
            |err| {
                log_error!("AUDIO", "Stream error: {}", err);
            },
            None,
        )
        .context("failed to build output stream")?;

    stream.play().context("failed to start playback")?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn frames_little_endian_samples() {
        let (tx, _rx) = bounded(1);
        let mut writer = SinkWriter::new(tx);
        assert_eq!(writer.frame(&[0x34, 0x12]), vec![0x1234]);
    }

    #[test]
    fn dangling_byte_carries_into_the_next_chunk() {
        let (tx, _rx) = bounded(1);
        let mut writer = SinkWriter::new(tx);
        assert_eq!(
            writer.frame(&[0x01, 0x02, 0x03]),
            vec![i16::from_le_bytes([0x01, 0x02])]
        );
        assert_eq!(writer.frame(&[0x04]), vec![i16::from_le_bytes([0x03, 0x04])]);
        assert_eq!(writer.frame(&[]), Vec::<i16>::new());
    }

    #[test]
    fn writes_are_queued_in_order() {
        let (tx, rx) = bounded(8);
        let mut writer = SinkWriter::new(tx);
        writer.write(&[1, 0, 2, 0]).unwrap();
        writer.write(&[3, 0]).unwrap();
        let samples: Vec<i16> = rx.try_iter().flatten().collect();
        assert_eq!(samples, vec![1, 2, 3]);
    }

    #[test]
    fn write_reports_a_stopped_sink() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let mut writer = SinkWriter::new(tx);
        assert!(writer.write(&[0, 0]).is_err());
    }
}
