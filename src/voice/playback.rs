//! Audio playback to speakers

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

use super::engine::{AudioClip, AudioOutput, PlaybackHandle};

/// Poll interval while waiting for a clip to drain
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Plays clips on the default output device
///
/// Each `start` bumps a generation counter; the playback thread exits as soon
/// as the counter moves past its own generation, so `stop` always halts the
/// clip started before it. While paused the stream writes silence and the
/// read position does not advance.
#[derive(Clone, Default)]
pub struct CpalOutput {
    generation: Arc<AtomicU64>,
    paused: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Create an output bound to the host's default device
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self::default())
    }

    /// Play mono samples and wait for them to finish
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot play the samples
    pub async fn play_samples(&self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        self.start(AudioClip::Pcm {
            samples,
            sample_rate,
        })
        .finished()
        .await
    }
}

impl AudioOutput for CpalOutput {
    fn start(&self, clip: AudioClip) -> PlaybackHandle {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.paused.store(false, Ordering::SeqCst);

        let (done, handle) = PlaybackHandle::channel();
        let current = Arc::clone(&self.generation);
        let paused = Arc::clone(&self.paused);

        tokio::task::spawn_blocking(move || {
            let result = decode_clip(clip).and_then(|(samples, rate)| {
                play_blocking(&samples, rate, generation, &current, &paused)
            });
            let _ = done.send(result);
        });

        handle
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }
}

/// Turn a clip into mono samples and their sample rate
fn decode_clip(clip: AudioClip) -> Result<(Vec<f32>, u32)> {
    match clip {
        AudioClip::Pcm {
            samples,
            sample_rate,
        } => Ok((samples, sample_rate)),
        AudioClip::Mpeg(bytes) => decode_mp3(&bytes),
    }
}

/// Pick an output config that supports `sample_rate`, preferring mono
fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
        c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
    };

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| supports(c, 1))
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(|c| supports(c, 2))
        })
        .ok_or_else(|| Error::Audio(format!("no output config for {sample_rate} Hz")))?;

    Ok(supported.with_sample_rate(rate).config())
}

/// Play samples on a fresh stream, returning when drained or superseded
fn play_blocking(
    samples: &[f32],
    sample_rate: u32,
    generation: u64,
    current: &AtomicU64,
    paused: &Arc<AtomicBool>,
) -> Result<()> {
    if samples.is_empty() || current.load(Ordering::SeqCst) != generation {
        return Ok(());
    }

    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;
    let config = output_config(&device, sample_rate)?;
    let channels = config.channels as usize;

    let shared: Arc<Vec<f32>> = Arc::new(samples.to_vec());
    let position = Arc::new(AtomicUsize::new(0));
    let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let stream = {
        let shared = Arc::clone(&shared);
        let position = Arc::clone(&position);
        let paused = Arc::clone(paused);
        let failure = Arc::clone(&failure);

        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let is_paused = paused.load(Ordering::Relaxed);
                    let mut pos = position.load(Ordering::Relaxed);

                    for frame in data.chunks_mut(channels) {
                        let sample = if is_paused {
                            0.0
                        } else if let Some(&s) = shared.get(pos) {
                            pos += 1;
                            s
                        } else {
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }

                    position.store(pos, Ordering::Relaxed);
                },
                move |err| {
                    tracing::error!(error = %err, "audio playback error");
                    if let Ok(mut slot) = failure.lock() {
                        *slot = Some(err.to_string());
                    }
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Guard against a stalled device: allow twice the clip length of
    // unpaused time before giving up
    let clip_ms = (shared.len() as u64 * 1000) / u64::from(sample_rate.max(1));
    let budget = Duration::from_millis(clip_ms * 2 + 500);
    let mut played_for = Duration::ZERO;
    let mut last_tick = Instant::now();

    let outcome = loop {
        if current.load(Ordering::SeqCst) != generation {
            tracing::debug!("playback stopped");
            break Ok(());
        }
        if let Some(err) = failure.lock().ok().and_then(|mut slot| slot.take()) {
            break Err(Error::Playback(err));
        }
        if position.load(Ordering::Relaxed) >= shared.len() {
            // Let the device drain its last buffer
            std::thread::sleep(Duration::from_millis(100));
            tracing::debug!(samples = shared.len(), "playback complete");
            break Ok(());
        }

        let now = Instant::now();
        if !paused.load(Ordering::Relaxed) {
            played_for += now - last_tick;
        }
        last_tick = now;
        if played_for > budget {
            break Err(Error::Playback("playback timed out".to_string()));
        }

        std::thread::sleep(POLL_INTERVAL);
    };

    drop(stream);
    outcome
}

/// Decode MP3 bytes to mono f32 samples and the stream's sample rate
///
/// # Errors
///
/// Returns error if the data is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                }

                // Convert i16 samples to f32, averaging stereo to mono
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|pair| {
                        let left = f32::from(pair[0]) / 32768.0;
                        let right = f32::from(pair.get(1).copied().unwrap_or(pair[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Audio("MP3 stream contained no frames".to_string()));
    }

    Ok((samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_not_mp3() {
        assert!(decode_mp3(b"definitely not audio").is_err());
    }

    #[test]
    fn empty_input_has_no_frames() {
        assert!(matches!(decode_mp3(&[]), Err(Error::Audio(_))));
    }

    #[test]
    fn pcm_clip_passes_through() {
        let (samples, rate) = decode_clip(AudioClip::Pcm {
            samples: vec![0.1, 0.2],
            sample_rate: 22_050,
        })
        .unwrap();
        assert_eq!(samples, vec![0.1, 0.2]);
        assert_eq!(rate, 22_050);
    }

    #[test]
    fn superseded_clip_returns_without_touching_device() {
        let current = AtomicU64::new(2);
        let paused = Arc::new(AtomicBool::new(false));
        assert!(play_blocking(&[0.1; 10], 16_000, 1, &current, &paused).is_ok());
    }
}
