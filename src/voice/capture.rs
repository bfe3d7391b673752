//! Microphone input for the recognizer
//!
//! [`AudioCapture`] records 16kHz mono from the default input device into a
//! bounded buffer that the capture thread drains every tick and feeds to the
//! utterance segmenter.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Rate the transcription API expects
pub const SAMPLE_RATE: u32 = 16000;

/// Samples kept when nobody drains the buffer (30 seconds)
const MAX_BUFFERED: usize = SAMPLE_RATE as usize * 30;

type SharedSamples = Arc<Mutex<VecDeque<f32>>>;

/// Records the default microphone
///
/// The cpal stream is not `Send`, so a capture must stay on the thread that
/// created it.
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    samples: SharedSamples,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default microphone at [`SAMPLE_RATE`]
    ///
    /// Devices without a mono mode are opened with their first channel count
    /// that supports the rate and mixed down.
    ///
    /// # Errors
    ///
    /// Returns a permission error if there is no microphone, or an audio
    /// error if it cannot record at 16kHz
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Permission("no microphone available".to_string()))?;

        let rate = SampleRate(SAMPLE_RATE);
        let mut ranges: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
            .collect();
        ranges.sort_by_key(cpal::SupportedStreamConfigRange::channels);

        let config = ranges
            .into_iter()
            .next()
            .ok_or_else(|| Error::Audio("microphone cannot record at 16kHz".to_string()))?
            .with_sample_rate(rate)
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "microphone opened"
        );

        Ok(Self {
            device,
            config,
            samples: Arc::default(),
            stream: None,
        })
    }

    /// Begin recording; calling it again while recording does nothing
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built or started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let samples = Arc::clone(&self.samples);
        let channels = usize::from(self.config.channels.max(1));
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    append_mono(&samples, data, channels);
                },
                |err| tracing::error!(error = %err, "microphone stream error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);
        tracing::debug!("microphone recording");
        Ok(())
    }

    /// Stop recording and release the device stream
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("microphone released");
        }
    }

    /// Remove and return everything recorded since the last drain
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        lock(&self.samples).drain(..).collect()
    }

    /// Copy of the buffered samples, left in place
    #[must_use]
    pub fn snapshot(&self) -> Vec<f32> {
        lock(&self.samples).iter().copied().collect()
    }

    pub fn clear(&self) {
        lock(&self.samples).clear();
    }
}

fn lock(samples: &SharedSamples) -> std::sync::MutexGuard<'_, VecDeque<f32>> {
    samples.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Average interleaved frames to mono and append, dropping the oldest
/// samples past [`MAX_BUFFERED`]
#[allow(clippy::cast_precision_loss)]
fn append_mono(samples: &SharedSamples, data: &[f32], channels: usize) {
    let mut buffer = lock(samples);
    if channels == 1 {
        buffer.extend(data);
    } else {
        buffer.extend(
            data.chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
        );
    }

    let excess = buffer.len().saturating_sub(MAX_BUFFERED);
    buffer.drain(..excess);
}

/// Root-mean-square level of a block, 0.0 for an empty block
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let power = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    power.sqrt()
}

/// Encode mono samples as a 16-bit PCM WAV file for upload
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_error = |e: hound::Error| Error::Audio(format!("WAV encoding failed: {e}"));

    let mut wav = std::io::Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut wav, spec).map_err(wav_error)?;
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let pcm = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(pcm).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;

    Ok(wav.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_of_silence_and_tone() {
        assert!(rms_energy(&[0.0; 100]) < 0.001);
        assert!(rms_energy(&[0.5; 100]) > 0.4);
        assert!(rms_energy(&[]).abs() < f32::EPSILON);
    }

    #[test]
    fn wav_has_riff_header() {
        let wav = samples_to_wav(&[0.0; 160], SAMPLE_RATE).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header plus 2 bytes per sample
        assert_eq!(wav.len(), 44 + 320);
    }

    #[test]
    fn stereo_frames_are_mixed_down() {
        let samples = SharedSamples::default();
        append_mono(&samples, &[0.2, 0.4, -1.0, 1.0], 2);

        let mono: Vec<f32> = lock(&samples).iter().copied().collect();
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!(mono[1].abs() < 1e-6);
    }

    #[test]
    fn buffer_keeps_only_the_newest_samples() {
        let samples = SharedSamples::default();
        append_mono(&samples, &vec![0.0; MAX_BUFFERED], 1);
        append_mono(&samples, &[0.5; 10], 1);

        let buffer = lock(&samples);
        assert_eq!(buffer.len(), MAX_BUFFERED);
        assert!((buffer[MAX_BUFFERED - 1] - 0.5).abs() < f32::EPSILON);
    }
}
