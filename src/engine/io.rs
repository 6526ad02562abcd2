//! Audio codec collaborators
//!
//! The mastering core only sees mono `f32` samples. Getting them out of a
//! container and back in is the job of a `Decoder` / `Encoder` pair; the
//! WAV implementation here is what the CLI uses. Decoding mixes any number
//! of channels down to mono. Encoding always writes 24-bit PCM.

use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;

use crate::engine::buffer::AudioBuffer;
use crate::error::{MasteringError, Result};

/// Bit depth written by `WavCodec`
pub const OUTPUT_BIT_DEPTH: u16 = 24;

/// Turns container bytes into a mono signal
pub trait Decoder {
    /// Decode `bytes`; `format_hint` is a file extension such as "wav"
    fn decode(&self, bytes: &[u8], format_hint: &str) -> Result<AudioBuffer>;
}

/// Turns a mono signal into container bytes
pub trait Encoder {
    fn encode(&self, buffer: &AudioBuffer) -> Result<Vec<u8>>;
}

/// WAV decoder/encoder backed by `hound`
#[derive(Debug, Clone, Copy, Default)]
pub struct WavCodec;

impl Decoder for WavCodec {
    fn decode(&self, bytes: &[u8], format_hint: &str) -> Result<AudioBuffer> {
        let hint = format_hint.trim_start_matches('.').to_ascii_lowercase();
        if !hint.is_empty() && hint != "wav" && hint != "wave" {
            return Err(MasteringError::UnsupportedFormat { format: hint });
        }

        let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| MasteringError::AudioRead {
            reason: format!("Failed to open WAV data: {}", e),
            source: Some(e),
        })?;

        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;
        debug!(
            "Decoding WAV: {} Hz, {} ch, {}-bit {:?}",
            spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format
        );

        let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
        let mono = mixdown(&interleaved, channels);

        AudioBuffer::new(mono, spec.sample_rate)
    }
}

impl Encoder for WavCodec {
    fn encode(&self, buffer: &AudioBuffer) -> Result<Vec<u8>> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: OUTPUT_BIT_DEPTH,
            sample_format: SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer =
                WavWriter::new(&mut cursor, spec).map_err(|e| MasteringError::AudioWrite {
                    reason: "Failed to create WAV writer".to_string(),
                    source: Some(e),
                })?;

            for &sample in buffer.samples() {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer
                    .write_sample(scaled)
                    .map_err(|e| MasteringError::AudioWrite {
                        reason: "Failed to write sample".to_string(),
                        source: Some(e),
                    })?;
            }

            writer.finalize().map_err(|e| MasteringError::AudioWrite {
                reason: "Failed to finalize WAV data".to_string(),
                source: Some(e),
            })?;
        }

        Ok(cursor.into_inner())
    }
}

/// Read and decode an audio file, using its extension as the format hint
pub fn import_audio(path: &Path, decoder: &dyn Decoder) -> Result<AudioBuffer> {
    let bytes = std::fs::read(path)?;
    let hint = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    decoder.decode(&bytes, hint)
}

/// Encode a buffer and write it to `path`
pub fn export_audio(buffer: &AudioBuffer, path: &Path, encoder: &dyn Encoder) -> Result<()> {
    let bytes = encoder.encode(buffer)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

// ============================================================================
// Internal helper functions
// ============================================================================

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let read_err = |bits: &str, e: hound::Error| MasteringError::AudioRead {
        reason: format!("Failed to read {} samples: {}", bits, e),
        source: Some(e),
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| read_err("float", e)),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| read_err("8-bit", e)),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| read_err("16-bit", e)),
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| read_err("24-bit", e)),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| read_err("32-bit int", e)),
            _ => Err(MasteringError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits_per_sample),
            }),
        },
    }
}

/// Average interleaved channels down to a single channel
fn mixdown(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stereo_wav_bytes(left: f32, right: f32, frames: usize) -> Vec<u8> {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..frames {
                writer.write_sample((left * 32767.0) as i16).unwrap();
                writer.write_sample((right * 32767.0) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_mixes_stereo_to_mono() {
        let bytes = stereo_wav_bytes(0.5, -0.25, 100);
        let buffer = WavCodec.decode(&bytes, "wav").unwrap();
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.sample_rate(), 48000);
        assert!((buffer.samples()[10] - 0.125).abs() < 1e-3);
    }

    #[test]
    fn test_decode_rejects_other_formats() {
        let err = WavCodec.decode(&[0u8; 16], "mp3").unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_decode_garbage_is_read_error() {
        let err = WavCodec.decode(b"not a wav file at all", "wav").unwrap_err();
        assert_eq!(err.error_code(), "AUDIO_READ");
    }

    #[test]
    fn test_encode_writes_24_bit_mono() {
        let buffer = AudioBuffer::sine_wave(440.0, 0.5, 0.1, 44100);
        let bytes = WavCodec.encode(&buffer).unwrap();

        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 24);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(reader.len() as usize, buffer.len());
    }

    #[test]
    fn test_file_round_trip_keeps_levels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let buffer = AudioBuffer::sine_wave(440.0, 0.8, 0.25, 44100);

        export_audio(&buffer, &path, &WavCodec).unwrap();
        let loaded = import_audio(&path, &WavCodec).unwrap();

        assert_eq!(loaded.len(), buffer.len());
        assert!((loaded.peak() - buffer.peak()).abs() < 1e-4);
    }
}
