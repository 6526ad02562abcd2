//! Noise profile selection
//!
//! Finds the quietest half-second of a buffer so the noise reducer has a
//! sample of the background to learn from.

use crate::engine::AudioBuffer;

/// Length of a candidate profile frame in seconds
pub const PROFILE_FRAME_SECS: f64 = 0.5;

/// A borrowed window of the buffer taken as the noise reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseProfile<'a> {
    /// The profile samples
    pub samples: &'a [f32],
    /// Index of the first profile sample within the source buffer
    pub offset: usize,
    /// Mean absolute amplitude of the window
    pub energy: f32,
}

impl NoiseProfile<'_> {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn mean_abs(frame: &[f32]) -> f32 {
    frame.iter().map(|s| s.abs()).sum::<f32>() / frame.len() as f32
}

/// Select the lowest-energy complete 0.5 s frame of `buffer`
///
/// Frames are non-overlapping and start at multiples of the frame length;
/// a trailing partial frame is never a candidate. Ties go to the earliest
/// frame. Returns `None` when the buffer holds no complete frame, in which
/// case noise reduction runs blind.
pub fn select_noise_profile(buffer: &AudioBuffer) -> Option<NoiseProfile<'_>> {
    let frame_len = (buffer.sample_rate() as f64 * PROFILE_FRAME_SECS) as usize;
    if frame_len == 0 {
        return None;
    }

    let mut best: Option<NoiseProfile<'_>> = None;
    for (index, frame) in buffer.samples().chunks_exact(frame_len).enumerate() {
        let energy = mean_abs(frame);
        if best.map_or(true, |b| energy < b.energy) {
            best = Some(NoiseProfile {
                samples: frame,
                offset: index * frame_len,
                energy,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 8000;

    fn frames(levels: &[f32]) -> AudioBuffer {
        let frame_len = RATE as usize / 2;
        let samples = levels
            .iter()
            .flat_map(|&level| {
                (0..frame_len).map(move |i| if i % 2 == 0 { level } else { -level })
            })
            .collect();
        AudioBuffer::new(samples, RATE).unwrap()
    }

    #[test]
    fn test_picks_quietest_frame() {
        let buf = frames(&[0.5, 0.2, 0.05, 0.3]);
        let profile = select_noise_profile(&buf).unwrap();
        assert_eq!(profile.offset, 2 * 4000);
        assert_eq!(profile.len(), 4000);
        assert!((profile.energy - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_ties_go_to_first_frame() {
        let buf = frames(&[0.4, 0.1, 0.1]);
        assert_eq!(select_noise_profile(&buf).unwrap().offset, 4000);
    }

    #[test]
    fn test_short_buffer_has_no_profile() {
        let buf = AudioBuffer::new(vec![0.1; 3999], RATE).unwrap();
        assert!(select_noise_profile(&buf).is_none());
    }

    #[test]
    fn test_partial_trailing_frame_ignored() {
        // Quiet tail shorter than a frame must not be chosen
        let mut samples = vec![0.3; 8000];
        samples.extend(vec![0.0; 3000]);
        let buf = AudioBuffer::new(samples, RATE).unwrap();
        let profile = select_noise_profile(&buf).unwrap();
        assert_eq!(profile.offset, 0);
    }

    #[test]
    fn test_silence_is_a_valid_profile() {
        let buf = AudioBuffer::silence(1.0, RATE);
        let profile = select_noise_profile(&buf).unwrap();
        assert_eq!(profile.energy, 0.0);
        assert_eq!(profile.offset, 0);
    }
}
