//! Stage property tests
//!
//! Parameter tables over the individual stages and the full chain.

use approx::assert_abs_diff_eq;
use test_case::test_case;

use masterchain::dsp::{
    measure_integrated_loudness, Compressor, CompressorParams, Limiter, LoudnessNormalizer,
    MasteringStage, NoiseReducer, SpectralShaper, SAFETY_CLIP,
};
use masterchain::engine::{db_to_linear, AudioBuffer};
use masterchain::{DenoiseStrength, MasteringPipeline, PresetStore};

/// Two seconds of low-level hiss with a one-second 330 Hz tone in the middle
fn tone_burst(rate: u32) -> AudioBuffer {
    let len = 2 * rate as usize;
    let mut state = 12345u32;
    let mut samples: Vec<f32> = (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * 0.01
        })
        .collect();
    let tone = AudioBuffer::sine_wave(330.0, 0.3, 1.0, rate);
    for (s, t) in samples[len / 4..].iter_mut().zip(tone.samples()) {
        *s += t;
    }
    AudioBuffer::new(samples, rate).unwrap()
}

#[test_case(-24.0 ; "very deep ceiling")]
#[test_case(-12.0 ; "deep ceiling")]
#[test_case(-1.0 ; "broadcast ceiling")]
#[test_case(-0.5 ; "default ceiling")]
#[test_case(0.0 ; "full scale ceiling")]
fn limiter_bounds_output(ceiling_db: f32) {
    let limiter = Limiter::new(ceiling_db);
    let input = AudioBuffer::sine_wave(100.0, 3.0, 0.2, 44100);

    let once = limiter.process(&input).unwrap();
    let twice = limiter.process(&once).unwrap();

    assert!(once.peak() <= db_to_linear(ceiling_db).min(SAFETY_CLIP) + 1e-5);
    assert_eq!(once.samples(), twice.samples());
}

#[test_case(-23.0, 44100 ; "ebu at 44k1")]
#[test_case(-16.0, 48000 ; "podcast at 48k")]
#[test_case(-14.0, 22050 ; "streaming at 22k05")]
fn normalizer_lands_within_half_lu(target: f32, rate: u32) {
    let input = AudioBuffer::sine_wave(500.0, 0.2, 1.5, rate);
    let output = LoudnessNormalizer::new(target).process(&input).unwrap();
    let measured = measure_integrated_loudness(&output).unwrap();
    assert_abs_diff_eq!(measured, target as f64, epsilon = 0.5);
}

#[test_case(1 ; "single sample")]
#[test_case(2047 ; "just under one window")]
#[test_case(2048 ; "exactly one window")]
#[test_case(44_101 ; "odd length")]
fn stages_preserve_length(len: usize) {
    let samples: Vec<f32> = (0..len).map(|i| ((i as f32) * 0.013).sin() * 0.6).collect();
    let input = AudioBuffer::new(samples, 44100).unwrap();

    let stages: Vec<Box<dyn MasteringStage>> = vec![
        Box::new(NoiseReducer::new(DenoiseStrength::Medium)),
        Box::new(SpectralShaper::new()),
        Box::new(Compressor::new()),
        Box::new(Limiter::default()),
    ];
    for stage in stages {
        let output = stage.process(&input).unwrap();
        assert_eq!(output.len(), len, "{} changed length", stage.display_name());
        assert_eq!(output.sample_rate(), 44100);
    }
}

#[test_case(DenoiseStrength::Off ; "off")]
#[test_case(DenoiseStrength::Auto ; "auto")]
#[test_case(DenoiseStrength::Medium ; "medium")]
#[test_case(DenoiseStrength::High ; "high")]
fn silence_never_fails(strength: DenoiseStrength) {
    let input = AudioBuffer::silence(1.0, 16000);
    let denoised = NoiseReducer::new(strength).process(&input).unwrap();
    assert!(denoised.is_silent());

    let pipeline = MasteringPipeline::new();
    let config = pipeline
        .presets()
        .resolve("master_auto")
        .with_denoise_strength(strength);
    assert!(pipeline.process(&input, &config).unwrap().is_silent());
}

#[test_case(2.0 ; "gentle")]
#[test_case(3.5 ; "default")]
#[test_case(8.0 ; "heavy")]
fn compressor_settles_at_ratio(ratio: f32) {
    let comp = Compressor::with_params(CompressorParams {
        ratio,
        ..Default::default()
    });
    // 0.5 peak square wave: RMS -6.02 dBFS, 11.98 dB over the default threshold
    let mut samples: Vec<f32> = (0..44100).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
    let trace = comp.compress_in_place(&mut samples, 44100);

    let over = -18.0 - 20.0 * 0.5_f32.log10();
    let expected = db_to_linear(over * (1.0 - 1.0 / ratio));
    assert_abs_diff_eq!(*trace.last().unwrap(), expected, epsilon = 1e-3);
}

#[test_case("master_auto" ; "default preset")]
#[test_case("podcast_voice" ; "voice preset")]
#[test_case("music_track" ; "music preset")]
fn builtin_presets_master_cleanly(name: &str) {
    let store = PresetStore::with_defaults();
    let config = store.resolve(name);
    let input = tone_burst(44100);

    let (output, report) = MasteringPipeline::new()
        .process_with_report(&input, &config)
        .unwrap();

    assert!(report.is_clean(), "{}", report);
    let lufs = measure_integrated_loudness(&output).unwrap();
    assert_abs_diff_eq!(lufs, config.target_loudness as f64, epsilon = 0.5);
    assert!(output.peak() <= db_to_linear(config.ceiling_db) + 1e-5);
}
