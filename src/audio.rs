//! WAV input and output.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::AudioError;

/// Sample rate reference recordings are resampled to before conditioning.
pub const REFERENCE_SAMPLE_RATE: u32 = 16000;

const RESAMPLE_CHUNK: usize = 1024;

/// Load a WAV file as mono f32 samples at `target_sample_rate`.
///
/// Multi-channel input is averaged down to one channel; integer PCM is
/// normalised to [-1.0, 1.0]. Rates other than the target are converted with
/// a band-limited sinc resampler.
pub fn load_audio(path: &Path, target_sample_rate: u32) -> Result<Vec<f32>, AudioError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::Unsupported(format!(
            "{}: zero channels",
            path.display()
        )));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(AudioError::Unsupported(format!(
                    "{}: {} bits per sample",
                    path.display(),
                    spec.bits_per_sample
                )));
            }
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = downmix(&interleaved, spec.channels as usize);
    log::debug!(
        "Loaded {} ({} Hz, {} ch, {} frames)",
        path.display(),
        spec.sample_rate,
        spec.channels,
        mono.len()
    );

    resample(&mono, spec.sample_rate, target_sample_rate)
}

/// Write mono samples to a 32-bit float WAV file.
pub fn save_audio(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Convert mono `samples` from `from_rate` to `to_rate`.
///
/// The output is trimmed by the filter delay, so it is time-aligned with the
/// input and holds `len * to_rate / from_rate` samples (rounded).
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(AudioError::Unsupported(format!(
            "cannot resample {from_rate} Hz to {to_rate} Hz"
        )));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + resampler.output_frames_max());

    let mut chunks = samples.chunks_exact(RESAMPLE_CHUNK);
    for chunk in &mut chunks {
        let frames = resampler
            .process(std::slice::from_ref(&chunk), None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&frames[0]);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let frames = resampler
            .process_partial(Some(std::slice::from_ref(&rest)), None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&frames[0]);
    }
    // Flush the filter tail.
    while output.len() < expected + delay {
        let frames = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if frames[0].is_empty() {
            break;
        }
        output.extend_from_slice(&frames[0]);
    }

    let end = (delay + expected).min(output.len());
    Ok(output[delay.min(end)..end].to_vec())
}
