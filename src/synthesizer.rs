use std::path::{Path, PathBuf};

use crate::audio::{load_audio, save_audio, REFERENCE_SAMPLE_RATE};
use crate::error::{Stage, SynthesisError};
use crate::naming::{ArtifactNamer, NamingStrategy};
use crate::request::{Mode, SynthesisRequest};
use crate::{AudioSegment, SynthesisEngine};

/// A synthesized segment persisted to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub sample_rate: u32,
    /// Position of the segment in the engine's output.
    pub segment_index: usize,
    pub num_samples: usize,
}

impl AudioArtifact {
    pub fn duration_secs(&self) -> f64 {
        self.num_samples as f64 / self.sample_rate as f64
    }
}

/// Receives progress notifications from [`Synthesizer::synthesize`].
pub trait SynthesisObserver {
    fn on_start(&mut self, _request: &SynthesisRequest) {}
    fn on_segments(&mut self, _count: usize) {}
    fn on_artifact(&mut self, _artifact: &AudioArtifact) {}
}

/// Reports progress through the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

impl SynthesisObserver for LogObserver {
    fn on_start(&mut self, request: &SynthesisRequest) {
        log::info!("Synthesizing ({}): {:?}", request.mode, request.text);
    }

    fn on_segments(&mut self, count: usize) {
        log::info!("Engine returned {count} segment(s)");
    }

    fn on_artifact(&mut self, artifact: &AudioArtifact) {
        log::info!(
            "Saved {} ({:.2}s @ {} Hz)",
            artifact.path.display(),
            artifact.duration_secs(),
            artifact.sample_rate
        );
    }
}

/// Drives a [`SynthesisEngine`] and materializes its output as WAV artifacts.
///
/// The synthesizer owns the engine, and with it the loaded model, for its
/// whole lifetime. The model is unloaded when the synthesizer is dropped.
pub struct Synthesizer<E: SynthesisEngine> {
    engine: E,
    output_dir: PathBuf,
    namer: ArtifactNamer,
    observer: Box<dyn SynthesisObserver>,
}

impl<E: SynthesisEngine> Synthesizer<E> {
    pub fn new(engine: E, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            output_dir: output_dir.into(),
            namer: ArtifactNamer::new(NamingStrategy::default()),
            observer: Box::new(LogObserver),
        }
    }

    pub fn with_naming(mut self, strategy: NamingStrategy) -> Self {
        self.namer = ArtifactNamer::new(strategy);
        self
    }

    pub fn with_observer(mut self, observer: impl SynthesisObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.is_loaded()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.engine.sample_rate()
    }

    pub fn load_model(
        &mut self,
        model_dir: &Path,
        params: E::ModelParams,
    ) -> Result<(), SynthesisError> {
        log::info!("Loading model from {}", model_dir.display());
        self.engine
            .load_model_with_params(model_dir, params)
            .map_err(|source| SynthesisError::EngineFailure {
                stage: Stage::LoadModel,
                source,
            })?;
        if let Some(rate) = self.engine.sample_rate() {
            log::info!("Model loaded (sample rate: {rate} Hz)");
        }
        Ok(())
    }

    pub fn unload_model(&mut self) {
        self.engine.unload_model();
    }

    /// Run one request and write every returned segment to the output directory.
    ///
    /// Preconditions are checked before the engine is touched. Artifacts
    /// already written when a later write fails are left in place.
    pub fn synthesize(
        &mut self,
        request: &SynthesisRequest,
    ) -> Result<Vec<AudioArtifact>, SynthesisError> {
        let sample_rate = self
            .engine
            .sample_rate()
            .ok_or(SynthesisError::ModelNotLoaded)?;
        validate(request)?;

        self.observer.on_start(request);

        let reference = match request.voice_reference_path.as_deref() {
            Some(path) if request.mode.needs_reference() => {
                load_audio(path, REFERENCE_SAMPLE_RATE).map_err(|e| {
                    SynthesisError::EngineFailure {
                        stage: Stage::LoadReference,
                        source: e.into(),
                    }
                })?
            }
            _ => Vec::new(),
        };

        let segments = self.run_engine(request, &reference)?;
        self.observer.on_segments(segments.len());

        std::fs::create_dir_all(&self.output_dir).map_err(|e| SynthesisError::WriteFailure {
            path: self.output_dir.clone(),
            source: e.into(),
        })?;
        let paths = self
            .namer
            .names_for_call(&self.output_dir, request.mode, segments.len())
            .map_err(|e| SynthesisError::WriteFailure {
                path: self.output_dir.clone(),
                source: e.into(),
            })?;

        let mut artifacts = Vec::with_capacity(segments.len());
        for (segment_index, (segment, path)) in segments.into_iter().zip(paths).enumerate() {
            save_audio(&path, &segment.samples, sample_rate).map_err(|source| {
                SynthesisError::WriteFailure {
                    path: path.clone(),
                    source,
                }
            })?;
            let artifact = AudioArtifact {
                path,
                sample_rate,
                segment_index,
                num_samples: segment.samples.len(),
            };
            self.observer.on_artifact(&artifact);
            artifacts.push(artifact);
        }

        Ok(artifacts)
    }

    fn run_engine(
        &mut self,
        request: &SynthesisRequest,
        reference: &[f32],
    ) -> Result<Vec<AudioSegment>, SynthesisError> {
        let text = request.text.as_str();
        let segments = match request.mode {
            Mode::Basic => self.engine.infer_zero_shot(text, "", &[], false),
            Mode::ZeroShot => {
                let transcript = request.voice_reference_transcript.as_deref().unwrap_or("");
                self.engine
                    .infer_zero_shot(text, transcript, reference, false)
            }
            Mode::Instruct => {
                let instruction = request.instruction.as_deref().unwrap_or("");
                self.engine
                    .infer_instruct(text, instruction, reference, false)
            }
        };

        segments
            .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
            .map_err(|source| SynthesisError::EngineFailure {
                stage: Stage::Inference,
                source,
            })
    }
}

impl<E: SynthesisEngine> Drop for Synthesizer<E> {
    fn drop(&mut self) {
        self.engine.unload_model();
    }
}

fn validate(request: &SynthesisRequest) -> Result<(), SynthesisError> {
    if request.text.trim().is_empty() {
        return Err(SynthesisError::InvalidRequest(
            "text must not be empty".to_string(),
        ));
    }

    if request.mode.needs_reference() {
        match request.voice_reference_path.as_deref() {
            Some(path) if path.is_file() => {}
            path => {
                return Err(SynthesisError::MissingReference {
                    mode: request.mode,
                    path: path.map(Path::to_path_buf),
                })
            }
        }
    }

    if request.mode == Mode::Instruct
        && request
            .instruction
            .as_deref()
            .map_or(true, |i| i.trim().is_empty())
    {
        return Err(SynthesisError::InvalidRequest(
            "instruct mode requires an instruction".to_string(),
        ));
    }

    Ok(())
}
