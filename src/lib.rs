//! # tts-harness
//!
//! A harness around zero-shot text-to-speech engines: it validates synthesis
//! requests, drives the engine, and writes each returned segment to a uniquely
//! named WAV file. It also ships the surrounding tooling: environment probing,
//! model downloads and an interactive menu shell.
//!
//! ## Features
//!
//! - **Three synthesis modes**: default voice, zero-shot voice cloning, and
//!   instruction-conditioned synthesis
//! - **Collision-free artifacts**: `<mode>_<disambiguator>_<segment>.wav`
//! - **Pluggable engines**: anything implementing [`SynthesisEngine`]
//! - **Model hub downloads** (feature `hub`): fetch-if-absent with per-model
//!   failure isolation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tts_harness::{engines::worker::WorkerEngine, Synthesizer, SynthesisRequest};
//!
//! let mut synth = Synthesizer::new(WorkerEngine::default(), "output");
//! synth.load_model(Path::new("pretrained_models/CosyVoice2-0.5B"), Default::default())?;
//!
//! for artifact in synth.synthesize(&SynthesisRequest::basic("Hello, world!"))? {
//!     println!("{} ({:.2}s)", artifact.path.display(), artifact.duration_secs());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod acquire;
pub mod app;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod demo;
pub mod engines;
pub mod error;
#[cfg(feature = "hub")]
pub mod hub;
pub mod naming;
pub mod probe;
pub mod request;
pub mod shell;
pub mod synthesizer;

use std::path::Path;

pub use error::{AudioError, EngineError, Stage, SynthesisError};
pub use naming::NamingStrategy;
pub use request::{Mode, SynthesisRequest, SynthesisRequestBuilder};
pub use synthesizer::{AudioArtifact, LogObserver, SynthesisObserver, Synthesizer};

/// One block of audio returned by an engine.
///
/// Carries raw mono f32 samples; the sample rate belongs to the loaded model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioSegment {
    pub samples: Vec<f32>,
}

impl AudioSegment {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// Duration of the segment in seconds at the given rate.
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.samples.len() as f64 / sample_rate as f64
    }
}

/// Lazily produced, non-restartable sequence of segments from one engine call.
pub type Segments<'a> = Box<dyn Iterator<Item = Result<AudioSegment, EngineError>> + 'a>;

/// Common interface for zero-shot synthesis engines.
///
/// An engine holds at most one loaded model at a time. Loading replaces the
/// previous model; [`unload_model`](SynthesisEngine::unload_model) releases it.
pub trait SynthesisEngine {
    /// Parameters for configuring model loading.
    type ModelParams: Default;

    /// Load a model from the specified directory using default parameters.
    fn load_model(&mut self, model_path: &Path) -> Result<(), EngineError> {
        self.load_model_with_params(model_path, Self::ModelParams::default())
    }

    /// Load a model from the specified directory with custom parameters.
    fn load_model_with_params(
        &mut self,
        model_path: &Path,
        params: Self::ModelParams,
    ) -> Result<(), EngineError>;

    /// Unload the currently loaded model and free associated resources.
    fn unload_model(&mut self);

    fn is_loaded(&self) -> bool {
        self.sample_rate().is_some()
    }

    /// Output sample rate of the loaded model, `None` when nothing is loaded.
    fn sample_rate(&self) -> Option<u32>;

    /// Synthesize `text` in the voice of `prompt_audio` (16 kHz), whose
    /// transcript is `prompt_text`. Empty prompts select the default voice.
    fn infer_zero_shot(
        &mut self,
        text: &str,
        prompt_text: &str,
        prompt_audio: &[f32],
        stream: bool,
    ) -> Result<Segments<'_>, EngineError>;

    /// Synthesize `text` in the voice of `prompt_audio`, styled by `instruction`.
    fn infer_instruct(
        &mut self,
        text: &str,
        instruction: &str,
        prompt_audio: &[f32],
        stream: bool,
    ) -> Result<Segments<'_>, EngineError>;
}
