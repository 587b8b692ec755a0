//! Wiring shared by the command line and the interactive shell.

use crate::acquire::{acquire, AcquisitionOutcome, AcquisitionStatus, ModelFetcher};
use crate::catalog::ModelCatalogEntry;
use crate::config::Settings;
use crate::demo;
use crate::engines::worker::WorkerEngine;
use crate::probe::{Probe, ProbeReport};
use crate::request::SynthesisRequest;
use crate::shell::ShellHandler;
use crate::synthesizer::{AudioArtifact, Synthesizer};
use crate::SynthesisError;

/// Settings plus the synthesizer, whose model is loaded on first use and
/// kept for the rest of the process.
pub struct App {
    settings: Settings,
    synth: Synthesizer<WorkerEngine>,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let synth = Synthesizer::new(
            WorkerEngine::new(settings.worker.clone()),
            settings.output_dir.clone(),
        )
        .with_naming(settings.naming);
        Self { settings, synth }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The synthesizer with the configured model loaded.
    pub fn synthesizer(&mut self) -> Result<&mut Synthesizer<WorkerEngine>, SynthesisError> {
        if !self.synth.is_loaded() {
            self.synth
                .load_model(&self.settings.model_dir(), self.settings.load.clone())?;
        }
        Ok(&mut self.synth)
    }

    pub fn synthesize(
        &mut self,
        request: &SynthesisRequest,
    ) -> Result<Vec<AudioArtifact>, SynthesisError> {
        self.synthesizer()?.synthesize(request)
    }

    pub fn probe(&self) -> Probe {
        let probe = Probe::new(&self.settings.worker.program)
            .packages(self.settings.required_packages.iter().cloned());
        self.settings.catalog.iter().fold(probe, |probe, entry| {
            probe.model_dir(
                entry.display_name.clone(),
                self.settings.model_root.join(&entry.local_directory),
            )
        })
    }

    pub fn download(&self, selection: &[usize]) -> Vec<AcquisitionOutcome> {
        match hub_fetcher(&self.settings) {
            Ok(fetcher) => acquire(
                selection,
                &self.settings.catalog,
                &self.settings.model_root,
                fetcher.as_ref(),
            ),
            Err(reason) => selection
                .iter()
                .filter_map(|&i| self.settings.catalog.get(i))
                .map(|entry| AcquisitionOutcome {
                    entry: entry.clone(),
                    status: AcquisitionStatus::Failed(reason.clone()),
                })
                .collect(),
        }
    }
}

#[cfg(feature = "hub")]
fn hub_fetcher(settings: &Settings) -> Result<Box<dyn ModelFetcher>, String> {
    crate::hub::ModelScopeFetcher::new(settings.hub.endpoint.clone(), settings.hub.attempts)
        .map(|f| Box::new(f) as Box<dyn ModelFetcher>)
        .map_err(|e| e.to_string())
}

#[cfg(not(feature = "hub"))]
fn hub_fetcher(_settings: &Settings) -> Result<Box<dyn ModelFetcher>, String> {
    Err("built without the `hub` feature; download models manually".to_string())
}

impl ShellHandler for App {
    fn banner(&self) -> Vec<String> {
        vec![
            format!("Model directory: {}", self.settings.model_root.display()),
            format!("Output directory: {}", self.settings.output_dir.display()),
            format!("Worker: {}", self.settings.worker.program.display()),
        ]
    }

    fn synthesize(&mut self, text: &str) -> Result<Vec<AudioArtifact>, SynthesisError> {
        App::synthesize(self, &SynthesisRequest::basic(text))
    }

    fn catalog(&self) -> &[ModelCatalogEntry] {
        &self.settings.catalog
    }

    fn download(&mut self, selection: &[usize]) -> Vec<AcquisitionOutcome> {
        App::download(self, selection)
    }

    fn showcase(&mut self) -> Vec<(&'static str, Result<Vec<AudioArtifact>, SynthesisError>)> {
        let examples = demo::showcase();
        match self.synthesizer() {
            Ok(synth) => {
                let results = demo::run_examples(synth, &examples);
                examples.iter().map(|e| e.title).zip(results).collect()
            }
            Err(e) => vec![("Load model", Err(e))],
        }
    }

    fn smoke_test(&mut self) -> Result<Vec<AudioArtifact>, SynthesisError> {
        let request = demo::smoke_request(&self.settings);
        App::synthesize(self, &request)
    }

    fn diagnose(&mut self) -> ProbeReport {
        self.probe().run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn settings_in(root: &std::path::Path) -> Settings {
        Settings {
            model_root: root.join("pretrained_models"),
            output_dir: root.join("output"),
            ..Settings::default()
        }
    }

    #[test]
    fn missing_model_fails_at_load_stage() {
        let dir = tempdir().unwrap();
        let mut app = App::new(settings_in(dir.path()));
        let err = app
            .synthesize(&SynthesisRequest::basic("hello"))
            .unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::EngineFailure {
                stage: crate::Stage::LoadModel,
                ..
            }
        ));
        assert!(!dir.path().join("output").exists());
    }

    #[test]
    fn probe_covers_catalog_models() {
        let dir = tempdir().unwrap();
        let mut settings = settings_in(dir.path());
        settings.worker.program = PathBuf::from("tts-harness-no-such-python");
        std::fs::create_dir_all(settings.model_root.join("CosyVoice-300M")).unwrap();

        let report = App::new(settings).probe().run();
        assert_eq!(report.required_model_dirs.len(), 4);
        assert_eq!(report.found_models(), vec!["CosyVoice-300M"]);
    }

    #[cfg(feature = "hub")]
    #[test]
    fn present_models_skip_download() {
        let dir = tempdir().unwrap();
        let settings = settings_in(dir.path());
        for entry in &settings.catalog {
            std::fs::create_dir_all(settings.model_root.join(&entry.local_directory)).unwrap();
        }

        let outcomes = App::new(settings).download(&[0, 1]);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| o.status == AcquisitionStatus::AlreadyPresent));
    }
}
