use std::fmt;
use std::path::PathBuf;

use crate::request::Mode;

/// Errors raised while reading or writing WAV audio.
#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported WAV layout: {0}")]
    Unsupported(String),
    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Errors raised by a synthesis engine backend.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Model directory not found: {}", .0.display())]
    ModelDirMissing(PathBuf),
    #[error("Failed to launch inference worker `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Inference worker exited with code {code:?}: {stderr}")]
    Worker { code: Option<i32>, stderr: String },
    #[error("Malformed worker response: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("{0}")]
    Other(String),
}

/// Where in the synthesis pipeline an engine failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadModel,
    LoadReference,
    Inference,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::LoadModel => "model loading",
            Stage::LoadReference => "reference audio loading",
            Stage::Inference => "inference",
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SynthesisError {
    #[error("Model not loaded. Call load_model() first.")]
    ModelNotLoaded,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("{}", describe_missing_reference(.mode, .path))]
    MissingReference { mode: Mode, path: Option<PathBuf> },
    #[error("Engine failure during {stage}: {source}")]
    EngineFailure {
        stage: Stage,
        #[source]
        source: EngineError,
    },
    #[error("Failed to write {}: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: AudioError,
    },
}

impl SynthesisError {
    /// Process exit code for this failure: 1 precondition, 2 engine, 3 I/O.
    pub fn exit_code(&self) -> u8 {
        match self {
            SynthesisError::ModelNotLoaded
            | SynthesisError::InvalidRequest(_)
            | SynthesisError::MissingReference { .. } => 1,
            SynthesisError::EngineFailure { .. } => 2,
            SynthesisError::WriteFailure { .. } => 3,
        }
    }

    /// Precondition failures are reported before any side effect and can be
    /// retried with a corrected request.
    pub fn is_precondition(&self) -> bool {
        self.exit_code() == 1
    }
}

fn describe_missing_reference(mode: &Mode, path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!("Voice reference not found: {}", path.display()),
        None => format!("{mode} mode requires a voice reference audio file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_taxonomy() {
        assert_eq!(SynthesisError::ModelNotLoaded.exit_code(), 1);
        assert_eq!(SynthesisError::InvalidRequest("x".into()).exit_code(), 1);
        let engine = SynthesisError::EngineFailure {
            stage: Stage::Inference,
            source: EngineError::Other("boom".into()),
        };
        assert_eq!(engine.exit_code(), 2);
        let write = SynthesisError::WriteFailure {
            path: PathBuf::from("out.wav"),
            source: AudioError::Unsupported("x".into()),
        };
        assert_eq!(write.exit_code(), 3);
    }

    #[test]
    fn missing_reference_message_names_the_path() {
        let err = SynthesisError::MissingReference {
            mode: Mode::ZeroShot,
            path: Some(PathBuf::from("asset/prompt.wav")),
        };
        assert!(err.to_string().contains("asset/prompt.wav"));

        let err = SynthesisError::MissingReference {
            mode: Mode::Instruct,
            path: None,
        };
        assert!(err.to_string().starts_with("instruct mode"));
    }
}
