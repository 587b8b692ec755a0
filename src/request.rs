use std::fmt;
use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Synthesis mode. Each variant maps to one engine entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Default-voice synthesis; no reference audio.
    #[default]
    Basic,
    /// Clone the voice of a reference recording.
    ZeroShot,
    /// Reference voice plus a natural-language style instruction.
    Instruct,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Basic => "basic",
            Mode::ZeroShot => "zero_shot",
            Mode::Instruct => "instruct",
        }
    }

    /// True for modes that condition on a reference recording.
    pub fn needs_reference(&self) -> bool {
        matches!(self, Mode::ZeroShot | Mode::Instruct)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One synthesis request.
///
/// ```rust
/// use tts_harness::{Mode, SynthesisRequestBuilder};
///
/// let request = SynthesisRequestBuilder::default()
///     .text("Hello there")
///     .mode(Mode::ZeroShot)
///     .voice_reference_path("asset/zero_shot_prompt.wav")
///     .voice_reference_transcript("Reference transcript.")
///     .build()?;
/// assert!(request.mode.needs_reference());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct SynthesisRequest {
    pub text: String,
    #[builder(default)]
    pub mode: Mode,
    #[builder(default, setter(into, strip_option))]
    pub voice_reference_path: Option<PathBuf>,
    #[builder(default, setter(into, strip_option))]
    pub voice_reference_transcript: Option<String>,
    #[builder(default, setter(into, strip_option))]
    pub instruction: Option<String>,
}

impl SynthesisRequest {
    pub fn basic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: Mode::Basic,
            voice_reference_path: None,
            voice_reference_transcript: None,
            instruction: None,
        }
    }

    pub fn zero_shot(
        text: impl Into<String>,
        reference: impl Into<PathBuf>,
        transcript: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            mode: Mode::ZeroShot,
            voice_reference_path: Some(reference.into()),
            voice_reference_transcript: Some(transcript.into()),
            instruction: None,
        }
    }

    pub fn instruct(
        text: impl Into<String>,
        instruction: impl Into<String>,
        reference: impl Into<PathBuf>,
    ) -> Self {
        Self {
            text: text.into(),
            mode: Mode::Instruct,
            voice_reference_path: Some(reference.into()),
            voice_reference_transcript: None,
            instruction: Some(instruction.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_basic_mode() {
        let request = SynthesisRequestBuilder::default()
            .text("hello")
            .build()
            .unwrap();
        assert_eq!(request, SynthesisRequest::basic("hello"));
    }

    #[test]
    fn builder_requires_text() {
        assert!(SynthesisRequestBuilder::default()
            .mode(Mode::Basic)
            .build()
            .is_err());
    }

    #[test]
    fn mode_names_match_artifact_prefixes() {
        assert_eq!(Mode::Basic.to_string(), "basic");
        assert_eq!(Mode::ZeroShot.to_string(), "zero_shot");
        assert_eq!(Mode::Instruct.to_string(), "instruct");
        assert!(!Mode::Basic.needs_reference());
    }
}
