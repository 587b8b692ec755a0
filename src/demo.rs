//! Canned requests for showcasing and smoke-testing a loaded model.

use crate::config::Settings;
use crate::request::SynthesisRequest;
use crate::synthesizer::{AudioArtifact, Synthesizer};
use crate::{SynthesisEngine, SynthesisError};

/// Text used by the smoke test when no reference prompt is available.
pub const SMOKE_TEXT: &str = "你好，我是通义生成式语音大模型，请问有什么可以帮您的吗？";

/// Text spoken in the cloned voice when the reference prompt exists.
pub const SMOKE_ZERO_SHOT_TEXT: &str =
    "收到好友从远方寄来的生日礼物，那份意外的惊喜与深深的祝福让我心中充满了甜蜜的快乐。";

/// A labelled request from the showcase.
#[derive(Debug, Clone)]
pub struct Example {
    pub title: &'static str,
    pub request: SynthesisRequest,
}

pub fn showcase() -> Vec<Example> {
    vec![
        Example {
            title: "Basic Chinese synthesis",
            request: SynthesisRequest::basic("你好，歡迎使用 CosyVoice 語音合成系統。"),
        },
        Example {
            title: "English synthesis",
            request: SynthesisRequest::basic(
                "Hello, this is a text-to-speech synthesis demonstration.",
            ),
        },
        Example {
            title: "Expressive synthesis",
            request: SynthesisRequest::basic("我特別喜歡這個產品，它真的很棒！"),
        },
    ]
}

/// Zero-shot with the bundled prompt when it exists, otherwise default voice.
pub fn smoke_request(settings: &Settings) -> SynthesisRequest {
    let reference = &settings.reference;
    if reference.path.is_file() {
        SynthesisRequest::zero_shot(
            SMOKE_ZERO_SHOT_TEXT,
            &reference.path,
            reference.transcript.clone(),
        )
    } else {
        log::warn!(
            "Reference prompt {} not found, falling back to default voice",
            reference.path.display()
        );
        SynthesisRequest::basic(SMOKE_TEXT)
    }
}

/// Run each example in order. A failing example does not stop the rest.
pub fn run_examples<E: SynthesisEngine>(
    synth: &mut Synthesizer<E>,
    examples: &[Example],
) -> Vec<Result<Vec<AudioArtifact>, SynthesisError>> {
    examples
        .iter()
        .map(|example| {
            log::info!("Example: {}", example.title);
            let result = synth.synthesize(&example.request);
            if let Err(e) = &result {
                log::warn!("{} failed: {e}", example.title);
            }
            result
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Mode;
    use tempfile::tempdir;

    #[test]
    fn showcase_is_all_default_voice() {
        let examples = showcase();
        assert_eq!(examples.len(), 3);
        assert!(examples.iter().all(|e| e.request.mode == Mode::Basic));
    }

    #[test]
    fn smoke_uses_reference_only_when_present() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.reference.path = dir.path().join("zero_shot_prompt.wav");

        assert_eq!(smoke_request(&settings).mode, Mode::Basic);

        std::fs::write(&settings.reference.path, b"RIFF").unwrap();
        let request = smoke_request(&settings);
        assert_eq!(request.mode, Mode::ZeroShot);
        assert_eq!(
            request.voice_reference_transcript.as_deref(),
            Some("希望你以后能够做的比我还好呦。")
        );
    }
}
