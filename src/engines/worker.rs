use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::audio::{load_audio, save_audio, REFERENCE_SAMPLE_RATE};
use crate::{AudioSegment, EngineError, Segments, SynthesisEngine};

/// Parameters for configuring model loading in the worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerModelParams {
    pub load_jit: bool,
    pub load_trt: bool,
    pub fp16: bool,
}

/// How to launch the inference worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python3"),
            args: vec!["-m".to_string(), "cosyvoice_worker".to_string()],
        }
    }
}

/// Engine backed by an out-of-process inference worker.
///
/// Each call spawns the worker, writes one JSON request to its stdin and
/// reads one JSON reply from its stdout. Segment audio travels as WAV files
/// in a scratch directory that lives as long as the returned iterator.
///
/// ```text
/// -> {"op":"zero_shot","model_dir":"...","text":"...","prompt_text":"",
///     "prompt_wav":null,"stream":false,"out_dir":"/tmp/.tmpX", ...}
/// <- {"sample_rate":24000,"segments":["/tmp/.tmpX/0.wav"]}
/// ```
pub struct WorkerEngine {
    command: WorkerCommand,
    model: Option<LoadedModel>,
}

struct LoadedModel {
    model_dir: PathBuf,
    params: WorkerModelParams,
    sample_rate: u32,
}

impl Default for WorkerEngine {
    fn default() -> Self {
        Self::new(WorkerCommand::default())
    }
}

impl WorkerEngine {
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            command,
            model: None,
        }
    }

    pub fn command(&self) -> &WorkerCommand {
        &self.command
    }

    pub fn model_dir(&self) -> Option<&Path> {
        self.model.as_ref().map(|m| m.model_dir.as_path())
    }

    fn call(&self, request: &WorkerRequest<'_>) -> Result<WorkerReply, EngineError> {
        let payload = serde_json::to_vec(request)?;
        let program = self.command.program.display().to_string();
        log::debug!("Spawning inference worker `{program}`");

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: program.clone(),
                source,
            })?;

        // A worker that dies early breaks the pipe; its stderr says why.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin
                .write_all(&payload)
                .and_then(|()| stdin.write_all(b"\n")),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Worker {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        written?;

        // Workers may print progress before the reply; the reply is the last line.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| EngineError::Other("inference worker produced no reply".into()))?;
        Ok(serde_json::from_str(line)?)
    }

    fn infer(
        &mut self,
        op: Op,
        text: &str,
        prompt_text: &str,
        instruction: Option<&str>,
        prompt_audio: &[f32],
        stream: bool,
    ) -> Result<Segments<'_>, EngineError> {
        let model = self.model.as_ref().ok_or_else(|| {
            EngineError::Other("Model not loaded. Call load_model() first.".into())
        })?;

        let scratch = tempfile::tempdir()?;
        let prompt_wav = if prompt_audio.is_empty() {
            None
        } else {
            let path = scratch.path().join("prompt.wav");
            save_audio(&path, prompt_audio, REFERENCE_SAMPLE_RATE)?;
            Some(path)
        };

        let request = WorkerRequest {
            op,
            model_dir: &model.model_dir,
            load_jit: model.params.load_jit,
            load_trt: model.params.load_trt,
            fp16: model.params.fp16,
            text: Some(text),
            prompt_text: Some(prompt_text),
            instruction,
            prompt_wav: prompt_wav.as_deref(),
            stream,
            out_dir: Some(scratch.path()),
        };
        let reply = self.call(&request)?;
        if let Some(rate) = reply.sample_rate.filter(|&r| r != model.sample_rate) {
            log::debug!(
                "Worker replied at {rate} Hz, converting to the model rate {} Hz",
                model.sample_rate
            );
        }
        log::debug!("Worker returned {} segment file(s)", reply.segments.len());

        Ok(Box::new(SegmentFiles {
            _scratch: scratch,
            sample_rate: model.sample_rate,
            paths: reply.segments.into_iter(),
        }))
    }
}

impl Drop for WorkerEngine {
    fn drop(&mut self) {
        self.unload_model();
    }
}

impl SynthesisEngine for WorkerEngine {
    type ModelParams = WorkerModelParams;

    fn load_model_with_params(
        &mut self,
        model_path: &Path,
        params: Self::ModelParams,
    ) -> Result<(), EngineError> {
        if !model_path.is_dir() {
            return Err(EngineError::ModelDirMissing(model_path.to_path_buf()));
        }

        let reply = self.call(&WorkerRequest {
            op: Op::Info,
            model_dir: model_path,
            load_jit: params.load_jit,
            load_trt: params.load_trt,
            fp16: params.fp16,
            text: None,
            prompt_text: None,
            instruction: None,
            prompt_wav: None,
            stream: false,
            out_dir: None,
        })?;
        let sample_rate = reply
            .sample_rate
            .ok_or_else(|| EngineError::Other("worker did not report a sample rate".into()))?;

        self.model = Some(LoadedModel {
            model_dir: model_path.to_path_buf(),
            params,
            sample_rate,
        });
        Ok(())
    }

    fn unload_model(&mut self) {
        self.model = None;
    }

    fn sample_rate(&self) -> Option<u32> {
        self.model.as_ref().map(|m| m.sample_rate)
    }

    fn infer_zero_shot(
        &mut self,
        text: &str,
        prompt_text: &str,
        prompt_audio: &[f32],
        stream: bool,
    ) -> Result<Segments<'_>, EngineError> {
        self.infer(Op::ZeroShot, text, prompt_text, None, prompt_audio, stream)
    }

    fn infer_instruct(
        &mut self,
        text: &str,
        instruction: &str,
        prompt_audio: &[f32],
        stream: bool,
    ) -> Result<Segments<'_>, EngineError> {
        self.infer(Op::Instruct, text, "", Some(instruction), prompt_audio, stream)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
enum Op {
    Info,
    ZeroShot,
    Instruct,
}

#[derive(Debug, Serialize)]
struct WorkerRequest<'a> {
    op: Op,
    model_dir: &'a Path,
    load_jit: bool,
    load_trt: bool,
    fp16: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instruction: Option<&'a str>,
    prompt_wav: Option<&'a Path>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    out_dir: Option<&'a Path>,
}

#[derive(Debug, Deserialize)]
struct WorkerReply {
    sample_rate: Option<u32>,
    #[serde(default)]
    segments: Vec<PathBuf>,
}

/// Decodes the worker's segment files one at a time, at the rate the model
/// reported on load.
struct SegmentFiles {
    _scratch: TempDir,
    sample_rate: u32,
    paths: std::vec::IntoIter<PathBuf>,
}

impl Iterator for SegmentFiles {
    type Item = Result<AudioSegment, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        Some(
            load_audio(&path, self.sample_rate)
                .map(AudioSegment::new)
                .map_err(EngineError::from),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.paths.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_snake_case_op() {
        let request = WorkerRequest {
            op: Op::ZeroShot,
            model_dir: Path::new("pretrained_models/CosyVoice2-0.5B"),
            load_jit: false,
            load_trt: false,
            fp16: false,
            text: Some("hello"),
            prompt_text: Some(""),
            instruction: None,
            prompt_wav: None,
            stream: false,
            out_dir: None,
        };
        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["op"], "zero_shot");
        assert_eq!(json["text"], "hello");
        assert!(json["prompt_wav"].is_null());
        assert!(json.get("instruction").is_none());
    }

    #[test]
    fn reply_tolerates_missing_segments() {
        let reply: WorkerReply = serde_json::from_str(r#"{"sample_rate":24000}"#).unwrap();
        assert_eq!(reply.sample_rate, Some(24000));
        assert!(reply.segments.is_empty());
    }

    #[test]
    fn load_rejects_missing_model_dir() {
        let mut engine = WorkerEngine::default();
        let err = engine
            .load_model(Path::new("does/not/exist/model"))
            .unwrap_err();
        assert!(matches!(err, EngineError::ModelDirMissing(_)));
        assert!(!engine.is_loaded());
    }

    #[test]
    fn missing_worker_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = WorkerEngine::new(WorkerCommand {
            program: PathBuf::from("tts-harness-no-such-worker"),
            args: vec![],
        });
        let err = engine.load_model(dir.path()).unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }

    #[cfg(unix)]
    fn loaded_engine(command: WorkerCommand, model_dir: &Path, sample_rate: u32) -> WorkerEngine {
        let mut engine = WorkerEngine::new(command);
        engine.model = Some(LoadedModel {
            model_dir: model_dir.to_path_buf(),
            params: WorkerModelParams::default(),
            sample_rate,
        });
        engine
    }

    #[cfg(unix)]
    #[test]
    fn segments_are_decoded_at_model_rate() {
        let dir = tempfile::tempdir().unwrap();
        let segment = dir.path().join("segment.wav");
        // One second at 22050 Hz while the model reported 24000 Hz on load.
        save_audio(&segment, &vec![0.1; 22050], 22050).unwrap();

        let script = dir.path().join("worker.sh");
        std::fs::write(
            &script,
            format!(
                "input=$(cat)\n\
                 case \"$input\" in\n\
                 *'\"op\":\"info\"'*) echo '{{\"sample_rate\":24000}}' ;;\n\
                 *) echo '{{\"sample_rate\":22050,\"segments\":[\"{}\"]}}' ;;\n\
                 esac\n",
                segment.display()
            ),
        )
        .unwrap();

        let mut engine = WorkerEngine::new(WorkerCommand {
            program: PathBuf::from("sh"),
            args: vec![script.display().to_string()],
        });
        engine.load_model(dir.path()).unwrap();
        assert_eq!(engine.sample_rate(), Some(24000));

        let segments = engine
            .infer_zero_shot("hello", "", &[], false)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].samples.len(), 24000);
        assert!((segments[0].duration_secs(24000) - 1.0).abs() < 1e-9);
    }

    #[cfg(unix)]
    #[test]
    fn early_worker_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let command = WorkerCommand {
            program: PathBuf::from("sh"),
            args: vec![
                "-c".to_string(),
                "echo 'No module named cosyvoice_worker' >&2; exit 1".to_string(),
            ],
        };
        let mut engine = loaded_engine(command, dir.path(), 24000);

        // Large enough that the write outlives the worker and breaks the pipe.
        let text = "a".repeat(1 << 20);
        let err = match engine.infer_zero_shot(&text, "", &[], false) {
            Ok(_) => panic!("worker exited with an error"),
            Err(e) => e,
        };
        match err {
            EngineError::Worker { code, stderr } => {
                assert_eq!(code, Some(1));
                assert!(stderr.contains("No module named cosyvoice_worker"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn shell_worker_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("worker.sh");
        std::fs::write(&script, "cat > /dev/null\necho '{\"sample_rate\":24000}'\n").unwrap();

        let mut engine = WorkerEngine::new(WorkerCommand {
            program: PathBuf::from("sh"),
            args: vec![script.display().to_string()],
        });
        engine.load_model(dir.path()).unwrap();
        assert_eq!(engine.sample_rate(), Some(24000));

        let segments = engine
            .infer_zero_shot("hello", "", &[], false)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert!(segments.is_empty());
    }
}
