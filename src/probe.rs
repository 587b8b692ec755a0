//! Read-only environment inspection.
//!
//! The probe asks the worker's interpreter to import each required package
//! and checks which model directories exist. It never fails: anything that
//! cannot be found is reported as absent and the caller decides what to do.

use std::collections::BTreeMap;
use std::f32::consts::PI;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;

use crate::audio::save_audio;
use crate::error::AudioError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PackageStatus {
    Present { version: String },
    Absent,
}

impl PackageStatus {
    pub fn is_present(&self) -> bool {
        matches!(self, PackageStatus::Present { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub interpreter: PackageStatus,
    pub required_packages: BTreeMap<String, PackageStatus>,
    pub required_model_dirs: BTreeMap<String, bool>,
}

/// First interpreter release the worker's packages are not known to support.
pub const UNSUPPORTED_PYTHON: (u32, u32) = (3, 14);

/// Parse `major.minor` out of `python --version` output such as `Python 3.10.12`.
pub fn parse_python_version(text: &str) -> Option<(u32, u32)> {
    let version = text.split_whitespace().find(|w| w.starts_with(|c: char| c.is_ascii_digit()))?;
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor: String = parts.next()?.chars().take_while(char::is_ascii_digit).collect();
    Some((major, minor.parse().ok()?))
}

impl ProbeReport {
    /// Warning for an interpreter release some packages may not support yet.
    pub fn interpreter_warning(&self) -> Option<String> {
        let PackageStatus::Present { version } = &self.interpreter else {
            return None;
        };
        let (major, minor) = parse_python_version(version)?;
        ((major, minor) >= UNSUPPORTED_PYTHON).then(|| {
            format!(
                "Python {major}.{minor} ({}.{}+) may not be compatible with some packages",
                UNSUPPORTED_PYTHON.0, UNSUPPORTED_PYTHON.1
            )
        })
    }

    /// Interpreter and every package are present.
    pub fn is_complete(&self) -> bool {
        self.interpreter.is_present()
            && self.required_packages.values().all(PackageStatus::is_present)
    }

    pub fn missing_packages(&self) -> Vec<&str> {
        self.required_packages
            .iter()
            .filter(|(_, s)| !s.is_present())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn found_models(&self) -> Vec<&str> {
        self.required_model_dirs
            .iter()
            .filter(|(_, present)| **present)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.interpreter {
            PackageStatus::Present { version } => writeln!(f, "✓ interpreter: {version}")?,
            PackageStatus::Absent => writeln!(f, "✗ interpreter: not found")?,
        }
        if let Some(warning) = self.interpreter_warning() {
            writeln!(f, "⚠ interpreter: {warning}")?;
        }
        for (name, status) in &self.required_packages {
            match status {
                PackageStatus::Present { version } => writeln!(f, "✓ {name}: {version}")?,
                PackageStatus::Absent => writeln!(f, "✗ {name}: not installed")?,
            }
        }
        for (name, present) in &self.required_model_dirs {
            let mark = if *present { "✓" } else { "✗" };
            writeln!(f, "{mark} model {name}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Probe {
    interpreter: PathBuf,
    packages: Vec<String>,
    model_dirs: Vec<(String, PathBuf)>,
}

impl Probe {
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            packages: Vec::new(),
            model_dirs: Vec::new(),
        }
    }

    pub fn package(mut self, module: impl Into<String>) -> Self {
        self.packages.push(module.into());
        self
    }

    pub fn packages<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages.extend(modules.into_iter().map(Into::into));
        self
    }

    pub fn model_dir(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.model_dirs.push((name.into(), path.into()));
        self
    }

    pub fn run(&self) -> ProbeReport {
        let interpreter = self.interpreter_version();
        let required_packages = self
            .packages
            .iter()
            .map(|module| {
                let status = if interpreter.is_present() {
                    self.package_version(module)
                } else {
                    PackageStatus::Absent
                };
                (module.clone(), status)
            })
            .collect();
        let required_model_dirs = self
            .model_dirs
            .iter()
            .map(|(name, path)| (name.clone(), path.is_dir()))
            .collect();

        ProbeReport {
            interpreter,
            required_packages,
            required_model_dirs,
        }
    }

    fn interpreter_version(&self) -> PackageStatus {
        match self.run_interpreter(&["--version"]) {
            Some(out) => PackageStatus::Present { version: out },
            None => PackageStatus::Absent,
        }
    }

    fn package_version(&self, module: &str) -> PackageStatus {
        let script = format!(
            "import importlib; m = importlib.import_module({module:?}); \
             print(getattr(m, '__version__', 'installed'))"
        );
        match self.run_interpreter(&["-c", &script]) {
            Some(version) => PackageStatus::Present { version },
            None => PackageStatus::Absent,
        }
    }

    /// First non-empty line of stdout (or stderr) on success.
    fn run_interpreter(&self, args: &[&str]) -> Option<String> {
        let output = Command::new(&self.interpreter)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| log::debug!("{} not runnable: {e}", self.interpreter.display()))
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = if output.stdout.iter().all(u8::is_ascii_whitespace) {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        Some(
            text.lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or("installed")
                .to_string(),
        )
    }
}

pub const TEST_TONE_FILE: &str = "test_sine_wave.wav";

/// Write a 3 s, 440 Hz sine at 16 kHz to `output_dir/test_sine_wave.wav`.
///
/// Exercises the audio write path without needing a model.
pub fn write_test_tone(output_dir: &Path) -> Result<PathBuf, AudioError> {
    const SAMPLE_RATE: u32 = 16000;
    const SECONDS: u32 = 3;
    const FREQUENCY: f32 = 440.0;

    std::fs::create_dir_all(output_dir)?;
    let total = SAMPLE_RATE * SECONDS;
    let samples: Vec<f32> = (0..total)
        .map(|i| (2.0 * PI * FREQUENCY * i as f32 / SAMPLE_RATE as f32).sin())
        .collect();

    let path = output_dir.join(TEST_TONE_FILE);
    save_audio(&path, &samples, SAMPLE_RATE)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absent_interpreter_reports_everything_absent() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("CosyVoice2-0.5B")).unwrap();

        let report = Probe::new("tts-harness-no-such-python")
            .packages(["torch", "torchaudio"])
            .model_dir("CosyVoice2-0.5B", dir.path().join("CosyVoice2-0.5B"))
            .model_dir("CosyVoice-300M", dir.path().join("CosyVoice-300M"))
            .run();

        assert_eq!(report.interpreter, PackageStatus::Absent);
        assert!(!report.is_complete());
        assert_eq!(report.missing_packages(), vec!["torch", "torchaudio"]);
        assert_eq!(report.found_models(), vec!["CosyVoice2-0.5B"]);
    }

    fn report_with_interpreter(version: &str) -> ProbeReport {
        ProbeReport {
            interpreter: PackageStatus::Present {
                version: version.to_string(),
            },
            required_packages: BTreeMap::new(),
            required_model_dirs: BTreeMap::new(),
        }
    }

    #[test]
    fn parses_interpreter_versions() {
        assert_eq!(parse_python_version("Python 3.10.12"), Some((3, 10)));
        assert_eq!(parse_python_version("Python 3.14.0rc1"), Some((3, 14)));
        assert_eq!(parse_python_version("Python 3.15a"), Some((3, 15)));
        assert_eq!(parse_python_version("installed"), None);
    }

    #[test]
    fn new_interpreters_are_flagged() {
        let report = report_with_interpreter("Python 3.14.0");
        let warning = report.interpreter_warning().unwrap();
        assert!(warning.contains("3.14+"));
        assert!(report.to_string().contains("⚠ interpreter"));

        let report = report_with_interpreter("Python 3.10.12");
        assert_eq!(report.interpreter_warning(), None);
        assert!(!report.to_string().contains('⚠'));
        assert_eq!(
            Probe::new("tts-harness-no-such-python").run().interpreter_warning(),
            None
        );
    }

    #[test]
    fn report_serializes_status_tags() {
        let report = Probe::new("tts-harness-no-such-python")
            .package("torch")
            .run();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["required_packages"]["torch"]["status"], "absent");
    }

    #[test]
    fn test_tone_is_three_seconds() {
        let dir = tempdir().unwrap();
        let path = write_test_tone(&dir.path().join("output")).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.len(), 48000);
    }
}
