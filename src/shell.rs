//! Interactive menu loop.
//!
//! Reads one line per prompt, runs the chosen action to completion and comes
//! back to the menu. Errors are printed, never propagated; only I/O errors on
//! the terminal itself end the loop early.

use std::io::{self, BufRead, Write};

use crate::acquire::{parse_selection, AcquisitionOutcome, AcquisitionStatus};
use crate::catalog::ModelCatalogEntry;
use crate::error::{Stage, SynthesisError};
use crate::probe::ProbeReport;
use crate::synthesizer::AudioArtifact;

/// Actions the shell can dispatch to.
pub trait ShellHandler {
    /// Lines shown under the banner (working directories and the like).
    fn banner(&self) -> Vec<String> {
        Vec::new()
    }

    fn synthesize(&mut self, text: &str) -> Result<Vec<AudioArtifact>, SynthesisError>;

    fn catalog(&self) -> &[ModelCatalogEntry];

    fn download(&mut self, selection: &[usize]) -> Vec<AcquisitionOutcome>;

    fn showcase(&mut self) -> Vec<(&'static str, Result<Vec<AudioArtifact>, SynthesisError>)>;

    fn smoke_test(&mut self) -> Result<Vec<AudioArtifact>, SynthesisError>;

    fn diagnose(&mut self) -> ProbeReport;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Synthesize,
    Download,
    Showcase,
    SmokeTest,
    Diagnose,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::Synthesize),
            "2" => Some(MenuChoice::Download),
            "3" => Some(MenuChoice::Showcase),
            "4" => Some(MenuChoice::SmokeTest),
            "5" => Some(MenuChoice::Diagnose),
            "0" | "q" | "quit" | "exit" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

const RULE: &str = "----------------------------------------------------------------------";

pub struct Shell<R, W, H> {
    input: R,
    out: W,
    handler: H,
}

impl<R: BufRead, W: Write, H: ShellHandler> Shell<R, W, H> {
    pub fn new(input: R, out: W, handler: H) -> Self {
        Self {
            input,
            out,
            handler,
        }
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Run until the user exits or input ends.
    pub fn run(&mut self) -> io::Result<()> {
        self.print_banner()?;

        let report = self.handler.diagnose();
        if report.is_complete() {
            writeln!(self.out, "Environment check passed.")?;
        } else {
            writeln!(
                self.out,
                "Environment incomplete, missing: {}. Synthesis may fail.",
                report.missing_packages().join(", ")
            )?;
        }
        if let Some(warning) = report.interpreter_warning() {
            writeln!(self.out, "Warning: {warning}")?;
        }

        loop {
            self.print_menu()?;
            let Some(line) = self.prompt("Select an option (0-5): ")? else {
                break;
            };
            let Some(choice) = MenuChoice::parse(&line) else {
                writeln!(self.out, "Invalid choice, please try again.")?;
                continue;
            };

            match choice {
                MenuChoice::Synthesize => self.synthesize()?,
                MenuChoice::Download => self.download()?,
                MenuChoice::Showcase => self.showcase()?,
                MenuChoice::SmokeTest => {
                    let result = self.handler.smoke_test();
                    self.report_synthesis(result)?;
                }
                MenuChoice::Diagnose => {
                    let report = self.handler.diagnose();
                    write!(self.out, "{report}")?;
                }
                MenuChoice::Exit => break,
            }
        }

        writeln!(self.out, "Bye!")?;
        Ok(())
    }

    fn print_banner(&mut self) -> io::Result<()> {
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "TTS harness")?;
        for line in self.handler.banner() {
            writeln!(self.out, "  {line}")?;
        }
        writeln!(self.out, "{RULE}")
    }

    fn print_menu(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "Main menu")?;
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "1. Synthesize speech")?;
        writeln!(self.out, "2. Download pretrained models")?;
        writeln!(self.out, "3. Run showcase")?;
        writeln!(self.out, "4. Run smoke test")?;
        writeln!(self.out, "5. Diagnose environment")?;
        writeln!(self.out, "0. Exit")?;
        writeln!(self.out, "{RULE}")
    }

    /// `None` on end of input.
    fn prompt(&mut self, message: &str) -> io::Result<Option<String>> {
        write!(self.out, "{message}")?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn synthesize(&mut self) -> io::Result<()> {
        let Some(text) = self.prompt("Text to synthesize: ")? else {
            return Ok(());
        };
        if text.is_empty() {
            return writeln!(self.out, "Text must not be empty.");
        }
        let result = self.handler.synthesize(&text);
        self.report_synthesis(result)
    }

    fn download(&mut self) -> io::Result<()> {
        writeln!(self.out, "Available models:")?;
        for (i, entry) in self.handler.catalog().iter().enumerate() {
            writeln!(
                self.out,
                "  {}. {:20} ({})",
                i + 1,
                entry.display_name,
                entry.remote_identifier
            )?;
        }
        let Some(input) = self.prompt("Models to download (comma-separated, empty for all): ")?
        else {
            return Ok(());
        };

        let selection = match parse_selection(&input, self.handler.catalog()) {
            Ok(selection) => selection,
            Err(e) => return writeln!(self.out, "{e}"),
        };
        for outcome in self.handler.download(&selection) {
            writeln!(self.out, "{outcome}")?;
            if matches!(outcome.status, AcquisitionStatus::Failed(_)) {
                writeln!(
                    self.out,
                    "    download manually from {}",
                    outcome.entry.manual_download_url()
                )?;
            }
        }
        Ok(())
    }

    fn showcase(&mut self) -> io::Result<()> {
        for (title, result) in self.handler.showcase() {
            writeln!(self.out, "[{title}]")?;
            self.report_synthesis(result)?;
        }
        Ok(())
    }

    fn report_synthesis(
        &mut self,
        result: Result<Vec<AudioArtifact>, SynthesisError>,
    ) -> io::Result<()> {
        match result {
            Ok(artifacts) if artifacts.is_empty() => {
                writeln!(self.out, "The engine returned no audio.")
            }
            Ok(artifacts) => {
                for artifact in artifacts {
                    writeln!(
                        self.out,
                        "Saved {} ({:.2}s, {} Hz)",
                        artifact.path.display(),
                        artifact.duration_secs(),
                        artifact.sample_rate
                    )?;
                }
                Ok(())
            }
            Err(e) => {
                writeln!(self.out, "Error: {e}")?;
                if matches!(
                    e,
                    SynthesisError::EngineFailure {
                        stage: Stage::LoadModel,
                        ..
                    }
                ) {
                    writeln!(self.out, "Hint: download the model first (menu option 2).")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[derive(Default)]
    struct Recorder {
        catalog: Vec<ModelCatalogEntry>,
        texts: Vec<String>,
        downloads: Vec<Vec<usize>>,
        diagnoses: usize,
    }

    impl ShellHandler for Recorder {
        fn synthesize(&mut self, text: &str) -> Result<Vec<AudioArtifact>, SynthesisError> {
            self.texts.push(text.to_string());
            Ok(vec![AudioArtifact {
                path: PathBuf::from("output/basic_0_0.wav"),
                sample_rate: 24000,
                segment_index: 0,
                num_samples: 24000,
            }])
        }

        fn catalog(&self) -> &[ModelCatalogEntry] {
            &self.catalog
        }

        fn download(&mut self, selection: &[usize]) -> Vec<AcquisitionOutcome> {
            self.downloads.push(selection.to_vec());
            selection
                .iter()
                .map(|&i| AcquisitionOutcome {
                    entry: self.catalog[i].clone(),
                    status: AcquisitionStatus::Failed("offline".into()),
                })
                .collect()
        }

        fn showcase(
            &mut self,
        ) -> Vec<(&'static str, Result<Vec<AudioArtifact>, SynthesisError>)> {
            vec![("only", Err(SynthesisError::ModelNotLoaded))]
        }

        fn smoke_test(&mut self) -> Result<Vec<AudioArtifact>, SynthesisError> {
            Ok(Vec::new())
        }

        fn diagnose(&mut self) -> ProbeReport {
            self.diagnoses += 1;
            ProbeReport {
                interpreter: crate::probe::PackageStatus::Absent,
                required_packages: BTreeMap::new(),
                required_model_dirs: BTreeMap::new(),
            }
        }
    }

    fn run(input: &str) -> (Recorder, String) {
        let handler = Recorder {
            catalog: default_catalog(),
            ..Default::default()
        };
        let mut out = Vec::new();
        let mut shell = Shell::new(input.as_bytes(), &mut out, handler);
        shell.run().unwrap();
        let handler = shell.into_handler();
        (handler, String::from_utf8(out).unwrap())
    }

    #[test]
    fn parses_menu_choices() {
        assert_eq!(MenuChoice::parse(" 1 "), Some(MenuChoice::Synthesize));
        assert_eq!(MenuChoice::parse("0"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("7"), None);
    }

    #[test]
    fn dispatches_synthesis_and_exits() {
        let (handler, out) = run("1\nhello\n0\n");
        assert_eq!(handler.texts, vec!["hello"]);
        assert!(out.contains("Saved output/basic_0_0.wav (1.00s, 24000 Hz)"));
        assert!(out.ends_with("Bye!\n"));
    }

    #[test]
    fn empty_text_never_reaches_handler() {
        let (handler, out) = run("1\n\n0\n");
        assert!(handler.texts.is_empty());
        assert!(out.contains("Text must not be empty."));
    }

    #[test]
    fn invalid_choice_reprompts_and_eof_exits() {
        let (handler, out) = run("9\n");
        assert!(out.contains("Invalid choice"));
        assert_eq!(handler.diagnoses, 1);
    }

    #[test]
    fn download_reports_failures_with_manual_url() {
        let (handler, out) = run("2\n1,3\n0\n");
        assert_eq!(handler.downloads, vec![vec![0, 2]]);
        assert!(out.contains("https://modelscope.cn/iic/CosyVoice2-0.5B"));
    }

    #[test]
    fn bad_download_selection_is_reported() {
        let (handler, out) = run("2\nnope\n0\n");
        assert!(handler.downloads.is_empty());
        assert!(out.contains("Unknown model selection"));
    }

    #[test]
    fn showcase_errors_are_displayed() {
        let (_, out) = run("3\n0\n");
        assert!(out.contains("[only]"));
        assert!(out.contains("Error: Model not loaded"));
    }
}
