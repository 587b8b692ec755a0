//! Command-line entry point.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use tts_harness::acquire::{parse_selection, AcquisitionStatus};
use tts_harness::app::App;
use tts_harness::config::{ConfigError, Settings};
use tts_harness::demo;
use tts_harness::probe::write_test_tone;
use tts_harness::shell::Shell;
use tts_harness::{Mode, SynthesisError, SynthesisRequest};

#[derive(Parser, Debug)]
#[command(name = "tts-harness")]
#[command(about = "Synthesis, diagnostics and model downloads for zero-shot TTS engines")]
struct Cli {
    /// Settings file (JSON). Defaults to ./tts-harness.json when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding pretrained models
    #[arg(long, global = true)]
    model_root: Option<PathBuf>,

    /// Directory artifacts are written to
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive menu (default)
    Shell,
    /// Synthesize one request
    Synthesize(SynthesizeArgs),
    /// Download pretrained models that are not present yet
    Download {
        /// Comma-separated numbers or names; all models when omitted
        #[arg(short, long, default_value = "")]
        models: String,
    },
    /// Check interpreter packages and model directories
    Probe {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Also write a test tone to the output directory
        #[arg(long)]
        tone: bool,
    },
    /// Run the canned showcase, or the smoke test with --smoke
    Demo {
        #[arg(long)]
        smoke: bool,
    },
}

#[derive(clap::Args, Debug)]
struct SynthesizeArgs {
    /// Text to synthesize
    #[arg(short, long)]
    text: String,

    #[arg(short, long, value_enum, default_value_t = ModeArg::Basic)]
    mode: ModeArg,

    /// Reference recording (zero-shot and instruct modes)
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// What is said in the reference recording
    #[arg(long)]
    transcript: Option<String>,

    /// Style instruction (instruct mode)
    #[arg(short, long)]
    instruction: Option<String>,

    /// Model name under the model root
    #[arg(long)]
    model: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Basic,
    ZeroShot,
    Instruct,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Basic => Mode::Basic,
            ModeArg::ZeroShot => Mode::ZeroShot,
            ModeArg::Instruct => Mode::Instruct,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(failure_code(&e))
        }
    }
}

/// Exit code for an error that escaped `run`: 1 precondition, 2 engine, 3 I/O.
fn failure_code(e: &anyhow::Error) -> u8 {
    if let Some(synthesis) = e.downcast_ref::<SynthesisError>() {
        synthesis.exit_code()
    } else if e.downcast_ref::<ConfigError>().is_some() {
        1
    } else {
        3
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(root) = cli.model_root {
        settings.model_root = root;
    }
    if let Some(dir) = cli.output_dir {
        settings.output_dir = dir;
    }

    match cli.command.unwrap_or(Command::Shell) {
        Command::Shell => {
            let stdin = io::stdin();
            let mut shell = Shell::new(stdin.lock(), io::stdout(), App::new(settings));
            shell.run().context("Terminal I/O failed")?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Synthesize(args) => synthesize(settings, args),
        Command::Download { models } => {
            let selection = match parse_selection(&models, &settings.catalog) {
                Ok(selection) => selection,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return Ok(ExitCode::from(1));
                }
            };
            let outcomes = App::new(settings).download(&selection);
            let mut failed = false;
            for outcome in &outcomes {
                println!("{outcome}");
                if matches!(outcome.status, AcquisitionStatus::Failed(_)) {
                    println!(
                        "    download manually from {}",
                        outcome.entry.manual_download_url()
                    );
                    failed = true;
                }
            }
            Ok(if failed { ExitCode::from(2) } else { ExitCode::SUCCESS })
        }
        Command::Probe { json, tone } => {
            let output_dir = settings.output_dir.clone();
            let report = App::new(settings).probe().run();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
            if tone {
                let path = write_test_tone(&output_dir).context("Failed to write test tone")?;
                println!("Test tone written to {}", path.display());
            }
            Ok(if report.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Command::Demo { smoke } => {
            let mut app = App::new(settings);
            let results = if smoke {
                let request = demo::smoke_request(app.settings());
                vec![("Smoke test", app.synthesize(&request))]
            } else {
                let examples = demo::showcase();
                let synth = app.synthesizer()?;
                let results = demo::run_examples(synth, &examples);
                examples.iter().map(|e| e.title).zip(results).collect()
            };

            let mut worst = 0u8;
            for (title, result) in results {
                match result {
                    Ok(artifacts) => {
                        println!("[{title}] {} artifact(s)", artifacts.len());
                        for artifact in artifacts {
                            println!("  {}", artifact.path.display());
                        }
                    }
                    Err(e) => {
                        println!("[{title}] failed: {e}");
                        worst = worst.max(e.exit_code());
                    }
                }
            }
            Ok(ExitCode::from(worst))
        }
    }
}

fn synthesize(mut settings: Settings, args: SynthesizeArgs) -> Result<ExitCode> {
    if let Some(model) = args.model {
        settings.model_name = model;
    }
    let mode = Mode::from(args.mode);

    let mut request = SynthesisRequest {
        text: args.text,
        mode,
        voice_reference_path: None,
        voice_reference_transcript: None,
        instruction: None,
    };
    if mode.needs_reference() {
        let reference = args
            .reference
            .unwrap_or_else(|| settings.reference.path.clone());
        request.voice_reference_path = Some(reference);
    }
    match mode {
        Mode::Basic => {}
        Mode::ZeroShot => {
            request.voice_reference_transcript =
                Some(args.transcript.unwrap_or_else(|| settings.reference.transcript.clone()));
        }
        Mode::Instruct => {
            request.instruction =
                Some(args.instruction.unwrap_or_else(|| settings.default_instruction.clone()));
        }
    }

    let mut app = App::new(settings);
    let artifacts = app.synthesize(&request)?;
    if artifacts.is_empty() {
        println!("The engine returned no audio.");
    }
    for artifact in &artifacts {
        println!(
            "Saved {} ({:.2}s, {} Hz)",
            artifact.path.display(),
            artifact.duration_secs(),
            artifact.sample_rate
        );
    }
    Ok(ExitCode::SUCCESS)
}
