use std::path::PathBuf;
use std::time::Instant;

use tts_harness::{
    demo,
    engines::worker::{WorkerEngine, WorkerModelParams},
    Synthesizer,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut synth = Synthesizer::new(WorkerEngine::default(), "output");
    let model_path = PathBuf::from("pretrained_models/CosyVoice2-0.5B");

    let load_start = Instant::now();
    synth.load_model(&model_path, WorkerModelParams::default())?;
    println!("Model loaded in {:.2?}", load_start.elapsed());

    let examples = demo::showcase();
    for (example, result) in examples.iter().zip(demo::run_examples(&mut synth, &examples)) {
        println!("[{}]", example.title);
        for artifact in result? {
            println!(
                "  {} ({:.2}s @ {} Hz)",
                artifact.path.display(),
                artifact.duration_secs(),
                artifact.sample_rate
            );
        }
    }

    synth.unload_model();
    Ok(())
}
