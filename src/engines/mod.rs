//! Speech synthesis engine backends.
//!
//! # Available Engines
//!
//! - [`worker::WorkerEngine`] - drives an out-of-process inference worker
//!   (for example a Python host for CosyVoice models) over a JSON pipe

pub mod worker;
