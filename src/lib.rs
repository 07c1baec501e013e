mod utils;
mod classifiers;
pub mod cli;
pub mod data;
pub mod common;
pub mod launcher;
pub mod classify_runners;
pub mod classification_processing;

use std::sync::Arc;
use crate::classify_runners::ort_classifier::{ClassifyWorker, OrtEngine};
use crate::common::{AccuracyReport, ClassifyConfig};
use crate::launcher::Launcher;

pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;

/// Loads the network for the worker at `worker_index` onto its GPU and builds its
/// preprocessing transform.
pub fn init_worker(config: &ClassifyConfig, worker_index: usize) -> anyhow::Result<ClassifyWorker<OrtEngine>> {
    let ort_options = config.to_ort_config(worker_index)?;

    log::info!(
        "Worker {} | Initializing ORT session with ({}) execution provider",
        worker_index,
        ort_options.device.to_string()
    );
    let engine = OrtEngine::new(&ort_options)?;
    ClassifyWorker::new(engine, config, worker_index)
}

/// Runs the whole job: one ORT worker per configured GPU, every batch of every list file.
pub fn run_classification(config: Arc<ClassifyConfig>) -> anyhow::Result<AccuracyReport> {
    let launcher = Launcher::new(config);
    launcher.run(|config, worker_index| init_worker(config, worker_index))
}
