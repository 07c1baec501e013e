use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use anyhow::{anyhow, ensure, Context, Result};

use crate::classification_processing::Aggregator;
use crate::classifiers::classifier_loop;
use crate::classify_runners::inference_process::Engine;
use crate::classify_runners::ort_classifier::ClassifyWorker;
use crate::common::{AccuracyReport, Batch, ClassifyConfig};
use crate::data::batch_reader::load_batches;
use crate::data::send_channels::{channels, DispatchState};

/// Runs one worker thread per configured GPU over a shared batch queue and reduces
/// everything they send back into an [`AccuracyReport`].
#[derive(Debug, Clone)]
pub struct Launcher {
    config: Arc<ClassifyConfig>,
}

impl Launcher {
    pub fn new(config: Arc<ClassifyConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifyConfig {
        &self.config
    }

    /// Validates the configuration, reads every list file and scores all batches.
    ///
    /// `init` is called on each worker thread with the worker index and builds the worker
    /// bound to that index's GPU.
    pub fn run<E, F>(&self, init: F) -> Result<AccuracyReport>
    where
        E: Engine,
        F: Fn(&ClassifyConfig, usize) -> Result<ClassifyWorker<E>> + Sync,
    {
        self.config.validate()?;
        let batches = load_batches(&self.config.input, &self.config.root_dir, self.config.batch_size)?;
        let records: usize = batches.iter().map(|b| b.len()).sum();
        log::info!(
            "{} records in {} batches over {} worker(s)",
            records,
            batches.len(),
            self.config.num_workers()
        );
        self.run_batches(batches, init)
    }

    /// Scores already loaded batches. The first worker failure aborts the others and is
    /// returned.
    pub fn run_batches<E, F>(&self, batches: Vec<Batch>, init: F) -> Result<AccuracyReport>
    where
        E: Engine,
        F: Fn(&ClassifyConfig, usize) -> Result<ClassifyWorker<E>> + Sync,
    {
        let num_workers = self.config.num_workers();
        ensure!(num_workers > 0, "At least one GPU index is required");

        let total = batches.len();
        let (dispatch, worker_state) = channels();
        let DispatchState { batch_tx, score_rx } = dispatch;
        for batch in batches {
            batch_tx.send(batch).context("Batch queue closed before dispatch finished")?;
        }
        // workers stop once the queue is drained
        drop(batch_tx);

        let abort = AtomicBool::new(false);
        let mut aggregator = Aggregator::new();
        let mut received = 0usize;

        let outcomes = thread::scope(|s| -> Result<Vec<Result<usize>>> {
            let mut handles = Vec::with_capacity(num_workers);
            for worker_index in 0..num_workers {
                let state = worker_state.clone();
                let abort = &abort;
                let init = &init;
                let config: &ClassifyConfig = &self.config;

                let spawned = thread::Builder::new()
                    .name(format!("classify-worker-{worker_index}"))
                    .spawn_scoped(s, move || -> Result<usize> {
                        let worker = match init(config, worker_index) {
                            Ok(worker) => worker,
                            Err(err) => {
                                abort.store(true, Ordering::Release);
                                return Err(err.context(format!("Worker {} failed to initialize", worker_index)));
                            }
                        };
                        classifier_loop(worker, state, abort)
                    });

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        abort.store(true, Ordering::Release);
                        return Err(anyhow!("Failed to spawn worker {}: {}", worker_index, err));
                    }
                }
            }
            drop(worker_state);

            for msg in score_rx.iter() {
                received += 1;
                log::debug!(
                    "Batch {} scored by worker {} ({}/{})",
                    msg.batch_index, msg.worker_index, received, total
                );
                aggregator.extend(&msg.outputs);
            }

            Ok(handles
                .into_iter()
                .enumerate()
                .map(|(i, handle)| match handle.join() {
                    Ok(outcome) => outcome,
                    Err(_) => Err(anyhow!("Worker {} panicked", i)),
                })
                .collect())
        })?;

        let mut first_err = None;
        for (worker_index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(n) => log::debug!("Worker {} scored {} batches", worker_index, n),
                Err(err) if first_err.is_none() => first_err = Some(err),
                Err(err) => log::error!("Worker {} also failed: {:#}", worker_index, err),
            }
        }
        if let Some(err) = first_err {
            return Err(err);
        }

        ensure!(
            received == total,
            "Only {} of {} batches were scored",
            received, total
        );
        Ok(aggregator.reduce())
    }
}
