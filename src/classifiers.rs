use std::sync::atomic::{AtomicBool, Ordering};
use anyhow::Result;
use crate::classify_runners::inference_process::Engine;
use crate::classify_runners::ort_classifier::ClassifyWorker;
use crate::data::send_channels::{ScoredBatch, WorkerState};

/// Pulls batches off the shared queue until it is drained, the dispatcher hangs up, or
/// another worker raised `abort`. Returns the number of batches this worker scored.
pub(crate) fn classifier_loop<E: Engine>(
    mut worker: ClassifyWorker<E>,
    worker_state: WorkerState,
    abort: &AtomicBool,
) -> Result<usize> {
    let worker_index = worker.worker_index();
    let mut scored = 0usize;

    log::info!("Worker {} | Waiting for batches", worker_index);
    loop {
        // MESSAGE LOOP STARTS HERE
        if abort.load(Ordering::Acquire) {
            log::warn!("Worker {} | Abort requested, stopping after {} batches", worker_index, scored);
            break;
        }

        let batch = match worker_state.batch_rx.recv() {
            Ok(msg) => msg,
            Err(_) => break,
        };
        log::debug!("Worker {} | Batch {} | {} images", worker_index, batch.index, batch.len());

        let outputs = match worker.score_batch(&batch) {
            Ok(outputs) => outputs,
            Err(err) => {
                abort.store(true, Ordering::Release);
                worker.finish();
                return Err(err);
            }
        };

        let msg = ScoredBatch {
            worker_index,
            batch_index: batch.index,
            outputs,
        };
        if worker_state.score_tx.send(msg).is_err() {
            log::warn!("Worker {} | Result channel closed", worker_index);
            break;
        }
        scored += 1;
    }

    worker.finish();
    log::info!("Worker {} | Finished {} batches", worker_index, scored);
    Ok(scored)
}
