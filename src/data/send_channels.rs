use crate::common::Batch;
use crate::classification_processing::TaggedCorrectness;

/// What a worker sends back for every batch it scored.
#[derive(Debug, Clone)]
pub struct ScoredBatch {
    pub worker_index: usize,
    pub batch_index: usize,
    pub outputs: Vec<TaggedCorrectness>,
}

/// Worker side: pulls batches from the shared queue, pushes scores back.
#[derive(Debug, Clone)]
pub struct WorkerState {
    pub batch_rx: crossbeam_channel::Receiver<Batch>,
    pub score_tx: crossbeam_channel::Sender<ScoredBatch>,
}

/// Dispatcher side of the same two channels.
#[derive(Debug)]
pub struct DispatchState {
    pub batch_tx: crossbeam_channel::Sender<Batch>,
    pub score_rx: crossbeam_channel::Receiver<ScoredBatch>,
}

/// Creates the batch queue and the result channel, both unbounded.
pub fn channels() -> (DispatchState, WorkerState) {
    let (batch_tx, batch_rx) = crossbeam_channel::unbounded();
    let (score_tx, score_rx) = crossbeam_channel::unbounded();
    (
        DispatchState { batch_tx, score_rx },
        WorkerState { batch_rx, score_tx },
    )
}
