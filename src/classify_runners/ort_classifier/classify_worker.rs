use std::time::{Duration, Instant};
use anyhow::{bail, ensure, Context, Result};
use fast_image_resize::Resizer;
use ndarray::{Axis, Slice};
use rayon::prelude::*;

use crate::classification_processing::{score_top_k, CorrectnessVector, TaggedCorrectness, METRICS};
use crate::classify_runners::inference_process::{Engine, InferenceProcess};
use crate::common::{Batch, BvrImage, ClassifyConfig, LabelRecord};
use crate::data::{ImageOps, TimeCalc, X};
use crate::utils;
use super::image_ops::Transformer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Ready,
    Scoring,
    Done,
}

/// Scores batches on one device: decode, resize, crop, transform, forward pass, top-k.
#[derive(Debug)]
pub struct ClassifyWorker<E: Engine> {
    engine: E,
    worker_index: usize,
    channels: usize,
    height: usize,
    width: usize,
    /// Batch axis of a model exported with a fixed batch; inputs are zero-padded up to it.
    fixed_batch: Option<usize>,
    ops: Vec<ImageOps>,
    transformer: Transformer,
    status: WorkerStatus,
    profile: bool,
    ts: TimeCalc,
}

impl<E: Engine> ClassifyWorker<E> {
    pub fn new(engine: E, config: &ClassifyConfig, worker_index: usize) -> Result<Self> {
        let dims = engine.input_dims().to_vec();
        ensure!(
            dims.len() == 4,
            "Input '{}' must be (N, C, H, W), the model declares {:?}",
            config.input_blob, dims
        );

        let channels = match dims[1] {
            0 => {
                log::warn!("Input '{}' has a dynamic channel axis, assuming {}", config.input_blob, Transformer::CHANNELS);
                Transformer::CHANNELS
            }
            c => c,
        };
        ensure!(
            channels == Transformer::CHANNELS,
            "Input '{}' expects {} channels, only {}-channel colour images are supported",
            config.input_blob, channels, Transformer::CHANNELS
        );

        let (height, width) = match config.crop_size() {
            Some((h, w)) => (h as usize, w as usize),
            None if dims[2] == 0 || dims[3] == 0 => {
                bail!(
                    "Input '{}' has dynamic spatial dims {:?}, set both --crop_height and --crop_width",
                    config.input_blob, dims
                )
            }
            None => (dims[2], dims[3]),
        };

        let fixed_batch = match dims[0] {
            0 => None,
            n => {
                ensure!(
                    config.batch_size <= n,
                    "Batch size {} exceeds the model's fixed batch of {}",
                    config.batch_size, n
                );
                Some(n)
            }
        };

        let mean = config
            .mean
            .load(config.channel_order)
            .context("Failed to load the mean")?;
        let transformer = Transformer::new(config.channel_order, mean)?;

        let ops = vec![
            ImageOps::ResizeShortSide(config.resize),
            ImageOps::CenterCrop(height as u32, width as u32),
        ];

        log::info!(
            "Worker {} | Ready | input {}x{}x{} | mean {:?} | {:?}",
            worker_index, channels, height, width, transformer.mean(), ops
        );

        Ok(Self {
            engine,
            worker_index,
            channels,
            height,
            width,
            fixed_batch,
            ops,
            transformer,
            status: WorkerStatus::Ready,
            profile: config.profile,
            ts: TimeCalc::default(),
        })
    }

    /// Scores one batch, returning one tagged vector per metric.
    pub fn score_batch(&mut self, batch: &Batch) -> Result<Vec<TaggedCorrectness>> {
        if self.status == WorkerStatus::Done {
            bail!("Worker {} is finished and cannot score batch {}", self.worker_index, batch.index);
        }
        self.status = WorkerStatus::Scoring;

        let l_type = format!("Worker {} | Batch {}", self.worker_index, batch.index);
        let start = Instant::now();
        let mut _elapsed = Duration::ZERO;

        let xs = self
            .preprocess(&batch.records)
            .with_context(|| format!("Worker {} failed to preprocess batch {}", self.worker_index, batch.index))?;
        let t_pre = start.elapsed();
        _elapsed = utils::trace(self.profile, &l_type, "Preprocess", start, _elapsed);

        let ys = self
            .inference(xs)
            .with_context(|| format!("Worker {} failed to run batch {}", self.worker_index, batch.index))?;
        let t_run = start.elapsed() - _elapsed;
        _elapsed = utils::trace(self.profile, &l_type, "Inference", start, _elapsed);

        let scored = self
            .postprocess(ys, &batch.records)
            .with_context(|| format!("Worker {} failed to score batch {}", self.worker_index, batch.index))?;
        let t_post = start.elapsed() - _elapsed;
        utils::trace(self.profile, &l_type, "Scoring", start, _elapsed);

        self.ts.add_or_push(0, t_pre);
        self.ts.add_or_push(1, t_run);
        self.ts.add_or_push(2, t_post);

        self.status = WorkerStatus::Ready;
        Ok(scored)
    }

    /// Moves the worker to `Done`. Further batches are rejected.
    pub fn finish(&mut self) {
        if self.status == WorkerStatus::Done {
            return;
        }
        self.status = WorkerStatus::Done;
        let level = if self.profile { log::Level::Info } else { log::Level::Debug };
        log::log!(
            level,
            "Worker {} | Done | {} batches | preprocess {:?} | inference {:?} | scoring {:?} (avg)",
            self.worker_index,
            self.ts.n(),
            self.ts.avg_i(0),
            self.ts.avg_i(1),
            self.ts.avg_i(2),
        );
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    pub fn worker_index(&self) -> usize {
        self.worker_index
    }

    /// Spatial `(height, width)` images are cropped to.
    pub fn input_hw(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    fn load_one(ops: &[ImageOps], transformer: &Transformer, record: &LabelRecord) -> Result<Vec<f32>> {
        let image = BvrImage::open(&record.path)?;
        let mut resizer = Resizer::new();
        let image = ImageOps::apply(ops, image, &mut resizer)
            .with_context(|| format!("Failed to preprocess {}", record.path.display()))?;
        Ok(transformer.preprocess(&image))
    }
}

impl<E: Engine> InferenceProcess for ClassifyWorker<E> {
    type Input = LabelRecord;
    type Output = Vec<TaggedCorrectness>;

    fn preprocess(&self, xs: &[Self::Input]) -> Result<X> {
        ensure!(!xs.is_empty(), "Cannot preprocess an empty batch");
        let ops = &self.ops;
        let transformer = &self.transformer;

        let mut planes = xs
            .par_iter()
            .map(|record| Self::load_one(ops, transformer, record))
            .collect::<Result<Vec<_>>>()?;

        if let Some(n) = self.fixed_batch {
            ensure!(xs.len() <= n, "Batch of {} exceeds the model's fixed batch of {}", xs.len(), n);
            let plane_len = self.channels * self.height * self.width;
            planes.resize(n, vec![0.0; plane_len]);
        }

        X::stack_chw(&planes, self.channels, self.height, self.width)
    }

    fn inference(&mut self, xs: X) -> Result<X> {
        self.engine.run(xs)
    }

    fn postprocess(&self, ys: X, xs0: &[Self::Input]) -> Result<Self::Output> {
        let labels: Vec<i64> = xs0.iter().map(|r| r.label).collect();
        ensure!(ys.ndim() >= 2, "Output tensor must be at least 2-D, got {:?}", ys.shape());

        let mut view = ys.view();
        // padded rows of a fixed-batch model
        if self.fixed_batch.is_some() && view.shape()[0] > labels.len() {
            view.slice_axis_inplace(Axis(0), Slice::from(0..labels.len()));
        }

        let ks: Vec<usize> = METRICS.iter().map(|&(_, k)| k).collect();
        let vectors: Vec<CorrectnessVector> = score_top_k(&labels, view, &ks)?;
        Ok(METRICS
            .iter()
            .zip(vectors)
            .map(|(&(name, _), vector)| TaggedCorrectness::new(name, vector))
            .collect())
    }
}
