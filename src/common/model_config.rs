use std::path::{Path, PathBuf};
use anyhow::{bail, ensure, Result};
use crate::common::inference_device::InferenceDevice;
use crate::common::bvr_image::ChannelOrder;
use crate::data::{ConfigOrt, MeanSource};

/// Everything a run needs, parsed once at startup and shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// GPU ordinals, one worker per entry. Worker `i` runs on `gpus[i]`.
    pub gpus: Vec<usize>,
    /// Glob pattern of the label-list files.
    pub input: String,
    pub root_dir: PathBuf,
    pub model_path: PathBuf,
    pub weights_path: PathBuf,
    pub input_blob: String,
    pub output_blob: String,
    pub batch_size: usize,
    pub mean: MeanSource,
    /// Target length of the shorter image side before cropping.
    pub resize: u32,
    pub crop_height: Option<u32>,
    pub crop_width: Option<u32>,
    /// Execution provider kind. The ordinal is replaced per worker.
    pub inference_device: InferenceDevice,
    pub ort_lib_path: String,
    pub channel_order: ChannelOrder,
    pub trt_fp16: bool,
    pub profile: bool,
    pub output_json: Option<PathBuf>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            gpus: vec![0],
            input: String::new(),
            root_dir: PathBuf::new(),
            model_path: PathBuf::new(),
            weights_path: PathBuf::new(),
            input_blob: "data".to_string(),
            output_blob: "fc".to_string(),
            batch_size: 1,
            mean: MeanSource::BuiltIn,
            resize: 256,
            crop_height: None,
            crop_width: None,
            inference_device: InferenceDevice::CUDA(0),
            ort_lib_path: String::from("libonnxruntime.so"),
            channel_order: ChannelOrder::Bgr,
            trt_fp16: false,
            profile: false,
            output_json: None,
        }
    }
}

impl ClassifyConfig {
    pub fn num_workers(&self) -> usize {
        self.gpus.len()
    }

    /// Crop size `(height, width)`, only when both sides were given.
    pub fn crop_size(&self) -> Option<(u32, u32)> {
        match (self.crop_height, self.crop_width) {
            (Some(h), Some(w)) => Some((h, w)),
            _ => None,
        }
    }

    /// The device of the worker at `worker_index`.
    pub fn device_for_worker(&self, worker_index: usize) -> Result<InferenceDevice> {
        let Some(&gpu) = self.gpus.get(worker_index) else {
            bail!("Worker index {} out of range for {} GPU(s)", worker_index, self.gpus.len());
        };
        match InferenceDevice::from_str(self.inference_device.str(), gpu) {
            Some(device) => Ok(device),
            None => bail!("Unknown inference device: {}", self.inference_device.str()),
        }
    }

    pub fn to_ort_config(&self, worker_index: usize) -> Result<ConfigOrt> {
        let device = self.device_for_worker(worker_index)?;
        let mut options = ConfigOrt::new()
            .with_model(&self.model_path)?
            .with_weights(&self.weights_path)?
            .with_ort_lib_path(&self.ort_lib_path)?
            .with_device(device)
            .with_batch_size(self.batch_size)
            .with_input_name(&self.input_blob)
            .with_output_name(&self.output_blob)
            .with_trt_fp16(self.trt_fp16)
            .with_profile(self.profile);
        if let Some((h, w)) = self.crop_size() {
            options = options.with_input_hw(h, w);
        }
        Ok(options)
    }

    /// Startup checks for the configuration errors that do not need the model.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.gpus.is_empty(), "At least one GPU index is required");
        ensure!(self.batch_size > 0, "Batch size must be at least 1");
        ensure!(self.resize > 0, "Resize target must be at least 1");
        ensure!(!self.input.is_empty(), "No input list pattern given");
        ensure_file(&self.model_path, "Model")?;
        ensure_file(&self.weights_path, "Weights")?;
        ensure!(
            self.weights_path == self.model_path
                || self.weights_path.parent() == self.model_path.parent(),
            "Weights {} must be the model itself or its external data file next to {}",
            self.weights_path.display(), self.model_path.display()
        );
        if let MeanSource::File(path) = &self.mean {
            ensure_file(path, "Mean")?;
        }
        if self.crop_height.is_some() != self.crop_width.is_some() {
            log::warn!("Only one of crop height/width is set, ignoring both");
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!("GPUs: {:?}\n\
        Input Lists: {}\n\
        Root Dir: {}\n\
        Model Path: {}\n\
        Weights Path: {}\n\
        Blobs (in/out): {}/{}\n\
        Batch Size: {}\n\
        Mean: {:?}\n\
        Resize: {} | Crop: {:?}\n\
        Inference Device: {} | Channel Order: {:?}",
                self.gpus, self.input, self.root_dir.display(),
                self.model_path.display(), self.weights_path.display(),
                self.input_blob, self.output_blob, self.batch_size, self.mean,
                self.resize, self.crop_size(), self.inference_device.str(), self.channel_order)
    }
}

fn ensure_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        bail!("{} file not found: {}", what, path.display());
    }
    Ok(())
}
