//! Command line of `classify_multigpu`.

use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use clap::Parser;
use regex::Regex;

use crate::common::{ChannelOrder, ClassifyConfig, InferenceDevice};
use crate::data::MeanSource;

/// Score a pretrained classifier on labelled images across several GPUs and print its
/// top-1 / top-5 accuracy.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "classify_multigpu", version)]
pub struct Args {
    /// GPU indices, one worker per index, e.g. `[0,1,2,3]`
    #[arg(long = "gpu", value_name = "LIST")]
    pub gpu: String,

    /// Glob pattern of the label list files (`<image path> <label>` per line)
    #[arg(long = "input", value_name = "PATTERN")]
    pub input: String,

    /// Prefix joined to every image path
    #[arg(long = "root_dir")]
    pub root_dir: Option<PathBuf>,

    /// ONNX graph of the network
    #[arg(long = "model")]
    pub model: PathBuf,

    /// Pretrained weights: the external data file of the graph, or the graph itself
    #[arg(long = "weights")]
    pub weights: PathBuf,

    #[arg(long = "input_blob", default_value = "data")]
    pub input_blob: String,

    #[arg(long = "output_blob", default_value = "fc")]
    pub output_blob: String,

    #[arg(long = "batch_size", default_value_t = 1)]
    pub batch_size: usize,

    /// Per-channel mean `.npy`. Unset uses the ILSVRC-2012 mean, an empty value disables it
    #[arg(long = "mean_file")]
    pub mean_file: Option<String>,

    /// Length of the shorter image side before cropping
    #[arg(long = "resize", default_value_t = 256)]
    pub resize: u32,

    #[arg(long = "crop_height")]
    pub crop_height: Option<u32>,

    #[arg(long = "crop_width")]
    pub crop_width: Option<u32>,

    /// Execution provider
    #[arg(long = "device", default_value = "cuda", value_parser = ["cuda", "tensorrt", "cpu"])]
    pub device: String,

    /// ONNX Runtime shared library
    #[arg(long = "ort_lib_path", env = "ORT_DYLIB_PATH", default_value = "libonnxruntime.so")]
    pub ort_lib_path: String,

    /// Channel order written into the input tensor
    #[arg(long = "channel_order", default_value = "bgr", value_parser = ["bgr", "rgb"])]
    pub channel_order: String,

    /// Build TensorRT engines in fp16
    #[arg(long = "trt_fp16")]
    pub trt_fp16: bool,

    /// Log per-batch timings
    #[arg(long = "profile")]
    pub profile: bool,

    /// Also write the report as JSON
    #[arg(long = "output_json")]
    pub output_json: Option<PathBuf>,
}

impl Args {
    pub fn into_config(self) -> Result<ClassifyConfig> {
        let gpus = parse_gpu_list(&self.gpu).with_context(|| format!("Invalid --gpu value '{}'", self.gpu))?;

        let Some(inference_device) = InferenceDevice::from_str(&self.device, gpus[0]) else {
            bail!("Unknown device '{}', expected one of {:?}", self.device, InferenceDevice::all_inference_devices());
        };
        let Some(channel_order) = ChannelOrder::from_str(&self.channel_order) else {
            bail!("Unknown channel order '{}'", self.channel_order);
        };

        Ok(ClassifyConfig {
            gpus,
            input: self.input,
            root_dir: self.root_dir.unwrap_or_default(),
            model_path: self.model,
            weights_path: self.weights,
            input_blob: self.input_blob,
            output_blob: self.output_blob,
            batch_size: self.batch_size,
            mean: MeanSource::from_arg(self.mean_file.as_deref()),
            resize: self.resize,
            crop_height: self.crop_height,
            crop_width: self.crop_width,
            inference_device,
            ort_lib_path: self.ort_lib_path,
            channel_order,
            trt_fp16: self.trt_fp16,
            profile: self.profile,
            output_json: self.output_json,
        })
    }
}

/// Parses a GPU list such as `[0,1,2,3]`, `[0, 1]` or a bare `0,1`.
///
/// Only non-negative integers separated by commas are accepted; the list may not be empty.
pub fn parse_gpu_list(list: &str) -> Result<Vec<usize>> {
    let shape = Regex::new(r"^\s*\[?\s*\d+(\s*,\s*\d+)*\s*,?\s*\]?\s*$")?;
    let trimmed = list.trim();
    let bracketed = trimmed.starts_with('[') && trimmed.ends_with(']');
    let bare = !trimmed.contains('[') && !trimmed.contains(']');
    if !shape.is_match(list) || !(bracketed || bare) {
        bail!("Expected a list of GPU indices such as [0,1,2,3]");
    }

    let inner = trimmed.trim_start_matches('[').trim_end_matches(']');
    let gpus = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().with_context(|| format!("GPU index '{}' out of range", s)))
        .collect::<Result<Vec<_>>>()?;

    let mut seen = gpus.clone();
    seen.sort_unstable();
    seen.dedup();
    if seen.len() != gpus.len() {
        log::warn!("GPU list {:?} repeats a device, it will run several workers", gpus);
    }
    Ok(gpus)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "classify_multigpu",
            "--gpu", "[0,1]",
            "--input", "lists/*.txt",
            "--model", "net.onnx",
            "--weights", "net.onnx",
        ]
    }

    #[test]
    fn parses_gpu_lists() {
        assert_eq!(parse_gpu_list("[0,1,2,3]").unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(parse_gpu_list("[0, 1]").unwrap(), vec![0, 1]);
        assert_eq!(parse_gpu_list(" [ 2 ] ").unwrap(), vec![2]);
        assert_eq!(parse_gpu_list("[3,]").unwrap(), vec![3]);
        assert_eq!(parse_gpu_list("1,0").unwrap(), vec![1, 0]);
    }

    #[test]
    fn rejects_anything_else() {
        for bad in ["__import__('os')", "[]", "", "[0,-1]", "[0;1]", "[0,1", "0]", "[a]", "[0,,1]"] {
            assert!(parse_gpu_list(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn defaults_match_driver() {
        let args = Args::try_parse_from(base_args()).unwrap();
        let config = args.into_config().unwrap();
        assert_eq!(config.gpus, vec![0, 1]);
        assert_eq!(config.input_blob, "data");
        assert_eq!(config.output_blob, "fc");
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.resize, 256);
        assert_eq!(config.mean, MeanSource::BuiltIn);
        assert_eq!(config.crop_size(), None);
        assert_eq!(config.inference_device, InferenceDevice::CUDA(0));
        assert_eq!(config.channel_order, ChannelOrder::Bgr);
        assert!(!config.profile);
    }

    #[test]
    fn snake_case_flags() {
        let mut argv = base_args();
        argv.extend([
            "--root_dir", "/data/val",
            "--batch_size", "32",
            "--mean_file", "",
            "--crop_height", "224",
            "--crop_width", "224",
            "--device", "tensorrt",
            "--channel_order", "rgb",
            "--output_json", "report.json",
        ]);
        let config = Args::try_parse_from(argv).unwrap().into_config().unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/data/val"));
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.mean, MeanSource::Disabled);
        assert_eq!(config.crop_size(), Some((224, 224)));
        assert_eq!(config.inference_device, InferenceDevice::TensorRT(0));
        assert_eq!(config.channel_order, ChannelOrder::Rgb);
        assert_eq!(config.output_json, Some(PathBuf::from("report.json")));
    }

    #[test]
    fn missing_required_flag_fails() {
        let argv = vec!["classify_multigpu", "--gpu", "[0]", "--input", "x.txt"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn unknown_device_fails() {
        let mut argv = base_args();
        argv.extend(["--device", "rocm"]);
        assert!(Args::try_parse_from(argv).is_err());
    }
}
