//! Options for building an ORT classification session.

use std::path::Path;
use anyhow::Result;
use crate::common::InferenceDevice;

#[derive(Debug, Clone)]
pub struct ConfigOrt {
    pub onnx_path: String,
    pub weights_path: String,
    pub ort_lib_path: String,
    pub device: InferenceDevice,
    pub batch_size: usize,
    pub input_name: String,
    pub output_name: String,
    /// Spatial override `(height, width)` for the input tensor (fully-conv mode).
    pub input_hw: Option<(u32, u32)>,
    pub profile: bool,

    /// TensorRT only: build the engine in fp16.
    pub trt_fp16_enable: bool,
}

impl Default for ConfigOrt {
    fn default() -> Self {
        Self {
            onnx_path: String::new(),
            weights_path: String::new(),
            ort_lib_path: String::new(),
            device: InferenceDevice::CPU,
            batch_size: 1,
            input_name: "data".to_string(),
            output_name: "fc".to_string(),
            input_hw: None,
            profile: false,
            trt_fp16_enable: false,
        }
    }
}

impl ConfigOrt {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_model<P: AsRef<Path>>(mut self, onnx_path: P) -> Result<Self> {
        self.onnx_path = onnx_path.as_ref().to_string_lossy().to_string();
        Ok(self)
    }

    pub fn with_weights<P: AsRef<Path>>(mut self, weights_path: P) -> Result<Self> {
        self.weights_path = weights_path.as_ref().to_string_lossy().to_string();
        Ok(self)
    }

    pub fn with_ort_lib_path(mut self, ort_lib_path: &str) -> Result<Self> {
        self.ort_lib_path = ort_lib_path.to_string();
        Ok(self)
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_device(mut self, device_type: InferenceDevice) -> Self {
        self.device = device_type;
        self
    }

    pub fn with_input_name(mut self, name: &str) -> Self {
        self.input_name = name.to_string();
        self
    }

    pub fn with_output_name(mut self, name: &str) -> Self {
        self.output_name = name.to_string();
        self
    }

    pub fn with_input_hw(mut self, height: u32, width: u32) -> Self {
        self.input_hw = Some((height, width));
        self
    }

    pub fn with_trt_fp16(mut self, x: bool) -> Self {
        self.trt_fp16_enable = x;
        self
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_blob_names_and_override() {
        let options = ConfigOrt::new()
            .with_model("net.onnx").unwrap()
            .with_device(InferenceDevice::CUDA(2))
            .with_input_name("input")
            .with_output_name("prob")
            .with_input_hw(224, 320);
        assert_eq!(options.onnx_path, "net.onnx");
        assert_eq!(options.device, InferenceDevice::CUDA(2));
        assert_eq!(options.input_name, "input");
        assert_eq!(options.output_name, "prob");
        assert_eq!(options.input_hw, Some((224, 320)));
    }
}
