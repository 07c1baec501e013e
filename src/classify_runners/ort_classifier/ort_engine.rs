//! File/code adapted from https://github.com/jamjamjon/usls

use std::sync::OnceLock;
use std::time::Instant;
use anyhow::{anyhow, bail, Result};
use half::{bf16, f16};
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{ExecutionProvider,
                          CPUExecutionProvider,
                          CUDAExecutionProvider,
                          TensorRTExecutionProvider},
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::Session,
    tensor::TensorElementType,
    value::{DynValue, Tensor, ValueType},
};
use crate::classify_runners::inference_process::Engine;
use crate::common::InferenceDevice;
use crate::data::{ConfigOrt, TimeCalc, X};

pub(crate) const CROSS_MARK: &str = "❌";

static ORT_RUNTIME: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Name, element type and dims (dynamic axes as `0`) of one model input or output.
#[derive(Debug, Clone)]
pub struct OrtTensorAttr {
    pub name: String,
    pub dtype: TensorElementType,
    pub dims: Vec<usize>,
}

/// ONNXRuntime Backend
#[derive(Debug)]
pub struct OrtEngine {
    session: Session,
    device: InferenceDevice,
    input_attrs: OrtTensorAttr,
    output_attrs: OrtTensorAttr,
    profile: bool,
    infer_time: TimeCalc,
}

impl OrtEngine {
    pub fn new(config: &ConfigOrt) -> Result<Self> {
        Self::init_runtime(&config.ort_lib_path)?;

        if config.weights_path != config.onnx_path {
            log::info!(
                "Weights {} are expected as external data of {}",
                config.weights_path, config.onnx_path
            );
        }

        let mut builder = Session::builder()?;

        let device = config.device;
        match device {
            InferenceDevice::TensorRT(device_id) => {
                Self::build_trt(&mut builder, config, device_id)?;
            }
            InferenceDevice::CUDA(device_id) => {
                Self::build_cuda(&mut builder, device_id)?;
            }
            InferenceDevice::CPU => {
                Self::build_cpu(&mut builder)?;
            }
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(&config.onnx_path)?;

        let input_attrs = Self::find_tensor(
            session.inputs.iter().map(|i| (i.name.as_str(), &i.input_type)),
            &config.input_name,
            "input",
        )?;
        let output_attrs = Self::find_tensor(
            session.outputs.iter().map(|o| (o.name.as_str(), &o.output_type)),
            &config.output_name,
            "output",
        )?;

        // summary
        log::info!(
            "Backend: ONNXRuntime | Device: {} | Input: {} {:?} {:?} | Output: {} {:?}",
            device.to_string(),
            input_attrs.name,
            input_attrs.dtype,
            input_attrs.dims,
            output_attrs.name,
            output_attrs.dims,
        );

        Ok(Self {
            session,
            device,
            input_attrs,
            output_attrs,
            profile: config.profile,
            infer_time: TimeCalc::default(),
        })
    }

    /// Loads the ONNX Runtime library once per process; every worker shares it.
    fn init_runtime(ort_lib_path: &str) -> Result<()> {
        let committed = ORT_RUNTIME.get_or_init(|| {
            let ort_init = if ort_lib_path.is_empty() {
                ort::init()
            } else {
                ort::init_from(ort_lib_path)
            };
            match ort_init.commit() {
                Ok(_) => Ok(()),
                Err(e) => Err(format!("{:?}", e)),
            }
        });
        committed
            .clone()
            .map_err(|e| anyhow!("Failed to commit ORT: {}", e))
    }

    fn build_trt(builder: &mut SessionBuilder, config: &ConfigOrt, device_id: usize) -> Result<()> {
        let mut trt = TensorRTExecutionProvider::default()
            .with_device_id(device_id as i32)
            .with_fp16(config.trt_fp16_enable)
            .with_engine_cache(true)
            .with_engine_cache_path("trt-cache")
            .with_timing_cache(false);

        // Fixed spatial size: the batch axis is the only one that varies between runs.
        if let Some((h, w)) = config.input_hw {
            let shape = |n: usize| format!("{}:{}x3x{}x{}", config.input_name, n, h, w);
            trt = trt
                .with_profile_min_shapes(shape(1))
                .with_profile_opt_shapes(shape(config.batch_size))
                .with_profile_max_shapes(shape(config.batch_size));
        }

        if trt.is_available()? {
            match trt.register(builder) {
                Ok(_) => { }
                Err(err) => { bail!("{CROSS_MARK} TensorRT initialization failed on GPU {}: {:?}", device_id, err) }
            }
            log::info!("🐢 Initial model serialization with TensorRT may takes some time...");
            Ok(())
        } else {
            bail!("{CROSS_MARK} TensorRT execution provider not available")
        }
    }

    fn build_cuda(builder: &mut SessionBuilder, device_id: usize) -> Result<()> {
        let ep = CUDAExecutionProvider::default()
            .with_device_id(device_id as i32);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { bail!("{CROSS_MARK} CUDA initialization failed on GPU {}: {:?}", device_id, err) }
            }
            Ok(())
        } else {
            bail!("{CROSS_MARK} CUDA execution provider not available")
        }
    }

    fn build_cpu(builder: &mut SessionBuilder) -> Result<()> {
        let ep = CPUExecutionProvider::default();
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { bail!("{CROSS_MARK} CPU initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            bail!("{CROSS_MARK} CPU execution provider not available")
        }
    }

    fn find_tensor<'a>(
        mut candidates: impl Iterator<Item = (&'a str, &'a ValueType)>,
        name: &str,
        kind: &str,
    ) -> Result<OrtTensorAttr> {
        let mut seen = Vec::new();
        let found = candidates.find(|(n, _)| {
            seen.push(n.to_string());
            *n == name
        });
        let Some((_, value_type)) = found else {
            bail!("Model has no {} named '{}' (available: {:?})", kind, name, seen);
        };
        let Some(dtype) = value_type.tensor_type() else {
            bail!("Model {} '{}' is not a tensor", kind, name);
        };
        let dims = value_type
            .tensor_shape()
            .map(|shape| shape.iter().map(|&d| if d < 0 { 0 } else { d as usize }).collect())
            .unwrap_or_default();
        Ok(OrtTensorAttr {
            name: name.to_string(),
            dtype,
            dims,
        })
    }

    fn tensor_preprocess(x: X, dtype: &TensorElementType) -> Result<DynValue> {
        let x = match dtype {
            TensorElementType::Float32 => Tensor::from_array(x.into_inner())?.into_dyn(),
            TensorElementType::Float16 => Tensor::from_array(x.mapv(f16::from_f32))?.into_dyn(),
            TensorElementType::Bfloat16 => Tensor::from_array(x.mapv(bf16::from_f32))?.into_dyn(),
            TensorElementType::Float64 => Tensor::from_array(x.mapv(|x_| x_ as f64))?.into_dyn(),
            _ => bail!("Unsupported ort input tensor type: {:?}", dtype),
        };
        Ok(x)
    }

    fn tensor_postprocess(x: &DynValue, dtype: &TensorElementType) -> Result<Array<f32, IxDyn>> {
        fn _extract_and_convert<T>(x: &DynValue, map_fn: impl Fn(T) -> f32) -> Result<Array<f32, IxDyn>>
        where
            T: Clone + 'static + ort::tensor::PrimitiveTensorElementType,
        {
            let view = x.try_extract_array::<T>()?;
            Ok(view.mapv(map_fn))
        }
        match dtype {
            TensorElementType::Float32 => _extract_and_convert::<f32>(x, |x| x),
            TensorElementType::Float16 => _extract_and_convert::<f16>(x, f16::to_f32),
            TensorElementType::Bfloat16 => _extract_and_convert::<bf16>(x, bf16::to_f32),
            TensorElementType::Float64 => _extract_and_convert::<f64>(x, |x| x as f32),
            _ => Err(anyhow!("Unsupported ort output tensor type: {:?}", dtype)),
        }
    }

    pub fn engine_run(&mut self, xs: X) -> Result<X> {
        let t_pre = Instant::now();
        let input = Self::tensor_preprocess(xs, &self.input_attrs.dtype)?;
        let t_pre = t_pre.elapsed();

        let t_run = Instant::now();
        let outputs = self
            .session
            .run(ort::inputs![self.input_attrs.name.as_str() => input])?;
        let t_run = t_run.elapsed();

        let t_post = Instant::now();
        let y = Self::tensor_postprocess(&outputs[self.output_attrs.name.as_str()], &self.output_attrs.dtype)?;
        drop(outputs);
        let t_post = t_post.elapsed();

        self.infer_time.add_or_push(0, t_pre);
        self.infer_time.add_or_push(1, t_run);
        self.infer_time.add_or_push(2, t_post);

        if self.profile {
            log::info!(
                "[Profile] {:?} | alignment: {:?} ({:?} avg) | inference: {:?} ({:?} avg) | to_f32: {:?} ({:?} avg)",
                self.device,
                t_pre,
                self.infer_time.avg_i(0),
                t_run,
                self.infer_time.avg_i(1),
                t_post,
                self.infer_time.avg_i(2),
            );
        }

        Ok(X::from(y))
    }
}

impl Engine for OrtEngine {
    fn input_dims(&self) -> &[usize] {
        &self.input_attrs.dims
    }

    fn run(&mut self, xs: X) -> Result<X> {
        self.engine_run(xs)
    }
}
