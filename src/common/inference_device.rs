#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceDevice {
    CPU,
    CUDA(usize),
    TensorRT(usize),
    // TODO: Add/tests more device types (execution providers)
    // ROCm,
}

impl Default for InferenceDevice {
    fn default() -> Self {
        InferenceDevice::CUDA(0)
    }
}

// Hardcoded device names. Storing the "proper" spelling and the lowercase version.
const CPU: [&str; 2] = ["CPU","cpu"];
const CUDA: [&str; 2] = ["CUDA","cuda"];
const TENSOR_RT: [&str; 2] = ["TensorRT","tensorrt"];

impl InferenceDevice {
    pub fn from_str(device: &str, device_id: usize) -> Option<Self> {
        match device.to_lowercase().as_str() {
            "cpu" => Some(InferenceDevice::CPU),
            "cuda" => Some(InferenceDevice::CUDA(device_id)),
            "tensorrt" => Some(InferenceDevice::TensorRT(device_id)),
            // Add more cases for other devices as needed
            _ => None,
        }
    }

    /// GPU ordinal the device is pinned to, `None` for the CPU.
    pub fn device_id(&self) -> Option<usize> {
        match self {
            InferenceDevice::CPU => None,
            InferenceDevice::CUDA(id) | InferenceDevice::TensorRT(id) => Some(*id),
        }
    }

    pub fn str(&self) -> &'static str {
        match self {
            InferenceDevice::CPU => CPU[0],
            InferenceDevice::CUDA(_) => CUDA[0],
            InferenceDevice::TensorRT(_) => TENSOR_RT[0],
        }
    }

    pub fn str_lowercase(&self) -> &'static str {
        match self {
            InferenceDevice::CPU => CPU[1],
            InferenceDevice::CUDA(_) => CUDA[1],
            InferenceDevice::TensorRT(_) => TENSOR_RT[1],
        }
    }

    pub fn to_string(&self) -> String {
        match self.device_id() {
            Some(id) => format!("{}:{}", self.str(), id),
            None => self.str().to_string(),
        }
    }

    pub fn all_inference_devices() -> Vec<String> {
        vec![
            InferenceDevice::CPU.str_lowercase().to_string(),
            InferenceDevice::CUDA(0).str_lowercase().to_string(),
            InferenceDevice::TensorRT(0).str_lowercase().to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_cuda_device() {
        assert_eq!(InferenceDevice::default(), InferenceDevice::CUDA(0));
        assert_eq!(InferenceDevice::default().to_string(), "CUDA:0");
    }

    #[test]
    fn device_kind_is_case_insensitive() {
        assert_eq!(InferenceDevice::from_str("CUDA", 3), Some(InferenceDevice::CUDA(3)));
        assert_eq!(InferenceDevice::from_str("TensorRT", 1), Some(InferenceDevice::TensorRT(1)));
        assert_eq!(InferenceDevice::from_str("cpu", 7), Some(InferenceDevice::CPU));
        assert_eq!(InferenceDevice::from_str("rocm", 0), None);
    }

    #[test]
    fn display_name_carries_ordinal() {
        assert_eq!(InferenceDevice::CUDA(2).to_string(), "CUDA:2");
        assert_eq!(InferenceDevice::CPU.to_string(), "CPU");
        assert_eq!(InferenceDevice::CPU.device_id(), None);
    }
}
