pub mod inference_process;
pub mod ort_classifier;

pub use ort_classifier::*;
