mod ort_engine;
mod classify_worker;
pub mod image_ops;
pub mod input_wrapper;

pub use ort_engine::*;
pub use classify_worker::*;
