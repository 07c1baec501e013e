mod bvr_image;
mod model_config;
mod label_record;
mod accuracy_report;
mod inference_device;

pub use bvr_image::*;
pub use model_config::*;
pub use label_record::*;
pub use accuracy_report::*;
pub use inference_device::*;
