mod config_ort;
mod time_calc;
mod mean_values;
pub mod batch_reader;
pub mod send_channels;

pub use config_ort::ConfigOrt;
pub use mean_values::{MeanSource, ILSVRC_2012_MEAN_BGR};

pub use crate::classify_runners::ort_classifier::image_ops::ImageOps;
pub use crate::classify_runners::ort_classifier::input_wrapper::X;

pub use time_calc::TimeCalc;
