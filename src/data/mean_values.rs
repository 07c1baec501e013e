use std::fs::File;
use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use ndarray::{ArrayD, Axis};
use ndarray_npy::ReadNpyExt;
use crate::common::ChannelOrder;

/// Per-channel ILSVRC-2012 training-set mean, BGR order, 0-255 range.
pub const ILSVRC_2012_MEAN_BGR: [f32; 3] = [104.006_99, 116.668_77, 122.678_92];

/// Where the per-channel mean comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MeanSource {
    #[default] BuiltIn,
    File(PathBuf),
    Disabled,
}

impl MeanSource {
    /// Unset selects the built-in mean, an empty string disables subtraction.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None => MeanSource::BuiltIn,
            Some(s) if s.trim().is_empty() => MeanSource::Disabled,
            Some(s) => MeanSource::File(PathBuf::from(s)),
        }
    }

    /// Resolves to one value per input channel, or `None` when disabled.
    ///
    /// A file mean is used in the order it is stored; the built-in one is BGR and gets
    /// reordered for `ChannelOrder::Rgb`.
    pub fn load(&self, order: ChannelOrder) -> Result<Option<Vec<f32>>> {
        match self {
            MeanSource::Disabled => Ok(None),
            MeanSource::BuiltIn => {
                let mut mean = ILSVRC_2012_MEAN_BGR.to_vec();
                if order == ChannelOrder::Rgb {
                    mean.reverse();
                }
                Ok(Some(mean))
            }
            MeanSource::File(path) => {
                let array = read_mean_array(path)?;
                Ok(Some(per_channel_mean(array)?))
            }
        }
    }
}

fn read_mean_array(path: &Path) -> Result<ArrayD<f64>> {
    let open = || File::open(path).with_context(|| format!("Failed to open mean file {}", path.display()));

    match ArrayD::<f64>::read_npy(open()?) {
        Ok(array) => Ok(array),
        Err(f64_err) => {
            log::debug!("Mean file is not f64 ({f64_err}), retrying as f32");
            let array = ArrayD::<f32>::read_npy(open()?)
                .with_context(|| format!("Failed to parse mean file {}", path.display()))?;
            Ok(array.mapv(|x| x as f64))
        }
    }
}

/// `(C,)` is taken as-is, `(C, H, W)` is averaged over its spatial axes.
pub fn per_channel_mean(array: ArrayD<f64>) -> Result<Vec<f32>> {
    let reduced = match array.ndim() {
        1 => array,
        3 => {
            let spatial = array
                .mean_axis(Axis(2))
                .and_then(|a| a.mean_axis(Axis(1)));
            match spatial {
                Some(a) => a,
                None => bail!("Mean array has an empty spatial dimension"),
            }
        }
        n => bail!("Mean array must be (C,) or (C, H, W), got {} dimensions", n),
    };
    Ok(reduced.iter().map(|&x| x as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use ndarray_npy::WriteNpyExt;

    #[test]
    fn empty_string_disables_mean() {
        assert_eq!(MeanSource::from_arg(Some("")), MeanSource::Disabled);
        assert_eq!(MeanSource::from_arg(None), MeanSource::BuiltIn);
        assert_eq!(MeanSource::Disabled.load(ChannelOrder::Bgr).unwrap(), None);
    }

    #[test]
    fn builtin_mean_follows_channel_order() {
        let bgr = MeanSource::BuiltIn.load(ChannelOrder::Bgr).unwrap().unwrap();
        let rgb = MeanSource::BuiltIn.load(ChannelOrder::Rgb).unwrap().unwrap();
        assert_eq!(bgr[0], rgb[2]);
        assert_eq!(bgr[2], rgb[0]);
    }

    #[test]
    fn spatial_mean_is_reduced_per_channel() {
        let mut array = Array3::<f64>::zeros((3, 2, 2));
        array.index_axis_mut(Axis(0), 0).fill(1.0);
        array.index_axis_mut(Axis(0), 1).assign(&ndarray::arr2(&[[0.0, 2.0], [4.0, 6.0]]));
        array.index_axis_mut(Axis(0), 2).fill(-1.0);
        assert_eq!(per_channel_mean(array.into_dyn()).unwrap(), vec![1.0, 3.0, -1.0]);
    }

    #[test]
    fn reads_npy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mean.npy");
        let array = Array3::<f64>::from_elem((3, 4, 4), 100.0);
        array.write_npy(File::create(&path).unwrap()).unwrap();

        let mean = MeanSource::File(path).load(ChannelOrder::Bgr).unwrap().unwrap();
        assert_eq!(mean, vec![100.0, 100.0, 100.0]);
    }
}
