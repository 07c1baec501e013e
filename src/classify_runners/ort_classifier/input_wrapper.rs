use anyhow::Result;
use ndarray::{Array, ArrayViewD, IxDyn};

/// Model input or output, wrapper over [`Array<f32, IxDyn>`]
#[derive(Debug, Clone, Default)]
pub struct X(pub Array<f32, IxDyn>);

impl From<Array<f32, IxDyn>> for X {
    fn from(x: Array<f32, IxDyn>) -> Self {
        Self(x)
    }
}

impl std::ops::Deref for X {
    type Target = Array<f32, IxDyn>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl X {
    pub fn from_shape_vec(shape: &[usize], xs: Vec<f32>) -> Result<Self> {
        Ok(Self::from(Array::from_shape_vec(shape, xs)?))
    }

    /// Stacks equally sized `(C, H, W)` planes into one `(N, C, H, W)` batch.
    pub fn stack_chw(planes: &[Vec<f32>], channels: usize, height: usize, width: usize) -> Result<Self> {
        let plane_len = channels * height * width;
        let mut batch_flat: Vec<f32> = Vec::with_capacity(planes.len() * plane_len);
        for plane in planes.iter() {
            anyhow::ensure!(
                plane.len() == plane_len,
                "Plane has {} values, expected {}x{}x{}",
                plane.len(), channels, height, width
            );
            batch_flat.extend_from_slice(plane);
        }
        Self::from_shape_vec(&[planes.len(), channels, height, width], batch_flat)
    }

    pub fn view(&self) -> ArrayViewD<'_, f32> {
        self.0.view()
    }

    pub fn ndim(&self) -> usize {
        self.0.ndim()
    }

    pub fn into_inner(self) -> Array<f32, IxDyn> {
        self.0
    }
}
