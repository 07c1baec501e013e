use crate::data::X;

/// A loaded network that maps one input tensor to one output tensor.
///
/// `OrtEngine` is the production implementation; anything else that can run a forward
/// pass (a test double, another runtime) plugs into the worker through this trait.
pub trait Engine {
    /// Shape of the input tensor as the model declares it. Dynamic axes are `0`.
    fn input_dims(&self) -> &[usize];

    /// Runs the forward pass and returns the designated output tensor.
    fn run(&mut self, xs: X) -> anyhow::Result<X>;
}

pub trait InferenceProcess {
    type Input;
    type Output;

    /// Pre-process the input data.
    fn preprocess(&self, xs: &[Self::Input]) -> anyhow::Result<X>;

    /// Executes the model on the preprocessed data.
    fn inference(&mut self, xs: X) -> anyhow::Result<X>;

    /// Post-process the model's output.
    fn postprocess(&self, ys: X, xs0: &[Self::Input]) -> anyhow::Result<Self::Output>;

    /// Executes the full pipeline.
    fn run(&mut self, xs: &[Self::Input]) -> anyhow::Result<Self::Output> {
        let ys = self.preprocess(xs)?;
        let ys = self.inference(ys)?;
        self.postprocess(ys, xs)
    }
}
