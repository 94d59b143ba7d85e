use anyhow::{bail, ensure, Result};
use ndarray::{ArrayView2, ArrayViewMut2};

use crate::squad::{Span, SquadExample};

/// Prediction for an example.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    /// The most probable answer span.
    pub span: Span,

    /// Loss of the gold span.
    pub loss: f32,
}

/// Trait for answer span models.
///
/// A span model predicts the start and end of the answer to a question
/// in a paragraph. The training driver only interacts with models through
/// this trait: it asks for parameter updates on training batches,
/// predictions on validation data, and the parameters themselves for
/// checkpointing.
pub trait SpanModel {
    /// Perform a step of gradient descent on a batch.
    ///
    /// Units are kept with probability `keep_prob`, a value of `1.0`
    /// disables dropout. Returns the summed loss of the batch.
    fn train_batch(&mut self, batch: &[SquadExample], keep_prob: f32) -> f32;

    /// Predict the answer span of an example, without dropout.
    fn predict(&self, example: &SquadExample) -> Prediction;

    /// Get the named parameter matrices.
    fn parameters(&self) -> Vec<(&'static str, ArrayView2<f32>)>;

    /// Get the named parameter matrices mutably.
    fn parameters_mut(&mut self) -> Vec<(&'static str, ArrayViewMut2<f32>)>;
}

/// Copy parameters into a model.
///
/// `lookup` is called with the name and shape of every model parameter and
/// should return the stored values in row-major order.
pub fn load_parameters<M, F>(model: &mut M, mut lookup: F) -> Result<()>
where
    M: SpanModel,
    F: FnMut(&str, (usize, usize)) -> Result<Vec<f32>>,
{
    for (name, mut param) in model.parameters_mut() {
        let values = lookup(name, param.dim())?;
        ensure!(
            values.len() == param.len(),
            "Parameter {} has {} values, expected {}",
            name,
            values.len(),
            param.len()
        );

        for (v, stored) in param.iter_mut().zip(values) {
            *v = stored;
        }
    }

    Ok(())
}

/// Check that a stored shape matches the model.
pub fn check_shape(name: &str, stored: &[usize], expected: (usize, usize)) -> Result<()> {
    if stored != [expected.0, expected.1] {
        bail!(
            "Parameter {} has shape {:?}, model expects {:?}",
            name,
            stored,
            expected
        );
    }

    Ok(())
}
