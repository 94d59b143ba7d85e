use std::fmt;

use serde::Serialize;

use crate::squad::Span;

fn span_len(span: Span) -> usize {
    span.1 + 1 - span.0
}

/// Is the predicted span exactly the gold span?
pub fn exact_match(predicted: Span, gold: Span) -> bool {
    predicted == gold
}

/// Token-level F1 score of a predicted span.
///
/// Tokens are identified by their paragraph position.
pub fn f1_score(predicted: Span, gold: Span) -> f32 {
    let start = predicted.0.max(gold.0);
    let end = predicted.1.min(gold.1);
    if start > end {
        return 0.;
    }

    let overlap = span_len((start, end)) as f32;
    let precision = overlap / span_len(predicted) as f32;
    let recall = overlap / span_len(gold) as f32;

    2. * precision * recall / (precision + recall)
}

/// Statistics of a pass over a data set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PassStats {
    n_examples: usize,
    loss: f32,
    n_exact: usize,
    f1: f32,
    n_predictions: usize,
}

impl PassStats {
    /// Add the loss of a batch of `n_examples` examples.
    pub fn add_loss(&mut self, loss: f32, n_examples: usize) {
        self.loss += loss;
        self.n_examples += n_examples;
    }

    /// Add a predicted span.
    pub fn add_prediction(&mut self, predicted: Span, gold: Span) {
        self.n_predictions += 1;
        if exact_match(predicted, gold) {
            self.n_exact += 1;
        }
        self.f1 += f1_score(predicted, gold);
    }

    /// Get the number of examples.
    pub fn n_examples(&self) -> usize {
        self.n_examples
    }

    /// Get the average loss.
    pub fn loss(&self) -> f32 {
        if self.n_examples == 0 {
            0.
        } else {
            self.loss / self.n_examples as f32
        }
    }

    /// Get the exact match ratio, `None` if there are no predictions.
    pub fn exact_match(&self) -> Option<f32> {
        if self.n_predictions == 0 {
            None
        } else {
            Some(self.n_exact as f32 / self.n_predictions as f32)
        }
    }

    /// Get the average F1 score, `None` if there are no predictions.
    pub fn f1(&self) -> Option<f32> {
        if self.n_predictions == 0 {
            None
        } else {
            Some(self.f1 / self.n_predictions as f32)
        }
    }
}

impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "loss: {:.5}", self.loss())?;
        if let (Some(em), Some(f1)) = (self.exact_match(), self.f1()) {
            write!(f, " EM: {:.2} F1: {:.2}", em * 100., f1 * 100.)?;
        }

        Ok(())
    }
}
