use anyhow::{bail, Result};
use serde::Serialize;

/// Compute devices.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Device {
    Cpu,
    Gpu,
}

impl Device {
    pub fn try_from_str(device: &str) -> Result<Device> {
        match device.to_uppercase().as_str() {
            "CPU" => Ok(Device::Cpu),
            "GPU" => Ok(Device::Gpu),
            _ => bail!("Unknown device: {}", device),
        }
    }
}

/// Passes over a data set.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Update parameters, dropout is applied.
    Train,

    /// Predict spans without updating parameters or applying dropout.
    Validation,
}

/// Reading comprehension model hyperparameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename = "ReadingComprehension")]
pub struct TrainConfig {
    /// Number of examples per gradient step.
    pub batch_size: usize,

    /// Dimensionality of the hidden layer.
    pub hidden_size: usize,

    /// Maximum paragraph length in tokens.
    ///
    /// Longer training paragraphs are discarded, longer validation
    /// paragraphs are truncated.
    pub max_para: usize,

    /// The number of training epochs.
    pub epochs: u32,

    /// Number of training examples.
    pub train_set_size: usize,

    /// Maximum question length in tokens over the training and
    /// validation data.
    pub max_question: usize,

    /// Probability of keeping a question unit during training.
    pub keep_prob: f32,

    /// The learning rate.
    pub lr: f32,

    /// Maximum length of a predicted answer span in tokens.
    pub max_answer_len: usize,

    /// Seed of the random number generator used for initialization,
    /// shuffling, and dropout.
    pub seed: u32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            batch_size: 64,
            hidden_size: 150,
            max_para: 300,
            epochs: 15,
            train_set_size: 0,
            max_question: 0,
            keep_prob: 0.6,
            lr: 0.05,
            max_answer_len: 15,
            seed: 0,
        }
    }
}
