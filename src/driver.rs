use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use toml::Value;

use crate::checkpoint::Checkpointer;
use crate::config::{Mode, TrainConfig};
use crate::io::TrainInfo;
use crate::metrics::PassStats;
use crate::squad::SquadExample;
use crate::train_model::SpanModel;
use crate::util::VersionInfo;

/// How the model parameters were initialized.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Initialization {
    /// Parameters were restored from the given checkpoint.
    Restored(PathBuf),

    /// Parameters are randomly initialized.
    Fresh,
}

/// Statistics of an epoch.
#[derive(Clone, Debug)]
pub struct EpochReport {
    pub epoch: u32,
    pub train: PassStats,
    pub validation: PassStats,
    pub checkpoint: PathBuf,
}

#[derive(Serialize)]
struct CheckpointMetadata<'a> {
    config: &'a TrainConfig,
    version_info: VersionInfo,
    training_info: &'a TrainInfo,
    epoch: u32,
}

/// Training driver.
///
/// The driver runs the epochs of a training run. Every epoch shuffles the
/// training data, performs a training pass, saves the model, and then
/// performs a validation pass.
pub struct TrainDriver<M, R> {
    model: M,
    config: TrainConfig,
    checkpointer: Checkpointer,
    train_info: TrainInfo,
    rng: R,
}

impl<M, R> TrainDriver<M, R>
where
    M: SpanModel,
    R: Rng,
{
    /// Construct a training driver.
    ///
    /// The model directory of `train_info` is created if it does not exist.
    pub fn new(model: M, config: TrainConfig, train_info: TrainInfo, rng: R) -> Result<Self> {
        let model_dir = Path::new(train_info.model_dir());
        fs::create_dir_all(model_dir).with_context(|| {
            format!("Cannot create model directory: {}", model_dir.display())
        })?;

        Ok(TrainDriver {
            model,
            config,
            checkpointer: Checkpointer::new(model_dir),
            train_info,
            rng,
        })
    }

    /// Initialize the model parameters.
    ///
    /// If `restore` is true and the model directory has a checkpoint, the
    /// parameters are restored from the checkpoint. Otherwise the model
    /// keeps its random initialization.
    pub fn initialize(&mut self, restore: bool) -> Result<Initialization> {
        if restore {
            if let Some(path) = self.checkpointer.latest()? {
                self.checkpointer.restore(&mut self.model, &path)?;
                eprintln!("Loading from previously stored session");
                return Ok(Initialization::Restored(path));
            }
        }

        Ok(Initialization::Fresh)
    }

    /// Train for the configured number of epochs.
    pub fn run(
        &mut self,
        train: &mut [SquadExample],
        dev: &[SquadExample],
    ) -> Result<Vec<EpochReport>> {
        eprintln!("Begin Training");

        let mut reports = Vec::with_capacity(self.config.epochs as usize);
        for epoch in 0..self.config.epochs {
            eprintln!("Epoch Number: {}", epoch);

            train.shuffle(&mut self.rng);
            let train_stats = self.run_pass(train, Mode::Train);

            eprintln!("Saving Weights");
            if epoch + 1 == self.config.epochs {
                self.train_info.set_end();
            }
            let checkpoint = self.save(epoch)?;

            eprintln!("Begin Validation");
            let validation_stats = self.run_pass(dev, Mode::Validation);

            eprintln!(
                "Epoch {} train {}, validation {}",
                epoch, train_stats, validation_stats
            );

            reports.push(EpochReport {
                epoch,
                train: train_stats,
                validation: validation_stats,
                checkpoint,
            });
        }

        Ok(reports)
    }

    /// Run a pass over the data.
    ///
    /// In training mode, parameters are updated with dropout. In validation
    /// mode, answer spans are predicted without dropout.
    pub fn run_pass(&mut self, examples: &[SquadExample], mode: Mode) -> PassStats {
        let pb = ProgressBar::new(examples.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar().template("{bar:30} {percent}% {msg} ETA: {eta_precise}"),
        );

        let mut stats = PassStats::default();
        for batch in examples.chunks(self.config.batch_size.max(1)) {
            match mode {
                Mode::Train => {
                    let loss = self.model.train_batch(batch, self.config.keep_prob);
                    stats.add_loss(loss, batch.len());
                }
                Mode::Validation => {
                    for example in batch {
                        let prediction = self.model.predict(example);
                        stats.add_loss(prediction.loss, 1);
                        stats.add_prediction(prediction.span, example.span);
                    }
                }
            }

            pb.inc(batch.len() as u64);
            pb.set_message(&stats.to_string());
        }

        pb.finish();

        stats
    }

    fn save(&self, epoch: u32) -> Result<PathBuf> {
        let metadata = Value::try_from(CheckpointMetadata {
            config: &self.config,
            version_info: VersionInfo::new(),
            training_info: &self.train_info,
            epoch,
        })
        .context("Cannot serialize checkpoint metadata")?;

        self.checkpointer.save(&self.model, metadata)
    }
}

impl<M, R> TrainDriver<M, R> {
    /// Get the model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Get the training information.
    pub fn train_info(&self) -> &TrainInfo {
        &self.train_info
    }

    /// Get the model, consuming the driver.
    pub fn into_model(self) -> M {
        self.model
    }
}
