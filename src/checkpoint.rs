//! Model checkpoints.
//!
//! A model directory contains:
//!
//! - `checkpoint`: the checkpoint state, the path of the most recent
//!   checkpoint.
//! - `trained_model.ckpt`: the parameters, little-endian `f32` values in
//!   row-major order.
//! - `trained_model.ckpt.index`: the names, shapes, and offsets of the
//!   parameters and the training metadata.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use toml::Value;

use crate::train_model::{check_shape, load_parameters, SpanModel};

/// Name of the checkpoint state file.
pub const CHECKPOINT_STATE: &str = "checkpoint";

/// File name of saved parameters.
pub const CHECKPOINT_NAME: &str = "trained_model.ckpt";

/// Checkpoint state of a model directory.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CheckpointState {
    pub model_checkpoint_path: PathBuf,
}

impl CheckpointState {
    /// Read the checkpoint state of a model directory.
    ///
    /// A relative checkpoint path is resolved against the model directory.
    /// Returns `None` when the directory has no state file.
    pub fn read(model_dir: impl AsRef<Path>) -> Result<Option<Self>> {
        let model_dir = model_dir.as_ref();
        let path = model_dir.join(CHECKPOINT_STATE);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read checkpoint state: {}", path.display()))?;
        let mut state: CheckpointState = toml::from_str(&data)
            .with_context(|| format!("Cannot parse checkpoint state: {}", path.display()))?;

        if state.model_checkpoint_path.is_relative() {
            state.model_checkpoint_path = model_dir.join(&state.model_checkpoint_path);
        }

        Ok(Some(state))
    }

    /// Write the checkpoint state to a model directory.
    pub fn write(&self, model_dir: impl AsRef<Path>) -> Result<()> {
        let path = model_dir.as_ref().join(CHECKPOINT_STATE);
        let data = toml::to_string(self).context("Cannot serialize checkpoint state")?;
        fs::write(&path, data)
            .with_context(|| format!("Cannot write checkpoint state: {}", path.display()))
    }

    /// Path of the parameter index.
    pub fn index_path(&self) -> PathBuf {
        index_path(&self.model_checkpoint_path)
    }

    /// Does the checkpoint data or its index exist?
    pub fn exists(&self) -> bool {
        self.model_checkpoint_path.exists() || self.index_path().exists()
    }
}

fn index_path(checkpoint_path: &Path) -> PathBuf {
    let mut path = checkpoint_path.as_os_str().to_owned();
    path.push(".index");
    PathBuf::from(path)
}

#[derive(Debug, Deserialize, Serialize)]
struct TensorInfo {
    name: String,
    shape: Vec<usize>,
    offset: usize,
}

#[derive(Debug, Deserialize)]
struct CheckpointIndex {
    tensors: Vec<TensorInfo>,
}

/// Saves and restores model parameters.
pub struct Checkpointer {
    model_dir: PathBuf,
}

impl Checkpointer {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Checkpointer {
            model_dir: model_dir.into(),
        }
    }

    /// Get the path of saved parameters.
    pub fn checkpoint_path(&self) -> PathBuf {
        self.model_dir.join(CHECKPOINT_NAME)
    }

    /// Save the parameters of a model.
    ///
    /// `metadata` must be a table, its entries are stored in the index. An
    /// existing checkpoint is overwritten. Returns the checkpoint path.
    pub fn save<M>(&self, model: &M, metadata: Value) -> Result<PathBuf>
    where
        M: SpanModel,
    {
        let path = self.checkpoint_path();

        let f = File::create(&path)
            .with_context(|| format!("Cannot create checkpoint: {}", path.display()))?;
        let mut writer = BufWriter::new(f);
        let mut tensors = Vec::new();
        let mut offset = 0;
        for (name, param) in model.parameters() {
            for &v in param.iter() {
                writer.write_all(&v.to_le_bytes())?;
            }

            tensors.push(TensorInfo {
                name: name.to_owned(),
                shape: param.shape().to_vec(),
                offset,
            });
            offset += param.len();
        }
        writer
            .flush()
            .with_context(|| format!("Cannot write checkpoint: {}", path.display()))?;

        let mut index = match metadata {
            Value::Table(table) => table,
            _ => return Err(anyhow!("Checkpoint metadata is not a table")),
        };
        index.insert("tensors".to_owned(), Value::try_from(tensors)?);

        let index_data =
            toml::to_string(&Value::Table(index)).context("Cannot serialize checkpoint index")?;
        let index_path = index_path(&path);
        fs::write(&index_path, index_data)
            .with_context(|| format!("Cannot write checkpoint index: {}", index_path.display()))?;

        // Relative to the model directory, so that the directory can be moved.
        CheckpointState {
            model_checkpoint_path: PathBuf::from(CHECKPOINT_NAME),
        }
        .write(&self.model_dir)?;

        Ok(path)
    }

    /// Get the path of the most recent checkpoint.
    ///
    /// Returns `None` if there is no checkpoint state, or if neither the
    /// parameters nor the index of the recorded checkpoint exist.
    pub fn latest(&self) -> Result<Option<PathBuf>> {
        Ok(CheckpointState::read(&self.model_dir)?
            .filter(CheckpointState::exists)
            .map(|state| state.model_checkpoint_path))
    }

    /// Restore model parameters from a checkpoint.
    pub fn restore<M>(&self, model: &mut M, path: impl AsRef<Path>) -> Result<()>
    where
        M: SpanModel,
    {
        let path = path.as_ref();

        let index_path = index_path(path);
        let index_data = fs::read_to_string(&index_path)
            .with_context(|| format!("Cannot read checkpoint index: {}", index_path.display()))?;
        let index: CheckpointIndex = toml::from_str(&index_data)
            .with_context(|| format!("Cannot parse checkpoint index: {}", index_path.display()))?;

        let data = read_f32s(path)?;

        load_parameters(model, |name, shape| {
            let tensor = index
                .tensors
                .iter()
                .find(|tensor| tensor.name == name)
                .ok_or_else(|| anyhow!("Parameter {} is not in the checkpoint", name))?;
            check_shape(name, &tensor.shape, shape)?;

            let len = shape.0 * shape.1;
            tensor
                .offset
                .checked_add(len)
                .and_then(|end| data.get(tensor.offset..end))
                .map(ToOwned::to_owned)
                .ok_or_else(|| {
                    anyhow!(
                        "Checkpoint {} is truncated, parameter {} is incomplete",
                        path.display(),
                        name
                    )
                })
        })
    }
}

fn read_f32s(path: &Path) -> Result<Vec<f32>> {
    let mut f =
        File::open(path).with_context(|| format!("Cannot open checkpoint: {}", path.display()))?;
    let mut bytes = Vec::new();
    f.read_to_end(&mut bytes)
        .with_context(|| format!("Cannot read checkpoint: {}", path.display()))?;
    ensure!(
        bytes.len() % 4 == 0,
        "Checkpoint {} has a partial value",
        path.display()
    );

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use ndarray::Array2;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;
    use serde::Serialize;
    use toml::Value;

    use super::{CheckpointState, Checkpointer, CHECKPOINT_NAME, CHECKPOINT_STATE};
    use crate::config::TrainConfig;
    use crate::pointer::PointerModel;
    use crate::train_model::SpanModel;

    #[derive(Serialize)]
    struct Metadata {
        config: TrainConfig,
        epoch: u32,
    }

    fn model(hidden_size: usize, seed: u64) -> PointerModel<XorShiftRng> {
        let config = TrainConfig {
            hidden_size,
            ..TrainConfig::default()
        };
        let embeds = Array2::from_shape_fn((6, 3), |(i, j)| (i * 3 + j) as f32 / 10.);
        PointerModel::new(config, embeds, XorShiftRng::seed_from_u64(seed))
    }

    fn metadata() -> Value {
        Value::try_from(Metadata {
            config: TrainConfig::default(),
            epoch: 2,
        })
        .unwrap()
    }

    fn parameters(model: &PointerModel<XorShiftRng>) -> Vec<Array2<f32>> {
        model
            .parameters()
            .into_iter()
            .map(|(_, param)| param.to_owned())
            .collect()
    }

    #[test]
    fn save_then_restore() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path());
        assert_eq!(checkpointer.latest().unwrap(), None);

        let saved = model(4, 1);
        let path = checkpointer.save(&saved, metadata()).unwrap();
        assert_eq!(path, dir.path().join(CHECKPOINT_NAME));
        assert_eq!(checkpointer.latest().unwrap(), Some(path.clone()));

        let mut restored = model(4, 2);
        assert_ne!(parameters(&saved), parameters(&restored));
        checkpointer.restore(&mut restored, &path).unwrap();
        assert_eq!(parameters(&saved), parameters(&restored));
    }

    #[test]
    fn index_has_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path());
        let path = checkpointer.save(&model(4, 1), metadata()).unwrap();

        let state = CheckpointState::read(dir.path()).unwrap().unwrap();
        let index: Value = fs::read_to_string(state.index_path())
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(index["epoch"].as_integer(), Some(2));
        assert_eq!(index["config"]["hidden_size"].as_integer(), Some(150));
        assert_eq!(index["tensors"].as_array().unwrap().len(), 3);
        assert_eq!(fs::metadata(path).unwrap().len(), (3 * 4 * 2 + 2 * 4) * 4);
    }

    #[test]
    fn restore_rejects_other_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path());
        let path = checkpointer.save(&model(4, 1), metadata()).unwrap();

        let mut other = model(5, 1);
        assert!(checkpointer.restore(&mut other, &path).is_err());
    }

    #[test]
    fn state_without_data_is_not_a_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        CheckpointState {
            model_checkpoint_path: dir.path().join(CHECKPOINT_NAME),
        }
        .write(dir.path())
        .unwrap();

        let checkpointer = Checkpointer::new(dir.path());
        assert_eq!(checkpointer.latest().unwrap(), None);
    }

    #[test]
    fn restore_from_moved_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        let old_dir = dir.path().join("a");
        let new_dir = dir.path().join("b");
        fs::create_dir(&old_dir).unwrap();

        let saved = model(4, 1);
        Checkpointer::new(&old_dir)
            .save(&saved, metadata())
            .unwrap();
        fs::rename(&old_dir, &new_dir).unwrap();

        let state: Value = fs::read_to_string(new_dir.join(CHECKPOINT_STATE))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(
            state["model_checkpoint_path"].as_str(),
            Some(CHECKPOINT_NAME)
        );

        let checkpointer = Checkpointer::new(&new_dir);
        let path = checkpointer.latest().unwrap().unwrap();
        assert_eq!(path, new_dir.join(CHECKPOINT_NAME));

        let mut restored = model(4, 2);
        checkpointer.restore(&mut restored, &path).unwrap();
        assert_eq!(parameters(&saved), parameters(&restored));
    }

    #[test]
    fn out_of_range_offset_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path());
        let path = checkpointer.save(&model(4, 1), metadata()).unwrap();

        let state = CheckpointState::read(dir.path()).unwrap().unwrap();
        let mut index: Value = fs::read_to_string(state.index_path())
            .unwrap()
            .parse()
            .unwrap();
        for tensor in index["tensors"].as_array_mut().unwrap() {
            tensor.as_table_mut().unwrap().insert(
                "offset".to_owned(),
                Value::Integer(i64::max_value()),
            );
        }
        fs::write(state.index_path(), toml::to_string(&index).unwrap()).unwrap();

        let mut restored = model(4, 2);
        assert!(checkpointer.restore(&mut restored, &path).is_err());
    }

    #[test]
    fn non_table_metadata_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path());
        assert!(checkpointer.save(&model(4, 1), Value::Integer(1)).is_err());
    }
}
