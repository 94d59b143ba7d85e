use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

/// A file reader that shows its progress.
///
/// Progress is the number of bytes read so far. The bar is labeled with
/// the file name.
pub struct FileProgress {
    inner: File,
    progress: ProgressBar,
}

impl FileProgress {
    /// Open a file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let inner = File::open(path)
            .with_context(|| format!("Cannot open {} for reading", path.display()))?;
        let len = inner
            .metadata()
            .with_context(|| format!("Cannot get the size of {}", path.display()))?
            .len();

        let progress = ProgressBar::new(len);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{msg} {bar:30} {bytes}/{total_bytes} ETA: {eta_precise}"),
        );
        if let Some(name) = path.file_name() {
            progress.set_message(&name.to_string_lossy());
        }

        Ok(FileProgress { inner, progress })
    }
}

impl Read for FileProgress {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n_read = self.inner.read(buf)?;
        self.progress.inc(n_read as u64);
        Ok(n_read)
    }
}

impl Drop for FileProgress {
    fn drop(&mut self) {
        self.progress.finish_and_clear();
    }
}

/// Information about a training run.
///
/// Stored alongside the configuration in every checkpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TrainInfo {
    data_path: String,
    model_dir: String,
    start: String,
    end: Option<String>,
}

impl TrainInfo {
    /// Construct new training information, the start time is the
    /// current time.
    pub fn new(data_path: impl AsRef<Path>, model_dir: impl AsRef<Path>) -> Self {
        TrainInfo {
            data_path: data_path.as_ref().to_string_lossy().into_owned(),
            model_dir: model_dir.as_ref().to_string_lossy().into_owned(),
            start: Local::now().to_rfc3339(),
            end: None,
        }
    }

    /// Get the directory with the preprocessed data.
    pub fn data_path(&self) -> &str {
        &self.data_path
    }

    /// Get the model directory.
    pub fn model_dir(&self) -> &str {
        &self.model_dir
    }

    /// Get the start of training as an RFC 3339 timestamp.
    pub fn start(&self) -> &str {
        &self.start
    }

    /// Get the end of training, `None` while training is in progress.
    pub fn end(&self) -> Option<&str> {
        self.end.as_deref()
    }

    /// Mark the current time as the end of training.
    pub fn set_end(&mut self) {
        self.end = Some(Local::now().to_rfc3339());
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Read;

    use super::{FileProgress, TrainInfo};

    #[test]
    fn file_progress_reads_file() {
        let mut data = String::new();
        FileProgress::open("testdata/round_trip.conll")
            .unwrap()
            .read_to_string(&mut data)
            .unwrap();
        assert_eq!(data, fs::read_to_string("testdata/round_trip.conll").unwrap());
    }

    #[test]
    fn file_progress_of_missing_file() {
        assert!(FileProgress::open("testdata/missing.conll").is_err());
    }

    #[test]
    fn train_info_end_is_set() {
        let mut info = TrainInfo::new("data", "trained_model");
        assert_eq!(info.data_path(), "data");
        assert_eq!(info.model_dir(), "trained_model");
        assert!(info.end().is_none());

        info.set_end();
        assert!(info.end().unwrap() >= info.start());
    }
}
