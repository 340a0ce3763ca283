//! Payload files shared between coordinator and workers.
//!
//! Tasks are written by the coordinator as `task<N>.json`, results by the
//! workers as `result<rank>_<N>.json`, where `N` is a per-writer monotonic
//! counter. Every file is a versioned envelope around the serialized body.
//! A consumed file is deleted by its reader.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{GeneticError, Result, ResultExt};

/// Format tag written into every payload file.
pub const PAYLOAD_FORMAT: &str = "genpool-payload";
/// Current payload version.
pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Serialize)]
struct PayloadRef<'a, T> {
    format: &'static str,
    version: u32,
    body: &'a T,
}

#[derive(Deserialize)]
struct Payload<T> {
    format: String,
    version: u32,
    body: T,
}

/// A staging directory plus the writer's file counter.
#[derive(Debug)]
pub struct PayloadStaging {
    dir: PathBuf,
    counter: AtomicU64,
}

impl PayloadStaging {
    /// Uses `dir` as staging area, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .context(format!("Failed to create staging directory {}", dir.display()))?;
        Ok(Self {
            dir,
            counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of files written so far.
    pub fn written(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Writes a task file and returns its path.
    pub fn write_task<T: Serialize>(&self, task: &T) -> Result<PathBuf> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!("task{}.json", n));
        write_payload(&path, task)?;
        Ok(path)
    }

    /// Writes a result file for `rank` and returns its path.
    pub fn write_result<T: Serialize>(&self, rank: usize, result: &T) -> Result<PathBuf> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!("result{}_{}.json", rank, n));
        write_payload(&path, result)?;
        Ok(path)
    }

    /// Reads a payload file without deleting it.
    pub fn read<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let path = path.as_ref();
        let file = fs::File::open(path)
            .context(format!("Failed to open payload {}", path.display()))?;
        let payload: Payload<T> = serde_json::from_reader(BufReader::new(file))?;
        if payload.format != PAYLOAD_FORMAT || payload.version != PAYLOAD_VERSION {
            return Err(GeneticError::Protocol(format!(
                "{} is not a version {} payload (found {} v{})",
                path.display(),
                PAYLOAD_VERSION,
                payload.format,
                payload.version
            )));
        }
        Ok(payload.body)
    }

    /// Reads a payload file and deletes it.
    pub fn consume<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let body = self.read(path.as_ref())?;
        self.remove(path)?;
        Ok(body)
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::remove_file(path).context(format!("Failed to remove payload {}", path.display()))
    }
}

fn write_payload<T: Serialize>(path: &Path, body: &T) -> Result<()> {
    let payload = PayloadRef {
        format: PAYLOAD_FORMAT,
        version: PAYLOAD_VERSION,
        body,
    };
    let file = fs::File::create(path)
        .context(format!("Failed to create payload {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &payload)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_task_files_are_numbered() {
        let dir = TempDir::new().unwrap();
        let staging = PayloadStaging::new(dir.path()).unwrap();

        let first = staging.write_task(&vec![1, 2, 3]).unwrap();
        let second = staging.write_task(&vec![4]).unwrap();
        assert_eq!(first.file_name().unwrap(), "task0.json");
        assert_eq!(second.file_name().unwrap(), "task1.json");

        let body: Vec<i32> = staging.consume(&first).unwrap();
        assert_eq!(body, vec![1, 2, 3]);
        assert!(!first.exists());
        assert!(second.exists());
    }

    #[test]
    fn test_result_file_name_carries_rank() {
        let dir = TempDir::new().unwrap();
        let staging = PayloadStaging::new(dir.path()).unwrap();
        let path = staging.write_result(3, &"done").unwrap();
        assert_eq!(path.file_name().unwrap(), "result3_0.json");
    }

    #[test]
    fn test_missing_payload_names_the_file() {
        let dir = TempDir::new().unwrap();
        let staging = PayloadStaging::new(dir.path()).unwrap();
        let err = staging.consume::<i32>(dir.path().join("task4.json")).unwrap_err();
        assert!(matches!(err, GeneticError::Other(_)));
        assert!(err.to_string().starts_with("Failed to open payload"));
        assert!(err.to_string().contains("task4.json"));
    }

    #[test]
    fn test_foreign_file_rejected() {
        let dir = TempDir::new().unwrap();
        let staging = PayloadStaging::new(dir.path()).unwrap();
        let path = dir.path().join("task9.json");
        fs::write(&path, r#"{"format":"other","version":1,"body":0}"#).unwrap();
        assert!(matches!(
            staging.read::<i32>(&path),
            Err(GeneticError::Protocol(_))
        ));
    }
}
