//! JSON-array output collections.
//!
//! An output collection is a single JSON array document on disk. Every
//! append reads the whole array, extends it, and rewrites the file. The
//! rewrite goes to a sibling `.tmp` file that is then renamed over the
//! original, so readers never observe a half-written array.

use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::util::blocking;
use crate::Result;

/// A persisted, ordered sequence of records of type `T`.
#[derive(Debug)]
pub struct OutputCollection<T> {
    path: PathBuf,
    _records: PhantomData<fn() -> T>,
}

impl<T> Clone for OutputCollection<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _records: PhantomData,
        }
    }
}

impl<T> OutputCollection<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record. A missing file is an empty collection.
    pub fn load_sync(&self) -> Result<Vec<T>> {
        read_array(&self.path)
    }

    /// Read-modify-write: append `records` and rewrite the file.
    ///
    /// Returns the collection length after the append.
    pub fn append_sync(&self, records: Vec<T>) -> Result<usize> {
        let mut existing: Vec<T> = read_array(&self.path)?;
        let added = records.len();
        existing.extend(records);
        write_array(&self.path, &existing)?;
        debug!(
            "Appended {} records to {} (now {})",
            added,
            self.path.display(),
            existing.len()
        );
        Ok(existing.len())
    }

    pub async fn load(&self) -> Result<Vec<T>> {
        let this = self.clone();
        blocking(move || this.load_sync()).await
    }

    pub async fn append(&self, records: Vec<T>) -> Result<usize> {
        let this = self.clone();
        blocking(move || this.append_sync(records)).await
    }

    /// Read every record of a collection that must already exist.
    pub async fn load_existing(&self) -> Result<Vec<T>> {
        let path = self.path.clone();
        blocking(move || {
            let text = fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&text)?)
        })
        .await
    }
}

/// An output collection shared by concurrent workers.
///
/// One lock covers the whole read-modify-write cycle, so appends from
/// different workers are serialized and none are lost.
#[derive(Debug)]
pub struct SharedCollection<T> {
    collection: OutputCollection<T>,
    lock: Mutex<()>,
}

impl<T> SharedCollection<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(collection: OutputCollection<T>) -> Arc<Self> {
        Arc::new(Self {
            collection,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        self.collection.path()
    }

    pub async fn append(&self, records: Vec<T>) -> Result<usize> {
        let _guard = self.lock.lock().await;
        self.collection.append(records).await
    }

    pub async fn load(&self) -> Result<Vec<T>> {
        let _guard = self.lock.lock().await;
        self.collection.load().await
    }
}

fn read_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        trace!("{} does not exist, treating as empty", path.display());
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn write_array<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    records.serialize(&mut ser)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&buf)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
