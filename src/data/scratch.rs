// ============================================================
// Layer 4 - Scratch Store
// ============================================================
// Spills processed samples to disk so large test splits do not
// have to stay resident in memory.
//
// Layout:
//   tmp/<name>/
//     index.json       ← manifest: the ScratchKey + sample count
//     000000.json      ← one ProcessedSample per file
//     000001.json
//     ...
//
// A directory is reused only when its manifest carries the same
// ScratchKey as the current run: same dataset and feature list,
// same labelled sample count, class count, input size and label
// mode. On reuse every sample file is parsed once up front. A
// missing or corrupt file forces a rewrite, because the test
// loader would otherwise stop at it without an error.
//
// Unless `keep` is set the whole directory is removed when the
// store is dropped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::processor::{Feature, ProcessedSample};

const MANIFEST: &str = "index.json";

/// Where and how to spill processed samples.
#[derive(Debug, Clone)]
pub struct ScratchOptions {
    /// Parent of all scratch directories (`./tmp` from the CLI)
    pub root: PathBuf,
    /// Subdirectory name; generated when absent
    pub name: Option<String>,
    /// Leave the files behind after the run
    pub keep: bool,
}

/// Everything that decides what the stored samples contain.
/// Two runs with equal keys produce identical sample files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchKey {
    pub dataset:  String,
    pub features: Vec<Feature>,

    /// Labelled samples in the split after unmonitored filtering
    pub samples: usize,

    /// Class count derived from meta.json or the labels
    pub num_classes: usize,

    /// Model input length the samples are batched to
    pub input_size: usize,

    pub subpage_as_labels: bool,
    pub include_unm:       bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Manifest {
    key:   ScratchKey,
    count: usize,
}

#[derive(Debug)]
pub struct ScratchStore {
    /// `<root>/<name>`, owned by this store
    dir: PathBuf,

    /// Number of sample files, indices `0..count`
    count: usize,

    /// Skip deleting `dir` on drop
    keep: bool,
}

impl ScratchStore {
    /// Open an existing store written for the same `key`, or
    /// build a new one from `samples`. The iterator is only
    /// consumed when the directory has to be (re)written.
    pub fn open_or_write<I>(opts: &ScratchOptions, key: &ScratchKey, samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = ProcessedSample>,
    {
        let name = opts
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-{:08x}", key.dataset, rand::random::<u32>()));
        let dir = opts.root.join(name);

        if let Some(manifest) = read_manifest(&dir) {
            if manifest.key != *key || manifest.count != key.samples {
                tracing::warn!(
                    "Scratch directory '{}' holds different data; rewriting",
                    dir.display()
                );
            } else if let Err(e) = verify_dir(&dir, manifest.count) {
                tracing::warn!("{:#}; rewriting", e);
            } else {
                tracing::info!(
                    "Reusing {} processed samples in '{}'",
                    manifest.count,
                    dir.display()
                );
                return Ok(Self { dir, count: manifest.count, keep: opts.keep });
            }
        }

        Self::write(dir, opts, key, samples)
    }

    fn write<I>(dir: PathBuf, opts: &ScratchOptions, key: &ScratchKey, samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = ProcessedSample>,
    {
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Cannot clear '{}'", dir.display()))?;
        }
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create scratch dir '{}'", dir.display()))?;

        // An error below drops the store, which clears the dir unless `keep`
        let mut store = Self { dir, count: 0, keep: opts.keep };
        for sample in samples {
            let path = sample_path(&store.dir, store.count);
            fs::write(&path, serde_json::to_vec(&sample)?)
                .with_context(|| format!("Cannot write '{}'", path.display()))?;
            store.count += 1;
        }

        let manifest = Manifest { key: key.clone(), count: store.count };
        fs::write(store.dir.join(MANIFEST), serde_json::to_string_pretty(&manifest)?)
            .with_context(|| format!("Cannot write manifest in '{}'", store.dir.display()))?;

        tracing::info!("Stored {} processed samples in '{}'", store.count, store.dir.display());
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn read(&self, index: usize) -> Result<ProcessedSample> {
        read_sample(&self.dir, index)
    }

    /// Every sample file listed in the manifest exists and parses.
    pub fn verify(&self) -> Result<()> {
        verify_dir(&self.dir, self.count)
    }
}

impl Drop for ScratchStore {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            tracing::warn!("Could not remove '{}': {}", self.dir.display(), e);
        } else {
            tracing::debug!("Removed scratch dir '{}'", self.dir.display());
        }
    }
}

fn sample_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{index:06}.json"))
}

fn read_sample(dir: &Path, index: usize) -> Result<ProcessedSample> {
    let path = sample_path(dir, index);
    let bytes = fs::read(&path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("Corrupt scratch sample '{}'", path.display()))
}

fn verify_dir(dir: &Path, count: usize) -> Result<()> {
    for index in 0..count {
        read_sample(dir, index)?;
    }
    Ok(())
}

fn read_manifest(dir: &Path) -> Option<Manifest> {
    let s = fs::read_to_string(dir.join(MANIFEST)).ok()?;
    serde_json::from_str(&s).ok()
}
