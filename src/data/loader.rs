// ============================================================
// Layer 4 - Test Split Loader
// ============================================================
// Reads the held-out split of a dataset and wires it into a
// Burn DataLoader.
//
// Expected layout:
//   <data_dir>/<dataset>/
//     test.jsonl   ← one LabeledTrace JSON object per line
//     meta.json    ← optional: {"sites": N, "subpages": M}
//
// Labelling rules:
//   - label = subpage id when `subpage_as_labels`, else site id
//   - unmonitored traces (no site) are dropped, or mapped to the
//     extra last class when `include_unm` is set
//   - class count comes from meta.json, else max(label) + 1
//
// The test loader is never shuffled and runs without worker
// threads, so two passes over it see identical batches.

use anyhow::{bail, ensure, Context, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};
use clap::ValueEnum;
use serde::Deserialize;
use std::{
    fmt, fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::data::{
    batcher::{TraceBatch, TraceBatcher},
    dataset::TraceDataset,
    processor::DataProcessor,
    scratch::{ScratchKey, ScratchOptions, ScratchStore},
};
use crate::domain::{trace::LabeledTrace, traits::TraceSource};

const TEST_SPLIT: &str = "test.jsonl";
const META_FILE:  &str = "meta.json";

/// Datasets the harness knows how to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatasetChoice {
    #[value(name = "be")]
    Be,
    #[value(name = "be-front")]
    BeFront,
    #[value(name = "be-interspace")]
    BeInterspace,
    #[value(name = "amazon")]
    Amazon,
    #[value(name = "webmd")]
    Webmd,
    #[value(name = "gong")]
    Gong,
}

impl DatasetChoice {
    /// Directory name under the data root
    pub fn dir_name(&self) -> &'static str {
        match self {
            DatasetChoice::Be           => "be",
            DatasetChoice::BeFront      => "be-front",
            DatasetChoice::BeInterspace => "be-interspace",
            DatasetChoice::Amazon       => "amazon",
            DatasetChoice::Webmd        => "webmd",
            DatasetChoice::Gong         => "gong",
        }
    }
}

impl fmt::Display for DatasetChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Samples per test batch; the last batch may be smaller
    pub batch_size: usize,

    /// Keep unmonitored traces as one extra, last class instead of
    /// dropping them
    pub include_unm: bool,

    /// Label by subpage id (true) or by site id (false)
    pub subpage_as_labels: bool,

    /// Spill processed samples to disk instead of holding them
    pub scratch: Option<ScratchOptions>,
}

#[derive(Debug, Default, Deserialize)]
struct DatasetMeta {
    sites:    Option<usize>,
    subpages: Option<usize>,
}

// ─── JsonlTraceSource ─────────────────────────────────────────────────────────
pub struct JsonlTraceSource {
    path: PathBuf,
}

impl JsonlTraceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TraceSource for JsonlTraceSource {
    fn load_all(&self) -> Result<Vec<LabeledTrace>> {
        let file = fs::File::open(&self.path)
            .with_context(|| format!("Cannot open split '{}'", self.path.display()))?;

        let mut traces = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let trace: LabeledTrace = serde_json::from_str(&line).with_context(|| {
                format!("{}:{}: malformed trace", self.path.display(), lineno + 1)
            })?;
            traces.push(trace);
        }

        tracing::debug!("Read {} traces from '{}'", traces.len(), self.path.display());
        Ok(traces)
    }
}

// ─── TestSplit ────────────────────────────────────────────────────────────────
pub struct TestSplit<B: Backend> {
    /// Unshuffled, single-threaded batches of the split
    pub loader: Arc<dyn DataLoader<TraceBatch<B>>>,

    /// Width of the model head and of the confusion table
    pub num_classes: usize,

    /// Labelled samples behind the loader; a complete pass over
    /// `loader` yields exactly this many
    pub samples: usize,

    pub batch_size: usize,
}

impl<B: Backend> TestSplit<B> {
    pub fn num_batches(&self) -> usize {
        self.samples.div_ceil(self.batch_size.max(1))
    }
}

/// Load, label, process and batch the test split of `dataset`.
pub fn load_test_split<B: Backend>(
    data_dir:   &Path,
    dataset:    DatasetChoice,
    processor:  &DataProcessor,
    input_size: usize,
    opts:       &LoaderOptions,
    device:     &B::Device,
) -> Result<TestSplit<B>> {
    ensure!(opts.batch_size > 0, "batch size must be positive");

    let root   = data_dir.join(dataset.dir_name());
    let traces = JsonlTraceSource::new(root.join(TEST_SPLIT)).load_all()?;
    let meta   = read_meta(&root)?;

    let (labelled, num_classes) = assign_labels(traces, &meta, opts)?;
    tracing::info!(
        "Test split '{}': {} samples, {} classes",
        dataset,
        labelled.len(),
        num_classes
    );

    let expected  = labelled.len();
    let processed = labelled
        .into_iter()
        .map(|(trace, label)| processor.process(&trace, label));

    let dataset_store = match &opts.scratch {
        Some(scratch) => {
            let key = ScratchKey {
                dataset:           dataset.dir_name().to_string(),
                features:          processor.features().to_vec(),
                samples:           expected,
                num_classes,
                input_size,
                subpage_as_labels: opts.subpage_as_labels,
                include_unm:       opts.include_unm,
            };
            TraceDataset::Scratch(ScratchStore::open_or_write(scratch, &key, processed)?)
        }
        None => TraceDataset::InMemory(processed.collect()),
    };
    let samples = expected;

    let batcher = TraceBatcher::<B>::new(device.clone(), processor.input_channels(), input_size);
    let loader  = DataLoaderBuilder::new(batcher)
        .batch_size(opts.batch_size)
        .build(dataset_store);

    Ok(TestSplit { loader, num_classes, samples, batch_size: opts.batch_size })
}

fn read_meta(root: &Path) -> Result<DatasetMeta> {
    let path = root.join(META_FILE);
    if !path.exists() {
        return Ok(DatasetMeta::default());
    }
    let s = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("Malformed '{}'", path.display()))
}

fn assign_labels(
    traces: Vec<LabeledTrace>,
    meta:   &DatasetMeta,
    opts:   &LoaderOptions,
) -> Result<(Vec<(LabeledTrace, usize)>, usize)> {
    let mut monitored   = Vec::with_capacity(traces.len());
    let mut unmonitored = Vec::new();

    for trace in traces {
        let label = if opts.subpage_as_labels {
            match (trace.site, trace.subpage) {
                (None, _) => None,
                (Some(_), Some(sub)) => Some(sub),
                (Some(site), None) => bail!("monitored trace of site {site} has no subpage id"),
            }
        } else {
            trace.site
        };
        match label {
            Some(l) => monitored.push((trace, l)),
            None => unmonitored.push(trace),
        }
    }

    let declared = if opts.subpage_as_labels { meta.subpages } else { meta.sites };
    let num_monitored = match declared {
        Some(n) => {
            if let Some((_, bad)) = monitored.iter().find(|(_, l)| *l >= n) {
                bail!("label {bad} exceeds the {n} classes declared in {META_FILE}");
            }
            n
        }
        None => match monitored.iter().map(|(_, l)| *l).max() {
            Some(top) => top
                .checked_add(1)
                .with_context(|| format!("label {top} is too large to size the class table"))?,
            None => 0,
        },
    };

    if !opts.include_unm {
        if !unmonitored.is_empty() {
            tracing::debug!("Dropping {} unmonitored traces", unmonitored.len());
        }
        return Ok((monitored, num_monitored));
    }

    let unm_class = num_monitored;
    let num_classes = unm_class
        .checked_add(1)
        .with_context(|| format!("no class index left for unmonitored traces after {unm_class}"))?;
    monitored.extend(unmonitored.into_iter().map(|t| (t, unm_class)));
    Ok((monitored, num_classes))
}
