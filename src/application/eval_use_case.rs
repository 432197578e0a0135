// ============================================================
// Layer 2 - EvalUseCase
// ============================================================
// Runs one evaluation pass end to end:
//
//   Step 1: Check the checkpoint path         (Layer 6 - infra)
//   Step 2: Read the model config             (Layer 6 - infra)
//   Step 3: Build the feature processor       (Layer 4 - data)
//   Step 4: Load the test split               (Layer 4 - data)
//   Step 5: Rebuild the model, load weights   (Layer 5 - ml)
//   Step 6: Run the test loop, check that     (Layer 5 - ml)
//           every sample was seen
//   Step 7: Print / save the results
//
// Step 1 happens before anything touches the data directory,
// so a bad --ckpt fails immediately.

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};
use std::path::PathBuf;

use crate::data::{
    loader::{load_test_split, DatasetChoice, LoaderOptions},
    processor::DataProcessor,
    scratch::ScratchOptions,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    report::{EvalSummary, ReportWriter},
};
use crate::ml::{
    evaluator::{evaluate, test_progress, EvalOutcome},
    model::{ModelKind, WfModel},
};

/// Epoch label printed on the summary line; evaluation only.
const EVAL_EPOCH: i32 = -1;

/// Everything one evaluation run needs, free of clap types.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Root holding one folder per dataset
    pub data_dir: PathBuf,

    /// Parent of the per-run report folders (--save_report only)
    pub results_dir: PathBuf,

    /// Weights file; `model_config.json` must sit beside it.
    /// None is reported as a missing checkpoint.
    pub ckpt: Option<PathBuf>,

    pub dataset: DatasetChoice,

    /// Samples per test batch
    pub batch_size: usize,

    /// Stage processed samples under `tmp_root` instead of memory
    pub use_tmp:  bool,
    pub tmp_root: PathBuf,

    /// Scratch folder name; `<dataset>-<random hex>` when None
    pub tmp_name: Option<String>,

    /// Leave the scratch folder behind, so the next run can reuse it
    pub keep_tmp: bool,

    /// Network variant the checkpoint was trained as
    pub model: ModelKind,

    /// NdArray CPU backend instead of wgpu
    pub cpu: bool,

    /// Write per-class CSV and summary JSON after printing
    pub save_report: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            data_dir:    PathBuf::from("./data"),
            results_dir: PathBuf::from("./results"),
            ckpt:        None,
            dataset:     DatasetChoice::Be,
            batch_size:  128,
            use_tmp:     false,
            tmp_root:    PathBuf::from("./tmp"),
            tmp_name:    None,
            keep_tmp:    false,
            model:       ModelKind::Df,
            cpu:         false,
            save_report: false,
        }
    }
}

impl EvalConfig {
    fn loader_options(&self) -> LoaderOptions {
        let scratch = self.use_tmp.then(|| ScratchOptions {
            root: self.tmp_root.clone(),
            name: self.tmp_name.clone(),
            keep: self.keep_tmp,
        });
        LoaderOptions {
            batch_size:        self.batch_size,
            include_unm:       false,
            subpage_as_labels: true,
            scratch,
        }
    }
}

pub struct EvalUseCase {
    config: EvalConfig,
}

impl EvalUseCase {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    /// Pick the backend and run the pass on it.
    pub fn execute(&self) -> Result<EvalOutcome> {
        if self.config.cpu {
            self.run::<NdArray>(NdArrayDevice::Cpu)
        } else {
            self.run::<Wgpu>(WgpuDevice::default())
        }
    }

    pub fn run<B: Backend>(&self, device: B::Device) -> Result<EvalOutcome> {
        let cfg = &self.config;

        // ── Step 1: Checkpoint precondition ───────────────────────────────────
        let ckpt = CheckpointManager::open(cfg.ckpt.as_deref())?;
        println!("Resuming from checkpoint...");

        // ── Step 2: Model configuration ───────────────────────────────────────
        let model_cfg = ckpt.load_config()?;
        println!("==> Model configuration:");
        println!("{}", serde_json::to_string_pretty(&model_cfg)?);

        // ── Step 3: Feature processor ─────────────────────────────────────────
        let processor = DataProcessor::new(model_cfg.feature_list.clone())?;
        let input_channels = processor.input_channels();

        // ── Step 4: Test split ────────────────────────────────────────────────
        let split = load_test_split::<B>(
            &cfg.data_dir,
            cfg.dataset,
            &processor,
            model_cfg.input_size,
            &cfg.loader_options(),
            &device,
        )?;
        println!("{}", split.num_classes);

        // ── Step 5: Model ─────────────────────────────────────────────────────
        let model = WfModel::<B>::init(cfg.model, &model_cfg, split.num_classes, input_channels, &device)
            .load(&ckpt, &device)?;
        tracing::info!(
            "{} model ready: {} input channels, {} classes",
            model.kind(),
            input_channels,
            split.num_classes,
        );

        // ── Step 6: Test loop ─────────────────────────────────────────────────
        let progress = test_progress(split.num_batches())?;
        let outcome  = evaluate(&model, split.loader.as_ref(), split.num_classes, &progress)?;
        outcome.ensure_covers(split.samples)?;

        // ── Step 7: Results ───────────────────────────────────────────────────
        let stats = outcome.confusion.class_stats();
        for s in stats.iter().filter(|s| s.is_reportable()) {
            println!("{}", s.format_row());
        }
        println!(
            "[{}] te. loss ({:0.3}), te. acc ({:0.3})",
            EVAL_EPOCH, outcome.loss, outcome.accuracy,
        );

        if cfg.save_report {
            let run = ckpt.run_name().unwrap_or_else(|| "checkpoint".to_string());
            let writer = ReportWriter::new(&cfg.results_dir, &run)?;
            let csv = writer.write_per_class(cfg.dataset.dir_name(), &stats)?;
            let json = writer.write_summary(&EvalSummary {
                run,
                dataset:     cfg.dataset.to_string(),
                model:       model.kind().to_string(),
                num_classes: split.num_classes,
                samples:     outcome.confusion.total(),
                loss:        outcome.loss,
                accuracy:    outcome.accuracy,
            })?;
            tracing::info!("Report written to '{}' and '{}'", csv.display(), json.display());
        }

        Ok(outcome)
    }
}
