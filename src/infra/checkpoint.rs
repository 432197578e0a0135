// ============================================================
// Layer 6 - Checkpoint Reader
// ============================================================
// Restores model weights with Burn's CompactRecorder and reads
// the hyperparameter record saved beside them.
//
// Expected layout:
//   checkpoints/<run_name>/
//     model.mpk.gz          ← weights, the path given to --ckpt
//     model_config.json     ← ModelConfig (features + sizes)
//
// The config is what lets us rebuild the exact architecture
// before loading weights into it.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::ml::model::ModelConfig;

const CONFIG_FILE:    &str = "model_config.json";
const WEIGHTS_SUFFIX: &str = ".mpk.gz";

/// The only precondition the harness treats as fatal up front.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("no checkpoint path given (use --ckpt)")]
    NotProvided,
    #[error("could not load checkpoint [{0}]: path does not exist")]
    NotFound(PathBuf),
}

pub struct CheckpointManager {
    /// Weights file as given on the command line
    weights: PathBuf,
    /// Directory holding the weights and config
    dir: PathBuf,
}

impl CheckpointManager {
    /// Validate the checkpoint path before any other work is done.
    pub fn open(path: Option<&Path>) -> Result<Self, CheckpointError> {
        let path = path.ok_or(CheckpointError::NotProvided)?;
        if !path.exists() {
            return Err(CheckpointError::NotFound(path.to_path_buf()));
        }
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self { weights: path.to_path_buf(), dir })
    }

    /// Name of the directory the checkpoint lives in, used to
    /// group reports by training run.
    pub fn run_name(&self) -> Option<String> {
        self.dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
    }

    pub fn load_config(&self) -> Result<ModelConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed model config '{}'", path.display()))
    }

    /// Load weights into `model`. The architecture must match
    /// the one that produced the checkpoint.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let stem = self.recorder_path();
        tracing::info!("Loading weights from '{}'", self.weights.display());

        let record = CompactRecorder::new()
            .load(stem, device)
            .with_context(|| {
                format!("Cannot load weights '{}'", self.weights.display())
            })?;

        Ok(model.load_record(record))
    }

    /// The recorder appends its own extension, so hand it the
    /// path without `.mpk.gz`.
    fn recorder_path(&self) -> PathBuf {
        let name = self.weights.to_string_lossy();
        match name.strip_suffix(WEIGHTS_SUFFIX) {
            Some(stem) => PathBuf::from(stem),
            None       => self.weights.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::record::FileRecorder;

    use crate::ml::df_net::{DfNet, DfNetConfig};

    #[test]
    fn test_missing_path_is_fatal() {
        assert!(matches!(CheckpointManager::open(None), Err(CheckpointError::NotProvided)));
        let r = CheckpointManager::open(Some(Path::new("/definitely/not/here.mpk.gz")));
        assert!(matches!(r, Err(CheckpointError::NotFound(_))));
    }

    #[test]
    fn test_run_name_and_config() {
        let tmp = tempfile::tempdir().unwrap();
        let run = tmp.path().join("df-run-7");
        fs::create_dir_all(&run).unwrap();
        let weights = run.join("model.mpk.gz");
        fs::write(&weights, b"").unwrap();
        fs::write(run.join(CONFIG_FILE), r#"{"feature_list": ["dirs"], "input_size": 128}"#).unwrap();

        let ckpt = CheckpointManager::open(Some(weights.as_path())).unwrap();
        assert_eq!(ckpt.run_name().as_deref(), Some("df-run-7"));
        assert_eq!(ckpt.recorder_path(), run.join("model"));
        assert_eq!(ckpt.load_config().unwrap().input_size, 128);
    }

    #[test]
    fn test_weights_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let device = Default::default();
        let cfg = DfNetConfig::new(3, 1)
            .with_filters(2)
            .with_stage_count(1)
            .with_mlp_hidden_dim(4);

        let saved: DfNet<NdArray> = cfg.init(&device);
        let recorder = CompactRecorder::new();
        let stem = tmp.path().join("model");
        recorder.record(saved.clone().into_record(), stem.clone()).unwrap();
        let weights = stem.with_extension(<CompactRecorder as FileRecorder<NdArray>>::file_extension());
        assert!(weights.exists());

        let ckpt = CheckpointManager::open(Some(weights.as_path())).unwrap();
        let fresh: DfNet<NdArray> = cfg.init(&device);
        let loaded = ckpt.load_model(fresh, &device).unwrap();

        let x = Tensor::<NdArray, 3>::ones([2, 1, 32], &device);
        let a = saved.forward(x.clone()).into_data().to_vec::<f32>().unwrap();
        let b = loaded.forward(x).into_data().to_vec::<f32>().unwrap();
        // CompactRecorder stores half precision
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-2);
        }
    }
}
