// ============================================================
// Layer 1 - CLI Arguments
// ============================================================
// Flags for the evaluation harness. The underscore spellings
// (--data_dir, --use_tmp, ...) are kept so existing run
// scripts keep working.

use clap::Args;
use std::path::PathBuf;

use crate::application::eval_use_case::EvalConfig;
use crate::data::loader::DatasetChoice;
use crate::ml::model::ModelKind;

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Root directory holding one folder per dataset
    #[arg(long = "data_dir", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Where --save_report writes its files
    #[arg(long = "results_dir", default_value = "./results")]
    pub results_dir: PathBuf,

    /// Weights file of the trained model (model_config.json must sit beside it)
    #[arg(long)]
    pub ckpt: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "be")]
    pub dataset: DatasetChoice,

    /// Test batch size
    #[arg(long, default_value_t = 128)]
    pub bs: usize,

    /// Stage processed samples on disk under ./tmp
    #[arg(long = "use_tmp")]
    pub use_tmp: bool,

    /// Scratch directory name (default: <dataset>-<random hex>)
    #[arg(long = "tmp_name")]
    pub tmp_name: Option<String>,

    /// Leave the scratch directory in place afterwards
    #[arg(long = "keep_tmp")]
    pub keep_tmp: bool,

    /// Evaluate the convolutional transformer instead of DF
    #[arg(long = "run_cvt")]
    pub run_cvt: bool,

    /// Run on the ndarray CPU backend instead of wgpu
    #[arg(long)]
    pub cpu: bool,

    /// Write per-class CSV and summary JSON under --results_dir
    #[arg(long = "save_report")]
    pub save_report: bool,
}

impl From<EvalArgs> for EvalConfig {
    fn from(a: EvalArgs) -> Self {
        EvalConfig {
            data_dir:    a.data_dir,
            results_dir: a.results_dir,
            ckpt:        a.ckpt,
            dataset:     a.dataset,
            batch_size:  a.bs,
            use_tmp:     a.use_tmp,
            tmp_name:    a.tmp_name,
            keep_tmp:    a.keep_tmp,
            model:       if a.run_cvt { ModelKind::Cvt } else { ModelKind::Df },
            cpu:         a.cpu,
            save_report: a.save_report,
            ..EvalConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: EvalArgs,
    }

    fn parse(argv: &[&str]) -> EvalConfig {
        let mut full = vec!["wf-eval"];
        full.extend_from_slice(argv);
        Harness::try_parse_from(full).unwrap().args.into()
    }

    #[test]
    fn test_defaults() {
        let cfg = parse(&[]);
        assert_eq!(cfg.data_dir, PathBuf::from("./data"));
        assert_eq!(cfg.results_dir, PathBuf::from("./results"));
        assert_eq!(cfg.dataset, DatasetChoice::Be);
        assert_eq!(cfg.batch_size, 128);
        assert_eq!(cfg.model, ModelKind::Df);
        assert!(cfg.ckpt.is_none());
        assert!(!cfg.use_tmp && !cfg.keep_tmp && !cfg.cpu && !cfg.save_report);
    }

    #[test]
    fn test_underscore_flags() {
        let cfg = parse(&[
            "--data_dir", "/srv/wf", "--ckpt", "runs/a/model.mpk.gz",
            "--dataset", "be-interspace", "--bs", "64",
            "--use_tmp", "--tmp_name", "cache", "--keep_tmp", "--run_cvt",
        ]);
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/wf"));
        assert_eq!(cfg.dataset, DatasetChoice::BeInterspace);
        assert_eq!(cfg.batch_size, 64);
        assert_eq!(cfg.tmp_name.as_deref(), Some("cache"));
        assert!(cfg.use_tmp && cfg.keep_tmp);
        assert_eq!(cfg.model, ModelKind::Cvt);
    }

    #[test]
    fn test_unknown_dataset_rejected() {
        assert!(Harness::try_parse_from(["wf-eval", "--dataset", "imdb"]).is_err());
    }
}
