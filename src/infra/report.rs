// ============================================================
// Layer 6 - Report Writer
// ============================================================
// Persists the outcome of an evaluation pass when --save_report
// is given. Unlike the console printout, the CSV lists every
// class, including those with zero precision or recall.
//
// Output files:
//   <results_dir>/<run_name>/<dataset>_per_class.csv
//   <results_dir>/<run_name>/<dataset>_summary.json
//
// Example CSV output:
//   class,tp,tn,fp,fn,precision,recall,f1
//   0,41,1857,3,9,0.931818,0.820000,0.872340
//   1,0,1902,0,8,0.000000,0.000000,0.000000

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::confusion::ClassStats;

/// Headline numbers of one evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalSummary {
    pub run:         String,
    pub dataset:     String,
    pub model:       String,
    pub num_classes: usize,
    pub samples:     u64,
    pub loss:        f64,
    pub accuracy:    f64,
}

pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    /// Creates `<results_dir>/<run>` if needed.
    pub fn new(results_dir: impl AsRef<Path>, run: &str) -> Result<Self> {
        let dir = results_dir.as_ref().join(run);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create results dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn write_per_class(&self, dataset: &str, stats: &[ClassStats]) -> Result<PathBuf> {
        let path = self.dir.join(format!("{dataset}_per_class.csv"));
        let mut f = fs::File::create(&path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;

        writeln!(f, "class,tp,tn,fp,fn,precision,recall,f1")?;
        for s in stats {
            let c = &s.counts;
            writeln!(
                f,
                "{},{},{},{},{},{:.6},{:.6},{:.6}",
                s.class, c.tp, c.tn, c.fp, c.fn_, s.precision, s.recall, s.f1,
            )?;
        }

        tracing::debug!("Wrote {} class rows to '{}'", stats.len(), path.display());
        Ok(path)
    }

    pub fn write_summary(&self, summary: &EvalSummary) -> Result<PathBuf> {
        let path = self.dir.join(format!("{}_summary.json", summary.dataset));
        fs::write(&path, serde_json::to_string_pretty(summary)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        Ok(path)
    }
}
