// ============================================================
// Layer 3 - Per-class Confusion Table
// ============================================================
// One row per class, four counters per row:
//
//   column 0  TP  true == c and pred == c
//   column 1  TN  true != c and pred != c
//   column 2  FP  true != c and pred == c
//   column 3  FN  true == c and pred != c
//
// Every recorded sample touches every row exactly once, so for
// each class the four counters always sum to the number of
// samples recorded so far.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TP: usize = 0;
pub const TN: usize = 1;
pub const FP: usize = 2;
pub const FN: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfusionError {
    #[error("class index {index} out of range for {num_classes} classes")]
    ClassOutOfRange { index: usize, num_classes: usize },
}

/// Raw counters for one class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub tp:  u64,
    pub tn:  u64,
    pub fp:  u64,
    pub fn_: u64,
}

impl ClassCounts {
    pub fn total(&self) -> u64 {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// TP / (TP + FN), or 0 when the class never occurs
    pub fn recall(&self) -> f64 {
        let denom = self.tp + self.fn_;
        if denom == 0 {
            return 0.0;
        }
        self.tp as f64 / denom as f64
    }

    /// TP / (TP + FP), or 0 when the class is never predicted
    pub fn precision(&self) -> f64 {
        let denom = self.tp + self.fp;
        if denom == 0 {
            return 0.0;
        }
        self.tp as f64 / denom as f64
    }
}

/// Derived statistics for one class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassStats {
    pub class:     usize,
    pub counts:    ClassCounts,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
}

impl ClassStats {
    fn from_counts(class: usize, counts: ClassCounts) -> Self {
        let precision = counts.precision();
        let recall    = counts.recall();
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self { class, counts, precision, recall, f1 }
    }

    /// Only classes that were both predicted correctly at least
    /// once and recalled at least once make it into the console
    /// report. Zero-score classes are left out.
    pub fn is_reportable(&self) -> bool {
        self.precision > 0.0 && self.recall > 0.0
    }

    /// `class:\tTP\tTN\tFP\tFN\tprecision\trecall\tf1`
    pub fn format_row(&self) -> String {
        let c = &self.counts;
        format!(
            "{}:\t{}\t{}\t{}\t{}\t{:.3}\t{:.3}\t{:.3}",
            self.class, c.tp, c.tn, c.fp, c.fn_, self.precision, self.recall, self.f1,
        )
    }
}

/// `[num_classes, 4]` table of outcome counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    rows: Vec<[u64; 4]>,
}

impl ConfusionMatrix {
    /// All counters start at zero
    pub fn new(num_classes: usize) -> Self {
        Self { rows: vec![[0; 4]; num_classes] }
    }

    pub fn num_classes(&self) -> usize {
        self.rows.len()
    }

    /// Tally one `(prediction, ground truth)` pair against every class.
    pub fn record(&mut self, pred: usize, truth: usize) -> Result<(), ConfusionError> {
        let num_classes = self.rows.len();
        for index in [pred, truth] {
            if index >= num_classes {
                return Err(ConfusionError::ClassOutOfRange { index, num_classes });
            }
        }

        for (cls, row) in self.rows.iter_mut().enumerate() {
            let col = match (cls == truth, cls == pred) {
                (true, true)   => TP,
                (true, false)  => FN,
                (false, true)  => FP,
                (false, false) => TN,
            };
            row[col] += 1;
        }
        Ok(())
    }

    /// Feed a whole batch of predictions. Stops at the first
    /// out-of-range index; earlier pairs stay recorded.
    pub fn record_all(&mut self, preds: &[usize], truths: &[usize]) -> Result<(), ConfusionError> {
        for (&p, &t) in preds.iter().zip(truths) {
            self.record(p, t)?;
        }
        Ok(())
    }

    pub fn counts(&self, class: usize) -> ClassCounts {
        let r = self.rows[class];
        ClassCounts { tp: r[TP], tn: r[TN], fp: r[FP], fn_: r[FN] }
    }

    /// Number of samples recorded (any row sums to this)
    pub fn total(&self) -> u64 {
        self.rows.first().map_or(0, |r| r.iter().sum())
    }

    /// Samples whose prediction matched the label
    pub fn correct(&self) -> u64 {
        self.rows.iter().map(|r| r[TP]).sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.correct() as f64 / total as f64
    }

    pub fn class_stats(&self) -> Vec<ClassStats> {
        (0..self.rows.len())
            .map(|c| ClassStats::from_counts(c, self.counts(c)))
            .collect()
    }
}
