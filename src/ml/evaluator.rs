// ============================================================
// Layer 5 - Test Loop
// ============================================================
// One pass over the test loader:
//   - batches with a single sample (or none) are skipped
//   - cross-entropy loss per evaluated batch, averaged over
//     every batch the loader yielded (skipped ones included)
//   - argmax prediction per sample, tallied into the
//     per-class confusion table
//
// The caller is expected to hand in a model on a non-autodiff
// backend, so dropout is inactive and batch norm uses its
// running statistics: repeated passes give identical results.
//
// Burn's batch iterator ends quietly at the first sample the
// dataset cannot produce. `EvalOutcome::samples` counts what
// actually came out of the loader so the caller can compare it
// with the size of the split via `ensure_covers`.

use anyhow::{anyhow, ensure, Context, Result};
use burn::{
    data::dataloader::DataLoader,
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
    tensor::ElementConversion,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::data::batcher::TraceBatch;
use crate::domain::confusion::ConfusionMatrix;
use crate::ml::model::Classifier;

/// Aggregates of one evaluation pass
#[derive(Debug, Clone, Serialize)]
pub struct EvalOutcome {
    /// Sum of per-batch losses divided by `batches + skipped`,
    /// 0 when the loader yielded nothing
    pub loss: f64,

    /// Correct predictions / samples in evaluated batches
    pub accuracy: f64,

    /// Batches that went through the model
    pub batches: usize,

    /// Batches of at most one sample; they count towards the
    /// loss divisor but never reach the confusion table
    pub skipped: usize,

    /// Every sample the loader produced, skipped ones included
    pub samples: usize,

    /// Per-class TP/TN/FP/FN counters
    pub confusion: ConfusionMatrix,
}

impl EvalOutcome {
    /// Fails unless the pass saw all `expected` samples of the split.
    pub fn ensure_covers(&self, expected: usize) -> Result<()> {
        ensure!(
            self.samples == expected,
            "test pass stopped early: {} of {} samples were read",
            self.samples,
            expected,
        );
        Ok(())
    }
}

/// Progress bar sized to the number of test batches.
pub fn test_progress(num_batches: usize) -> Result<ProgressBar> {
    let bar = ProgressBar::new(num_batches as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("Test [{elapsed_precise}] {bar:10.cyan/blue} {pos}/{len} {msg}")
            .context("invalid progress template")?,
    );
    Ok(bar)
}

pub fn evaluate<B, M>(
    model:       &M,
    loader:      &dyn DataLoader<TraceBatch<B>>,
    num_classes: usize,
    progress:    &ProgressBar,
) -> Result<EvalOutcome>
where
    B: Backend,
    M: Classifier<B>,
{
    let mut confusion = ConfusionMatrix::new(num_classes);
    let mut loss_sum  = 0.0f64;
    let mut batches   = 0usize;
    let mut skipped   = 0usize;
    let mut samples   = 0usize;

    for batch in loader.iter() {
        progress.inc(1);

        let n = batch.targets.dims()[0];
        samples += n;
        if n <= 1 {
            skipped += 1;
            continue;
        }

        let logits = model.logits(batch.inputs);
        let ce = CrossEntropyLossConfig::new().init(&logits.device());
        let batch_loss: f64 = ce
            .forward(logits.clone(), batch.targets.clone())
            .into_scalar()
            .elem::<f64>();
        loss_sum += batch_loss;
        batches  += 1;

        // argmax(1) returns [batch, 1]
        let preds  = to_indices(logits.argmax(1).flatten::<1>(0, 1))?;
        let truths = to_indices(batch.targets)?;
        confusion.record_all(&preds, &truths)?;

        progress.set_message(format!(
            "acc={:.3} loss={:.3}",
            confusion.accuracy(),
            loss_sum / (batches + skipped) as f64,
        ));
    }
    progress.finish();

    if skipped > 0 {
        tracing::debug!("Skipped {} batches with fewer than two samples", skipped);
    }

    let yielded = batches + skipped;
    let loss = if yielded > 0 { loss_sum / yielded as f64 } else { 0.0 };
    Ok(EvalOutcome {
        loss,
        accuracy: confusion.accuracy(),
        batches,
        skipped,
        samples,
        confusion,
    })
}

fn to_indices<B: Backend>(t: Tensor<B, 1, Int>) -> Result<Vec<usize>> {
    let values = t
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow!("cannot read class indices: {e:?}"))?;
    values
        .into_iter()
        .map(|v| usize::try_from(v).with_context(|| format!("negative class index {v}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, data::dataloader::DataLoaderBuilder};

    use crate::data::{
        batcher::TraceBatcher,
        dataset::TraceDataset,
        processor::{Feature, ProcessedSample},
        scratch::{ScratchOptions, ScratchStore},
    };
    use crate::ml::df_net::DfNetConfig;

    /// Uses the first `k` input values as the logits.
    struct Passthrough {
        k: usize,
    }

    impl<B: Backend> Classifier<B> for Passthrough {
        fn logits(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
            let [n, _, _] = inputs.dims();
            inputs.slice([0..n, 0..1, 0..self.k]).reshape([n, self.k])
        }
    }

    fn key(samples: usize) -> crate::data::scratch::ScratchKey {
        crate::data::scratch::ScratchKey {
            dataset:           "be".into(),
            features:          vec![Feature::Dirs],
            samples,
            num_classes:       2,
            input_size:        2,
            subpage_as_labels: true,
            include_unm:       false,
        }
    }

    fn sample(logits: Vec<f32>, label: usize) -> ProcessedSample {
        ProcessedSample { size: logits.len(), features: vec![logits], label }
    }

    fn loader(
        samples:    Vec<ProcessedSample>,
        batch_size: usize,
        channels:   usize,
        input_size: usize,
    ) -> std::sync::Arc<dyn DataLoader<TraceBatch<NdArray>>> {
        loader_over(TraceDataset::InMemory(samples), batch_size, channels, input_size)
    }

    fn loader_over(
        dataset:    TraceDataset,
        batch_size: usize,
        channels:   usize,
        input_size: usize,
    ) -> std::sync::Arc<dyn DataLoader<TraceBatch<NdArray>>> {
        let batcher = TraceBatcher::<NdArray>::new(Default::default(), channels, input_size);
        DataLoaderBuilder::new(batcher)
            .batch_size(batch_size)
            .build(dataset)
    }

    #[test]
    fn test_two_class_scenario_through_loop() {
        let samples = vec![
            sample(vec![5.0, 0.0], 0),
            sample(vec![0.0, 5.0], 0),
            sample(vec![0.0, 5.0], 1),
        ];
        let dl = loader(samples, 3, 1, 2);
        let out = evaluate(&Passthrough { k: 2 }, dl.as_ref(), 2, &ProgressBar::hidden()).unwrap();

        assert_eq!(out.batches, 1);
        assert_eq!(out.skipped, 0);
        let c0 = out.confusion.counts(0);
        assert_eq!((c0.tp, c0.tn, c0.fp, c0.fn_), (1, 1, 0, 1));
        let c1 = out.confusion.counts(1);
        assert_eq!((c1.tp, c1.tn, c1.fp, c1.fn_), (1, 1, 1, 0));
        assert!((out.accuracy - 2.0 / 3.0).abs() < 1e-9);
        assert!(out.loss > 0.0);
    }

    #[test]
    fn test_single_sample_batch_skipped() {
        let samples = vec![
            sample(vec![3.0, 0.0], 0),
            sample(vec![0.0, 3.0], 1),
            sample(vec![0.0, 3.0], 0),
        ];
        let dl = loader(samples, 2, 1, 2);
        let out = evaluate(&Passthrough { k: 2 }, dl.as_ref(), 2, &ProgressBar::hidden()).unwrap();

        assert_eq!(out.batches, 1);
        assert_eq!(out.skipped, 1);
        assert_eq!(out.confusion.total(), 2);
        assert_eq!(out.accuracy, 1.0);
    }

    #[test]
    fn test_loss_divides_by_every_yielded_batch() {
        let first_two = vec![sample(vec![2.0, 0.5], 0), sample(vec![0.0, 1.0], 0)];
        let mut all_three = first_two.clone();
        all_three.push(sample(vec![0.0, 4.0], 1));

        let bar = ProgressBar::hidden();
        let alone = evaluate(&Passthrough { k: 2 }, loader(first_two, 2, 1, 2).as_ref(), 2, &bar).unwrap();
        let with_tail = evaluate(&Passthrough { k: 2 }, loader(all_three, 2, 1, 2).as_ref(), 2, &bar).unwrap();

        // [a, b] is scored, [c] is skipped but still divides the sum
        assert_eq!(with_tail.batches, 1);
        assert_eq!(with_tail.skipped, 1);
        assert_eq!(with_tail.samples, 3);
        assert!(alone.loss > 0.0);
        assert!((with_tail.loss - alone.loss / 2.0).abs() < 1e-9);
        assert_eq!(with_tail.confusion, alone.confusion);
    }

    #[test]
    fn test_corrupt_scratch_sample_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let opts = ScratchOptions {
            root: tmp.path().to_path_buf(),
            name: Some("be-cache".into()),
            keep: false,
        };
        let samples: Vec<ProcessedSample> = (0..6)
            .map(|i| sample(vec![i as f32, 0.0], i % 2))
            .collect();
        let store = ScratchStore::open_or_write(&opts, &key(6), samples).unwrap();
        std::fs::write(store.dir().join("000002.json"), b"{ truncated").unwrap();

        let dl = loader_over(TraceDataset::Scratch(store), 2, 1, 2);
        let out = evaluate(&Passthrough { k: 2 }, dl.as_ref(), 2, &ProgressBar::hidden()).unwrap();

        assert!(out.samples < 6);
        assert!(out.ensure_covers(6).is_err());
    }

    #[test]
    fn test_full_pass_covers_split() {
        let samples = vec![sample(vec![1.0, 0.0], 0), sample(vec![0.0, 1.0], 1), sample(vec![1.0, 0.0], 0)];
        let out = evaluate(&Passthrough { k: 2 }, loader(samples, 2, 1, 2).as_ref(), 2, &ProgressBar::hidden()).unwrap();
        assert!(out.ensure_covers(3).is_ok());
    }

    #[test]
    fn test_nothing_evaluated_gives_zeroes() {
        let dl = loader(vec![sample(vec![1.0, 0.0], 0)], 4, 1, 2);
        let out = evaluate(&Passthrough { k: 2 }, dl.as_ref(), 2, &ProgressBar::hidden()).unwrap();
        assert_eq!(out.batches, 0);
        assert_eq!(out.skipped, 1);
        assert_eq!(out.loss, 0.0);
        assert_eq!(out.accuracy, 0.0);

        let empty = loader(Vec::new(), 4, 1, 2);
        let out = evaluate(&Passthrough { k: 2 }, empty.as_ref(), 2, &ProgressBar::hidden()).unwrap();
        assert_eq!(out.skipped + out.batches, 0);
        assert_eq!(out.loss, 0.0);
    }

    #[test]
    fn test_label_out_of_range_is_an_error() {
        let samples = vec![sample(vec![1.0, 0.0], 0), sample(vec![1.0, 0.0], 1)];
        let dl = loader(samples, 2, 1, 2);
        // Only one class declared, but the model emits two logits
        let r = evaluate(&Passthrough { k: 2 }, dl.as_ref(), 1, &ProgressBar::hidden());
        assert!(r.is_err());
    }

    #[test]
    fn test_repeated_passes_identical() {
        let device = Default::default();
        let model = DfNetConfig::new(3, 2)
            .with_filters(4)
            .with_stage_count(1)
            .with_pool_size(2)
            .with_pool_stride(2)
            .with_mlp_hidden_dim(8)
            .init::<NdArray>(&device);

        let samples: Vec<ProcessedSample> = (0..9)
            .map(|i| ProcessedSample {
                features: vec![vec![i as f32; 16], vec![-(i as f32); 16]],
                label:    i % 3,
                size:     16,
            })
            .collect();
        let dl = loader(samples, 4, 2, 16);

        let a = evaluate(&model, dl.as_ref(), 3, &ProgressBar::hidden()).unwrap();
        let b = evaluate(&model, dl.as_ref(), 3, &ProgressBar::hidden()).unwrap();
        assert_eq!(a.loss, b.loss);
        assert_eq!(a.accuracy, b.accuracy);
        assert_eq!(a.confusion, b.confusion);
        assert_eq!(a.skipped, 1);
    }
}
