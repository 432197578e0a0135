// ============================================================
// Layer 4 - Trace Batcher
// ============================================================
// Implements Burn's Batcher trait to stack ProcessedSamples
// into device tensors.
//
// How batching works here:
//   Input:  Vec of N samples, each [C][len_i] with varying len_i
//   Output: TraceBatch with inputs [N, C, L], targets [N], sizes [N]
//
//   Every channel is cut or zero-padded to L = input_size, then
//   all values are flattened row-major and reshaped:
//   [s1_c1_t1, ..., s1_c1_tL, s1_c2_t1, ..., sN_cC_tL] → [N, C, L]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::data::processor::ProcessedSample;

// ─── TraceBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TraceBatch<B: Backend> {
    /// Feature signals - shape: [batch_size, channels, input_size]
    pub inputs: Tensor<B, 3>,

    /// Class index per sample - shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,

    /// Raw packet count per sample - shape: [batch_size]
    pub sizes: Tensor<B, 1, Int>,
}

// ─── TraceBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct TraceBatcher<B: Backend> {
    /// Tensors are created directly on this device
    pub device: B::Device,

    /// Feature channels per sample; a sample missing one gets zeros
    pub channels: usize,

    /// Fixed sequence length L every channel is fitted to
    pub input_size: usize,
}

impl<B: Backend> TraceBatcher<B> {
    pub fn new(device: B::Device, channels: usize, input_size: usize) -> Self {
        Self { device, channels, input_size }
    }
}

impl<B: Backend> Batcher<ProcessedSample, TraceBatch<B>> for TraceBatcher<B> {
    fn batch(&self, items: Vec<ProcessedSample>) -> TraceBatch<B> {
        let batch_size = items.len();
        let len        = self.input_size;

        let mut flat = Vec::with_capacity(batch_size * self.channels * len);
        for sample in &items {
            for ch in 0..self.channels {
                let signal = sample.features.get(ch).map(Vec::as_slice).unwrap_or(&[]);
                let keep   = signal.len().min(len);
                flat.extend_from_slice(&signal[..keep]);
                flat.extend(std::iter::repeat(0.0f32).take(len - keep));
            }
        }

        let targets: Vec<i64> = items.iter().map(|s| s.label as i64).collect();
        let sizes:   Vec<i64> = items.iter().map(|s| s.size as i64).collect();

        let inputs = Tensor::<B, 3>::from_data(
            TensorData::new(flat, [batch_size, self.channels, len]).convert::<B::FloatElem>(),
            &self.device,
        );
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(targets, [batch_size]).convert::<B::IntElem>(),
            &self.device,
        );
        let sizes = Tensor::<B, 1, Int>::from_data(
            TensorData::new(sizes, [batch_size]).convert::<B::IntElem>(),
            &self.device,
        );

        TraceBatch { inputs, targets, sizes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_pads_and_truncates_channels() {
        let device  = Default::default();
        let batcher = TraceBatcher::<NdArray>::new(device, 2, 4);
        let items = vec![
            ProcessedSample {
                features: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
                label:    1,
                size:     2,
            },
            ProcessedSample {
                features: vec![vec![5.0; 6], vec![6.0; 6]],
                label:    0,
                size:     6,
            },
        ];

        let batch = batcher.batch(items);
        assert_eq!(batch.inputs.dims(), [2, 2, 4]);

        let values = batch.inputs.into_data().to_vec::<f32>().unwrap();
        assert_eq!(&values[..8], &[1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 0.0, 0.0]);
        assert_eq!(&values[8..], &[5.0, 5.0, 5.0, 5.0, 6.0, 6.0, 6.0, 6.0]);

        let targets = batch.targets.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![1, 0]);
        let sizes = batch.sizes.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(sizes, vec![2, 6]);
    }
}
