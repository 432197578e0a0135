// ============================================================
// Layer 5 - DF Convolutional Classifier
// ============================================================
// A 1-D convolutional network in the style of Deep
// Fingerprinting:
//
//   [N, C, L]
//     └─ stage × stage_count
//          conv → BN → ReLU → conv → BN → ReLU → max-pool → dropout
//     └─ global average pool            [N, F]
//     └─ linear → ReLU → dropout → linear   [N, classes]
//
// Stage i has `filters * filter_grow_factor^i` channels.

use burn::{
    nn::{
        conv::{Conv1d, Conv1dConfig},
        pool::{AdaptiveAvgPool1d, AdaptiveAvgPool1dConfig, MaxPool1d, MaxPool1dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig1d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::model::Classifier;

#[derive(Config, Debug)]
pub struct DfNetConfig {
    pub num_classes:    usize,
    pub input_channels: usize,
    #[config(default = 32)]
    pub filters: usize,
    #[config(default = 2)]
    pub filter_grow_factor: usize,
    #[config(default = 4)]
    pub stage_count: usize,
    #[config(default = 7)]
    pub kernel_size: usize,
    #[config(default = 8)]
    pub pool_size: usize,
    #[config(default = 4)]
    pub pool_stride: usize,
    #[config(default = 0.1)]
    pub conv_dropout: f64,
    #[config(default = 512)]
    pub mlp_hidden_dim: usize,
    #[config(default = 0.5)]
    pub mlp_dropout: f64,
}

impl DfNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DfNet<B> {
        let mut in_ch  = self.input_channels;
        let mut stages = Vec::with_capacity(self.stage_count);
        for i in 0..self.stage_count {
            let out_ch = self.stage_width(i);
            stages.push(self.build_stage(in_ch, out_ch, device));
            in_ch = out_ch;
        }

        DfNet {
            stages,
            global_pool: AdaptiveAvgPool1dConfig::new(1).init(),
            fc:          LinearConfig::new(in_ch, self.mlp_hidden_dim).init(device),
            fc_dropout:  DropoutConfig::new(self.mlp_dropout).init(),
            head:        LinearConfig::new(self.mlp_hidden_dim, self.num_classes).init(device),
        }
    }

    fn stage_width(&self, stage: usize) -> usize {
        self.filters * self.filter_grow_factor.pow(stage as u32)
    }

    fn build_stage<B: Backend>(&self, in_ch: usize, out_ch: usize, device: &B::Device) -> DfStage<B> {
        let pad = PaddingConfig1d::Explicit(self.kernel_size / 2);
        DfStage {
            conv1: Conv1dConfig::new(in_ch, out_ch, self.kernel_size)
                .with_padding(pad.clone())
                .init(device),
            bn1: BatchNormConfig::new(out_ch).init(device),
            conv2: Conv1dConfig::new(out_ch, out_ch, self.kernel_size)
                .with_padding(pad)
                .init(device),
            bn2: BatchNormConfig::new(out_ch).init(device),
            pool: MaxPool1dConfig::new(self.pool_size)
                .with_stride(self.pool_stride)
                .init(),
            dropout: DropoutConfig::new(self.conv_dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct DfStage<B: Backend> {
    pub conv1:   Conv1d<B>,
    pub bn1:     BatchNorm<B, 1>,
    pub conv2:   Conv1d<B>,
    pub bn2:     BatchNorm<B, 1>,
    pub pool:    MaxPool1d,
    pub dropout: Dropout,
}

impl<B: Backend> DfStage<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = relu(self.bn1.forward(self.conv1.forward(x)));
        let x = relu(self.bn2.forward(self.conv2.forward(x)));
        self.dropout.forward(self.pool.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct DfNet<B: Backend> {
    pub stages:      Vec<DfStage<B>>,
    pub global_pool: AdaptiveAvgPool1d,
    pub fc:          Linear<B>,
    pub fc_dropout:  Dropout,
    pub head:        Linear<B>,
}

impl<B: Backend> DfNet<B> {
    /// inputs: [batch, channels, length] → logits: [batch, classes]
    pub fn forward(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        let mut x = inputs;
        for stage in &self.stages {
            x = stage.forward(x);
        }
        let x = self.global_pool.forward(x).flatten::<2>(1, 2);
        let x = self.fc_dropout.forward(relu(self.fc.forward(x)));
        self.head.forward(x)
    }
}

impl<B: Backend> Classifier<B> for DfNet<B> {
    fn logits(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        self.forward(inputs)
    }
}
