// ============================================================
// Layer 5 - Model Configuration and Variant Selection
// ============================================================
// `ModelConfig` is the hyperparameter record stored next to the
// checkpoint weights. It names the input features and the
// architecture sizes of both model variants; the variant itself
// is picked on the command line.

use anyhow::Result;
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::processor::Feature;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    cvt::{ConvTransformer, ConvTransformerConfig},
    df_net::{DfNet, DfNetConfig},
};

/// Anything that maps a feature batch to per-class logits.
pub trait Classifier<B: Backend> {
    /// inputs: [batch, channels, length] → [batch, classes]
    fn logits(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2>;
}

/// Hyperparameters saved next to the weights as
/// `model_config.json`. Missing fields take the defaults below,
/// unknown ones are ignored, so older configs keep loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Input channels in order; must match what the model saw in training
    pub feature_list: Vec<Feature>,

    /// Every channel is padded or cut to this many packets
    pub input_size: usize,

    // ── DF network ──
    /// Channels of the first conv stage
    pub filters: usize,
    /// Channel multiplier from one stage to the next
    pub filter_grow_factor: usize,
    pub stage_count:        usize,
    pub kernel_size:        usize,
    pub pool_size:          usize,
    pub pool_stride:        usize,
    pub conv_dropout:       f64,
    pub mlp_hidden_dim:     usize,
    pub mlp_dropout:        f64,

    // ── Convolutional transformer ──
    pub cvt: CvtSettings,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            feature_list:       Vec::new(),
            input_size:         5000,
            filters:            32,
            filter_grow_factor: 2,
            stage_count:        4,
            kernel_size:        7,
            pool_size:          8,
            pool_stride:        4,
            conv_dropout:       0.1,
            mlp_hidden_dim:     512,
            mlp_dropout:        0.5,
            cvt:                CvtSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CvtSettings {
    pub embed_dim:    usize,
    pub depth:        usize,
    pub num_heads:    usize,
    pub patch_size:   usize,
    pub patch_stride: usize,
    pub mlp_ratio:    usize,
    pub dropout:      f64,
}

impl Default for CvtSettings {
    fn default() -> Self {
        Self {
            embed_dim:    64,
            depth:        2,
            num_heads:    4,
            patch_size:   16,
            patch_stride: 8,
            mlp_ratio:    4,
            dropout:      0.0,
        }
    }
}

impl ModelConfig {
    pub fn df_config(&self, num_classes: usize, input_channels: usize) -> DfNetConfig {
        DfNetConfig::new(num_classes, input_channels)
            .with_filters(self.filters)
            .with_filter_grow_factor(self.filter_grow_factor)
            .with_stage_count(self.stage_count)
            .with_kernel_size(self.kernel_size)
            .with_pool_size(self.pool_size)
            .with_pool_stride(self.pool_stride)
            .with_conv_dropout(self.conv_dropout)
            .with_mlp_hidden_dim(self.mlp_hidden_dim)
            .with_mlp_dropout(self.mlp_dropout)
    }

    pub fn cvt_config(&self, num_classes: usize, input_channels: usize) -> ConvTransformerConfig {
        let c = &self.cvt;
        ConvTransformerConfig::new(num_classes, input_channels)
            .with_embed_dim(c.embed_dim)
            .with_depth(c.depth)
            .with_num_heads(c.num_heads)
            .with_patch_size(c.patch_size)
            .with_patch_stride(c.patch_stride)
            .with_mlp_ratio(c.mlp_ratio)
            .with_dropout(c.dropout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelKind {
    Df,
    Cvt,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Df  => f.write_str("DF"),
            ModelKind::Cvt => f.write_str("CvT"),
        }
    }
}

pub enum WfModel<B: Backend> {
    Df(DfNet<B>),
    Cvt(ConvTransformer<B>),
}

impl<B: Backend> WfModel<B> {
    /// Build the selected variant with freshly initialised weights.
    pub fn init(
        kind:           ModelKind,
        cfg:            &ModelConfig,
        num_classes:    usize,
        input_channels: usize,
        device:         &B::Device,
    ) -> Self {
        match kind {
            ModelKind::Df  => WfModel::Df(cfg.df_config(num_classes, input_channels).init(device)),
            ModelKind::Cvt => WfModel::Cvt(cfg.cvt_config(num_classes, input_channels).init(device)),
        }
    }

    /// Replace the weights with the ones stored in the checkpoint.
    pub fn load(self, ckpt: &CheckpointManager, device: &B::Device) -> Result<Self> {
        Ok(match self {
            WfModel::Df(m)  => WfModel::Df(ckpt.load_model(m, device)?),
            WfModel::Cvt(m) => WfModel::Cvt(ckpt.load_model(m, device)?),
        })
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            WfModel::Df(_)  => ModelKind::Df,
            WfModel::Cvt(_) => ModelKind::Cvt,
        }
    }
}

impl<B: Backend> Classifier<B> for WfModel<B> {
    fn logits(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        match self {
            WfModel::Df(m)  => m.forward(inputs),
            WfModel::Cvt(m) => m.forward(inputs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_takes_defaults() {
        let json = r#"{"feature_list": ["dirs", "cumul"], "stage_count": 3, "cvt": {"depth": 1}}"#;
        let cfg: ModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.feature_list, vec![Feature::Dirs, Feature::Cumul]);
        assert_eq!(cfg.stage_count, 3);
        assert_eq!(cfg.input_size, 5000);
        assert_eq!(cfg.cvt.depth, 1);
        assert_eq!(cfg.cvt.embed_dim, 64);
    }

    #[test]
    fn test_unknown_feature_rejected() {
        let json = r#"{"feature_list": ["packet_colour"]}"#;
        assert!(serde_json::from_str::<ModelConfig>(json).is_err());
    }

    #[test]
    fn test_config_flows_into_module_configs() {
        let cfg = ModelConfig { filters: 16, ..ModelConfig::default() };
        let df = cfg.df_config(10, 3);
        assert_eq!(df.filters, 16);
        assert_eq!(df.num_classes, 10);
        assert_eq!(df.input_channels, 3);
        let cvt = cfg.cvt_config(10, 3);
        assert_eq!(cvt.patch_stride, 8);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ModelKind::Df.to_string(), "DF");
        assert_eq!(ModelKind::Cvt.to_string(), "CvT");
    }
}
