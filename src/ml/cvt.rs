// ============================================================
// Layer 5 - Convolutional Transformer Classifier
// ============================================================
// Patches are produced by a strided convolution instead of a
// fixed split, so no positional embedding is added: the conv
// stem already encodes local order.
//
//   [N, C, L] ─conv(k=patch_size, s=patch_stride)→ [N, E, P]
//             ─transpose→ [N, P, E] ─LN→ CvtBlock × depth ─LN→
//             ─mean over P→ [N, E] ─linear→ [N, classes]
//
// With L = input_size the token count is
//   P = (L - patch_size) / patch_stride + 1
// so the default 5000-sample trace becomes 624 tokens of width
// embed_dim.
//
// Each CvtBlock normalises before attending (pre-norm): the
// residual path carries the conv embedding through unchanged,
// and the final LayerNorm brings the sum back to unit scale.

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        conv::{Conv1d, Conv1dConfig},
        Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::gelu,
};

use crate::ml::model::Classifier;

#[derive(Config, Debug)]
pub struct ConvTransformerConfig {
    pub num_classes:    usize,
    pub input_channels: usize,
    /// Token width E, shared by attention and the block MLP
    #[config(default = 64)]
    pub embed_dim: usize,
    /// Number of CvtBlocks
    #[config(default = 2)]
    pub depth: usize,
    /// Must divide embed_dim
    #[config(default = 4)]
    pub num_heads: usize,
    /// Packets covered by one token
    #[config(default = 16)]
    pub patch_size: usize,
    /// Step between token windows; < patch_size means overlap
    #[config(default = 8)]
    pub patch_stride: usize,
    /// Hidden width of the block MLP is embed_dim * mlp_ratio
    #[config(default = 4)]
    pub mlp_ratio: usize,
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl ConvTransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvTransformer<B> {
        let patch_embed = Conv1dConfig::new(self.input_channels, self.embed_dim, self.patch_size)
            .with_stride(self.patch_stride)
            .init(device);
        ConvTransformer {
            patch_embed,
            embed_norm: LayerNormConfig::new(self.embed_dim).init(device),
            blocks:     (0..self.depth).map(|_| self.block(device)).collect(),
            final_norm: LayerNormConfig::new(self.embed_dim).init(device),
            head:       LinearConfig::new(self.embed_dim, self.num_classes).init(device),
        }
    }

    fn block<B: Backend>(&self, device: &B::Device) -> CvtBlock<B> {
        let width  = self.embed_dim;
        let hidden = width * self.mlp_ratio;
        CvtBlock {
            attn_norm: LayerNormConfig::new(width).init(device),
            attn: MultiHeadAttentionConfig::new(width, self.num_heads)
                .with_dropout(self.dropout)
                .init(device),
            mlp_norm:    LayerNormConfig::new(width).init(device),
            mlp_expand:  LinearConfig::new(width, hidden).init(device),
            mlp_project: LinearConfig::new(hidden, width).init(device),
            drop:        DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// One pre-norm transformer layer over the token sequence.
#[derive(Module, Debug)]
pub struct CvtBlock<B: Backend> {
    pub attn_norm:   LayerNorm<B>,
    pub attn:        MultiHeadAttention<B>,
    pub mlp_norm:    LayerNorm<B>,
    /// E → E * mlp_ratio
    pub mlp_expand:  Linear<B>,
    /// E * mlp_ratio → E
    pub mlp_project: Linear<B>,
    pub drop:        Dropout,
}

impl<B: Backend> CvtBlock<B> {
    /// tokens: [N, P, E] → [N, P, E]
    pub fn forward(&self, tokens: Tensor<B, 3>) -> Tensor<B, 3> {
        // Every token attends to every other token of the trace
        let mixed = self
            .attn
            .forward(MhaInput::self_attn(self.attn_norm.forward(tokens.clone())))
            .context;
        let tokens = tokens + self.drop.forward(mixed);

        // Position-wise MLP, applied to each token independently
        let hidden = gelu(self.mlp_expand.forward(self.mlp_norm.forward(tokens.clone())));
        tokens + self.drop.forward(self.mlp_project.forward(hidden))
    }
}

#[derive(Module, Debug)]
pub struct ConvTransformer<B: Backend> {
    pub patch_embed: Conv1d<B>,
    pub embed_norm:  LayerNorm<B>,
    pub blocks:      Vec<CvtBlock<B>>,
    pub final_norm:  LayerNorm<B>,
    pub head:        Linear<B>,
}

impl<B: Backend> ConvTransformer<B> {
    /// inputs: [batch, channels, length] → logits: [batch, classes]
    pub fn forward(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        // Conv1d emits [N, E, P]; attention wants tokens on dim 1
        let tokens = self.patch_embed.forward(inputs).swap_dims(1, 2);
        let mut tokens = self.embed_norm.forward(tokens);
        for block in &self.blocks {
            tokens = block.forward(tokens);
        }
        // Average over tokens: [N, P, E] → [N, 1, E] → [N, E]
        let pooled = self.final_norm.forward(tokens).mean_dim(1).flatten::<2>(1, 2);
        self.head.forward(pooled)
    }
}

impl<B: Backend> Classifier<B> for ConvTransformer<B> {
    fn logits(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        self.forward(inputs)
    }
}
