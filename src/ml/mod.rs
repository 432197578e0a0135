// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// All network definitions and the test loop live here.
//
//   df_net.rs    - Convolutional fingerprinting network:
//                  stacked conv/batch-norm stages, max pooling,
//                  global average pool and an MLP head
//
//   cvt.rs       - Convolutional transformer variant:
//                  strided conv patch embedding followed by
//                  pre-norm self-attention encoder blocks
//
//   model.rs     - Hyperparameter record stored with the
//                  checkpoint, variant selection and the
//                  `Classifier` seam the test loop calls
//
//   evaluator.rs - One pass over the test loader: loss,
//                  predictions, confusion table
//
// Reference: Burn Book §3 (Building Blocks)
//            Vaswani et al. (2017) Attention Is All You Need

/// Hyperparameters and model variant selection
pub mod model;

/// Convolutional classifier
pub mod df_net;

/// Convolutional transformer classifier
pub mod cvt;

/// Test loop with loss and confusion table
pub mod evaluator;
