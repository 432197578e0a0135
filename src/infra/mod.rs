// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Filesystem concerns shared by the use case:
//
//   checkpoint.rs - Validates the --ckpt path, reads the
//                   model config and restores weights with
//                   Burn's CompactRecorder.
//
//   report.rs     - Optional CSV/JSON report of an evaluation
//                   pass under the results directory.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Checkpoint path check, config and weight loading
pub mod checkpoint;

/// Per-class CSV and summary JSON writer
pub mod report;
