// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Takes a dataset's held-out split from disk to tensor
// batches ready for the test loop:
//
//   test.jsonl
//       │
//       ▼
//   JsonlTraceSource  → parses one LabeledTrace per line
//       │
//       ▼
//   assign_labels     → subpage/site labels, class count
//       │
//       ▼
//   DataProcessor     → per-packet feature channels
//       │
//       ▼
//   ScratchStore      → optional on-disk copy (--use_tmp)
//       │
//       ▼
//   TraceDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   TraceBatcher      → pads/truncates into [B, C, L] tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the test loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Locates the test split and builds the DataLoader
pub mod loader;

/// Turns raw packet traces into feature channels
pub mod processor;

/// One-file-per-sample scratch copy of processed data
pub mod scratch;

/// Implements Burn's Dataset trait for processed samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
