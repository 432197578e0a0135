// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the system
// works with: labelled traffic traces and the per-class
// confusion table built while scoring a classifier.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Packet sequences and their labels
pub mod trace;

// TP/TN/FP/FN accumulator and derived precision/recall/F1
pub mod confusion;

// Core abstractions (traits) that other layers implement
pub mod traits;
