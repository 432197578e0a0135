// ============================================================
// Layer 3 - Core Traits
// ============================================================
// The application layer loads traces through `TraceSource`
// without knowing the on-disk format.
//
// Implementations:
//   - JsonlTraceSource -> one JSON object per line (data::loader)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::trace::LabeledTrace;

// ─── TraceSource ──────────────────────────────────────────────────────────────
/// Any component that can produce the labelled traces of one split.
pub trait TraceSource {
    /// Load every trace in the split, in file order.
    fn load_all(&self) -> Result<Vec<LabeledTrace>>;
}
