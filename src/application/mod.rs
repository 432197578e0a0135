// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// Coordinates the other layers to run one evaluation pass of
// a trained fingerprinting model over a dataset's test split.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - No direct file formats here (that's Layer 4 and 6)
//
// The console lines of an evaluation run are its product, so
// they are printed from here in the order the steps run.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The checkpoint evaluation workflow
pub mod eval_use_case;
