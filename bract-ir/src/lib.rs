//! Internal representation for the bract netlist tools.
//!
//! A design is a list of modules; a module is a netlist of primitive
//! cells (multiplexers, logical gates, arithmetic operators, memory
//! ports) interconnected by multi-bit signals. Wires and cells live in
//! per-module arenas and are referred to by copyable typed indices, so
//! transformation passes can hold port lists across netlist mutations
//! without dangling references.

// Modules defining internal structures.
mod cell;
mod idx;
mod module;
mod sigmap;
mod signal;

/// JSON netlist reader and writer.
pub mod json;

// Re-export types at the crate level.
pub use bract_utils::Id;
pub use cell::{Cell, CellType, Param};
pub use idx::{CellId, IndexRef, IndexedMap, WireId};
pub use module::{Design, Module, Wire};
pub use sigmap::SigMap;
pub use signal::{SigBit, SigSpec, State};
