//! Optimization passes over the bract netlist IR.
//!
//! This library defines the analyses and transformation passes used by the
//! `bract` driver, along with the [pass manager](pass_manager::PassManager)
//! used to construct and run pass pipelines.
pub mod analysis;
pub mod pass_manager;
pub mod passes;
