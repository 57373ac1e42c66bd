//! Rust library for building symbolic probabilistic models (DTMC, CTMC,
//! MDP) from PRISM-style guarded-command programs, represented entirely
//! with decision diagrams.

/// The symbolic model builder and its configuration.
pub mod builder;
/// Decision diagrams (`Add`, `Bdd`) and their shared manager.
pub mod dd;
/// Scalar expressions over program variables.
pub mod expression;
/// A minimal formula language used to select rewards and labels.
pub mod logic;
/// The symbolic model produced by the builder.
pub mod model;
/// The guarded-command program AST.
pub mod program;
