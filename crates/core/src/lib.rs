//! Constraint-solving core of a zk-SNARK toolchain.
//!
//! Given a compiled rank-1 constraint system and a witness assignment for
//! the public and secret inputs, this crate solves for every internal wire
//! value in the scalar field, verifies that every constraint `L · R = O`
//! holds, and (de)serializes compiled systems deterministically so circuits
//! and proving keys can be cached on disk.

pub mod codec;
pub mod consts;
pub mod curve;
pub mod error;
pub mod hint;
pub mod log;
pub mod solution;
pub mod solver;
pub mod system;
pub mod term;

pub use curve::CurveId;
pub use error::{Error, UnsatisfiedConstraint};
pub use hint::{Hint, HintError, HintId, HintInput, HintRegistry, SharedHint};
pub use log::{Counter, LogEntry, Schema, SchemaLeaf};
pub use solution::Solution;
pub use solver::ProverConfig;
pub use system::R1cs;
pub use term::{LinearExpression, R1C, Term, Visibility};
