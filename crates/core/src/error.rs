use std::fmt;

use crate::hint::{HintError, HintId};

/// Errors surfaced by the solver and the solution state.
///
/// Compile-invariant violations (two unknown wires in one constraint, a
/// double wire assignment, an unsolved non-hint wire inside a hint input, an
/// incomplete final assignment) indicate a corrupted or mis-compiled system
/// and abort the process instead of appearing here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(
		"invalid witness size, got {got}, expected {expected} = {public} (public) + {secret} (secret)"
	)]
	InvalidWitnessSize {
		got: usize,
		expected: usize,
		public: usize,
		secret: usize,
	},
	#[error("invalid input size: len(a, b, c) == len(constraints)")]
	InvalidBuffer,
	#[error("solver missing hint(s): {0:?}")]
	MissingHintFunction(Vec<String>),
	#[error("missing hint function for id {0}")]
	MissingHint(HintId),
	#[error(transparent)]
	Hint(#[from] HintError),
	#[error(transparent)]
	Unsatisfied(#[from] UnsatisfiedConstraint),
}

/// A constraint whose multiplicative check `a · b = c` failed, with the
/// evaluated expression values and, when the front-end recorded one, a
/// formatted debug string for the constraint.
#[derive(Debug)]
pub struct UnsatisfiedConstraint {
	/// Constraint index in the compiled system.
	pub cid: usize,
	pub a: String,
	pub b: String,
	pub c: String,
	pub debug_info: Option<String>,
}

impl fmt::Display for UnsatisfiedConstraint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.debug_info {
			Some(info) => write!(f, "constraint #{} is not satisfied: {}", self.cid, info),
			None => write!(
				f,
				"constraint #{} is not satisfied: {} ⋅ {} != {}",
				self.cid, self.a, self.b, self.c
			),
		}
	}
}

impl std::error::Error for UnsatisfiedConstraint {}
