//! Hints: non-deterministic witness extensions.
//!
//! A hint computes wire values the solver cannot derive from constraint
//! algebra alone, such as field inversion for a zero test. The circuit is
//! expected to constrain the hint outputs; the solver only runs the
//! computation and stores the results.

use std::{collections::HashMap, sync::Arc};

use num_bigint::BigUint;

use crate::{
	curve::CurveId,
	term::{LinearExpression, Term},
};

/// Identifies a hint function across processes and serialized systems.
pub type HintId = u32;

/// Derives the stable ID a hint function is registered under (FNV-1a over
/// the registration name).
pub const fn hint_id(name: &str) -> HintId {
	let bytes = name.as_bytes();
	let mut hash: u32 = 0x811c9dc5;
	let mut i = 0;
	while i < bytes.len() {
		hash ^= bytes[i] as u32;
		hash = hash.wrapping_mul(0x0100_0193);
		i += 1;
	}
	hash
}

pub const IS_ZERO_NAME: &str = "is_zero";
pub const IS_ZERO_ID: HintId = hint_id(IS_ZERO_NAME);
pub const CHECK_ZERO_NAME: &str = "check_zero";
pub const CHECK_ZERO_ID: HintId = hint_id(CHECK_ZERO_NAME);

/// Error returned by a hint function.
#[derive(Debug, thiserror::Error)]
#[error("hint: {0}")]
pub struct HintError(pub String);

/// A hint implementation.
///
/// Receives the curve ID (and with it the scalar field modulus `q`) and one
/// big integer per declared input, each already reduced modulo `q`. Must
/// populate every entry of `outputs`.
pub type HintFunction =
	Arc<dyn Fn(CurveId, &[BigUint], &mut [BigUint]) -> Result<(), HintError> + Send + Sync>;

/// One input of a hint descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HintInput {
	/// Evaluated as the field sum of its terms.
	LinearExpression(LinearExpression),
	/// A single `coefficient · wire` product.
	Term(Term),
	/// An arbitrary-precision constant, reduced modulo `q` before the call.
	Constant(BigUint),
}

/// Compile-time description of a hint call site: the function to run, the
/// wires receiving its outputs, and the input sources.
///
/// A single descriptor is referenced by every one of its output wires. The
/// sharing is observable (solving any output solves them all) and survives
/// serialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hint {
	pub id: HintId,
	pub wires: Vec<usize>,
	pub inputs: Vec<HintInput>,
}

/// Shared reference to a hint descriptor, as stored in the hint map.
pub type SharedHint = Arc<Hint>;

/// Registry of hint functions consulted by the solver.
#[derive(Clone)]
pub struct HintRegistry {
	functions: HashMap<HintId, HintFunction>,
}

impl HintRegistry {
	/// A registry with no functions registered, not even the builtins.
	pub fn empty() -> Self {
		Self {
			functions: HashMap::new(),
		}
	}

	/// A registry with the builtin hints pre-registered.
	pub fn builtin() -> Self {
		let mut registry = Self::empty();
		registry.register(IS_ZERO_NAME, is_zero);
		registry.register(CHECK_ZERO_NAME, check_zero);
		registry
	}

	/// Registers `f` under the ID derived from `name`, returning that ID.
	/// Re-registering a name replaces the previous function.
	pub fn register<F>(&mut self, name: &str, f: F) -> HintId
	where
		F: Fn(CurveId, &[BigUint], &mut [BigUint]) -> Result<(), HintError>
			+ Send
			+ Sync
			+ 'static,
	{
		let id = hint_id(name);
		self.functions.insert(id, Arc::new(f));
		id
	}

	pub fn get(&self, id: HintId) -> Option<&HintFunction> {
		self.functions.get(&id)
	}

	pub fn contains(&self, id: HintId) -> bool {
		self.functions.contains_key(&id)
	}

	pub fn len(&self) -> usize {
		self.functions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.functions.is_empty()
	}
}

impl Default for HintRegistry {
	fn default() -> Self {
		Self::builtin()
	}
}

/// Builtin: `outputs[0] = 1 − inputs[0]^(q−1) mod q`, i.e. 1 when the input
/// is zero and 0 otherwise.
pub fn is_zero(
	curve: CurveId,
	inputs: &[BigUint],
	outputs: &mut [BigUint],
) -> Result<(), HintError> {
	let q = curve.scalar_modulus();
	let q_minus_one = &q - 1u32;
	let pow = inputs[0].modpow(&q_minus_one, &q);
	outputs[0] = (BigUint::from(1u32) + &q - pow) % &q;
	Ok(())
}

/// Builtin: `outputs[0] = 0` when the input is zero, 1 otherwise. Registered
/// for circuit use; no core solver path calls it.
pub fn check_zero(
	_curve: CurveId,
	inputs: &[BigUint],
	outputs: &mut [BigUint],
) -> Result<(), HintError> {
	outputs[0] = if inputs[0] == BigUint::ZERO {
		BigUint::ZERO
	} else {
		BigUint::from(1u32)
	};
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_is_zero_of_zero() {
		let inputs = [BigUint::ZERO];
		let mut outputs = [BigUint::ZERO];
		is_zero(CurveId::Bn254, &inputs, &mut outputs).unwrap();
		assert_eq!(outputs[0], BigUint::from(1u32));
	}

	#[test]
	fn test_is_zero_of_nonzero() {
		let inputs = [BigUint::from(7u32)];
		let mut outputs = [BigUint::ZERO];
		is_zero(CurveId::Bn254, &inputs, &mut outputs).unwrap();
		assert_eq!(outputs[0], BigUint::ZERO);
	}

	#[test]
	fn test_check_zero() {
		let mut outputs = [BigUint::ZERO];
		check_zero(CurveId::Bn254, &[BigUint::ZERO], &mut outputs).unwrap();
		assert_eq!(outputs[0], BigUint::ZERO);
		check_zero(CurveId::Bn254, &[BigUint::from(42u32)], &mut outputs).unwrap();
		assert_eq!(outputs[0], BigUint::from(1u32));
	}

	#[test]
	fn test_hint_ids_are_stable_and_distinct() {
		assert_eq!(IS_ZERO_ID, hint_id("is_zero"));
		assert_ne!(IS_ZERO_ID, CHECK_ZERO_ID);
	}

	#[test]
	fn test_builtin_registry() {
		let registry = HintRegistry::builtin();
		assert!(registry.contains(IS_ZERO_ID));
		assert!(registry.contains(CHECK_ZERO_ID));
		assert_eq!(registry.len(), 2);
		assert!(HintRegistry::empty().is_empty());
	}
}
