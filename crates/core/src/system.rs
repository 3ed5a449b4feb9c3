//! The compiled constraint system.

use std::{collections::BTreeMap, fmt::Write};

use ark_ff::PrimeField;
use num_bigint::BigUint;

use crate::{
	consts::{COEFF_ID_MINUS_ONE, COEFF_ID_ONE, COEFF_ID_TWO, COEFF_ID_ZERO},
	curve::CurveId,
	hint::{HintId, SharedHint},
	log::{Counter, LogEntry, Schema},
	term::{LinearExpression, R1C, Term, Visibility},
};

/// A compiled rank-1 constraint system.
///
/// Produced by the circuit front-end, frozen thereafter, and read
/// concurrently by all solver workers.
///
/// Wire IDs form one contiguous index space: the one-wire at 0 (permanently
/// valued 1), then the remaining public wires, the secret wires, and the
/// internal wires the solver instantiates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct R1cs<F: PrimeField> {
	pub schema: Schema,
	pub nb_internal_variables: usize,
	/// Number of public wires, the one-wire included.
	pub nb_public_variables: usize,
	pub nb_secret_variables: usize,
	/// Names of the public variables, the one-wire first.
	pub public: Vec<String>,
	pub secret: Vec<String>,
	/// Deferred log statements, resolved and emitted after solving.
	pub logs: Vec<LogEntry>,
	/// Debug metadata referenced by `m_debug`.
	pub debug_info: Vec<LogEntry>,
	/// Maps a constraint index to its entry in `debug_info`.
	pub m_debug: BTreeMap<usize, usize>,
	pub counters: Vec<Counter>,
	/// Maps an internal wire ID to the hint descriptor producing it. Several
	/// wires may share one descriptor.
	pub m_hints: BTreeMap<usize, SharedHint>,
	/// The hints the solver needs, by ID, with their registration names.
	pub m_hints_dependencies: BTreeMap<HintId, String>,
	/// Topological constraint layering: constraints within a level only
	/// depend on wires produced by earlier levels or on inputs.
	pub levels: Vec<Vec<usize>>,
	pub curve_id: CurveId,
	pub constraints: Vec<R1C>,
	/// Coefficient pool indexed by term coefficient IDs. The reserved IDs
	/// below [`crate::consts::FIRST_USER_COEFF_ID`] are never read from it.
	pub coefficients: Vec<F>,
}

impl<F: PrimeField> R1cs<F> {
	/// An empty system over the given curve.
	pub fn new(curve_id: CurveId) -> Self {
		Self {
			schema: Schema::default(),
			nb_internal_variables: 0,
			nb_public_variables: 0,
			nb_secret_variables: 0,
			public: Vec::new(),
			secret: Vec::new(),
			logs: Vec::new(),
			debug_info: Vec::new(),
			m_debug: BTreeMap::new(),
			counters: Vec::new(),
			m_hints: BTreeMap::new(),
			m_hints_dependencies: BTreeMap::new(),
			levels: Vec::new(),
			curve_id,
			constraints: Vec::new(),
			coefficients: Vec::new(),
		}
	}

	/// Replaces the coefficient pool with field elements converted from the
	/// front-end's arbitrary-precision table.
	pub fn set_coefficients(&mut self, coefficients: &[BigUint]) {
		self.coefficients = coefficients
			.iter()
			.map(|coefficient| F::from(coefficient.clone()))
			.collect();
	}

	/// Total number of wires.
	pub fn nb_wires(&self) -> usize {
		self.nb_public_variables + self.nb_secret_variables + self.nb_internal_variables
	}

	/// Number of entries in the coefficient pool.
	pub fn nb_coefficients(&self) -> usize {
		self.coefficients.len()
	}

	pub fn curve_id(&self) -> CurveId {
		self.curve_id
	}

	/// Size in bytes of one serialized field element.
	pub fn field_size(&self) -> usize {
		(F::MODULUS_BIT_SIZE as usize).div_ceil(8)
	}

	/// Renders every constraint as `[L, R, O]` strings such that
	/// `L ⋅ R = O`.
	pub fn constraints_to_string(&self) -> Vec<[String; 3]> {
		self.constraints
			.iter()
			.map(|constraint| {
				[
					self.expression_to_string(&constraint.l),
					self.expression_to_string(&constraint.r),
					self.expression_to_string(&constraint.o),
				]
			})
			.collect()
	}

	fn expression_to_string(&self, expression: &LinearExpression) -> String {
		let mut out = String::new();
		for (i, term) in expression.iter().enumerate() {
			self.term_to_string(*term, &mut out);
			if i + 1 < expression.len() {
				out.push_str(" + ");
			}
		}
		out
	}

	fn term_to_string(&self, term: Term, out: &mut String) {
		let (coeff_id, wire_id, visibility) = term.unpack();
		match coeff_id {
			COEFF_ID_ONE => {}
			COEFF_ID_MINUS_ONE => out.push('-'),
			COEFF_ID_ZERO => {
				out.push('0');
				return;
			}
			COEFF_ID_TWO => out.push_str("2⋅"),
			_ => {
				let _ = write!(out, "{}⋅", self.coefficients[coeff_id as usize]);
			}
		}

		match visibility {
			Visibility::Internal => {
				let offset = wire_id - self.nb_public_variables - self.nb_secret_variables;
				if self.m_hints.contains_key(&wire_id) {
					let _ = write!(out, "hv{offset}");
				} else {
					let _ = write!(out, "v{offset}");
				}
			}
			Visibility::Public => {
				if wire_id == 0 {
					out.push('1');
				} else {
					let _ = write!(out, "p{}", wire_id - 1);
				}
			}
			Visibility::Secret => {
				let _ = write!(out, "s{}", wire_id - self.nb_public_variables);
			}
			Visibility::Virtual => out.push_str("<?>"),
		}
	}
}

#[cfg(test)]
mod tests {
	use ark_bn254::Fr;
	use ark_ff::{One, Zero};

	use super::*;
	use crate::consts::FIRST_USER_COEFF_ID;

	#[test]
	fn test_set_coefficients_reduces_modulo_q() {
		let mut cs = R1cs::<Fr>::new(CurveId::Bn254);
		let q = CurveId::Bn254.scalar_modulus();
		cs.set_coefficients(&[
			BigUint::ZERO,
			BigUint::from(1u32),
			BigUint::from(2u32),
			&q - 1u32,
			&q + 7u32,
		]);
		assert_eq!(cs.nb_coefficients(), 5);
		assert_eq!(cs.coefficients[3], -Fr::one());
		assert_eq!(cs.coefficients[4], Fr::from(7u64));
	}

	#[test]
	fn test_constraints_to_string() {
		let mut cs = R1cs::<Fr>::new(CurveId::Bn254);
		cs.nb_public_variables = 2;
		cs.nb_secret_variables = 1;
		cs.nb_internal_variables = 1;
		cs.coefficients = vec![
			Fr::zero(),
			Fr::zero(),
			Fr::zero(),
			Fr::zero(),
			Fr::from(5u64),
		];
		cs.constraints = vec![R1C {
			l: vec![
				Term::new(COEFF_ID_ONE, 1, Visibility::Public),
				Term::new(FIRST_USER_COEFF_ID, 2, Visibility::Secret),
			],
			r: vec![Term::new(COEFF_ID_MINUS_ONE, 0, Visibility::Public)],
			o: vec![Term::new(COEFF_ID_TWO, 3, Visibility::Internal)],
		}];

		let rendered = cs.constraints_to_string();
		assert_eq!(rendered.len(), 1);
		assert_eq!(rendered[0][0], "p0 + 5⋅s0");
		assert_eq!(rendered[0][1], "-1");
		assert_eq!(rendered[0][2], "2⋅v0");
	}

	#[test]
	fn test_field_size() {
		let cs = R1cs::<Fr>::new(CurveId::Bn254);
		assert_eq!(cs.field_size(), 32);
	}
}
