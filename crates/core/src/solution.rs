//! Mutable state of one solve run: the wire value vector and its
//! single-assignment bookkeeping, shared across solver workers.

use std::{
	cell::UnsafeCell,
	collections::BTreeMap,
	sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use ark_ff::{Field, One, PrimeField, Zero};
use num_bigint::BigUint;

use crate::{
	consts::{COEFF_ID_MINUS_ONE, COEFF_ID_ONE, COEFF_ID_TWO, COEFF_ID_ZERO},
	curve::CurveId,
	error::Error,
	hint::{Hint, HintId, HintInput, HintRegistry, SharedHint},
	log::{format_log, LogEntry},
	term::{Term, Visibility},
};

const UNSOLVED_VARIABLE: &str = "<unsolved>";

#[repr(transparent)]
struct WireCell<F>(UnsafeCell<F>);

// SAFETY: every wire is written at most once, by exactly one worker (the
// level construction guarantees it), and readers only dereference a cell
// after an acquire load of its solved flag observes the release store made
// by the writer.
unsafe impl<F: Send + Sync> Sync for WireCell<F> {}

/// The wire value vector of one solve run.
///
/// Wires are written once each; `solved` flags flip false→true monotonically
/// and `nb_solved` counts the flips so the final completeness check is
/// race-free.
pub struct Solution<'a, F: PrimeField> {
	values: Box<[WireCell<F>]>,
	solved: Box<[AtomicBool]>,
	nb_solved: AtomicU64,
	curve_id: CurveId,
	coefficients: &'a [F],
	m_hints: &'a BTreeMap<usize, SharedHint>,
	hint_functions: &'a HintRegistry,
}

impl<'a, F: PrimeField> Solution<'a, F> {
	/// Creates the zeroed solution state for `nb_wires` wires.
	///
	/// Fails with [`Error::MissingHintFunction`] when a hint the compiled
	/// system depends on has no registered function.
	pub fn new(
		nb_wires: usize,
		curve_id: CurveId,
		hint_functions: &'a HintRegistry,
		hint_dependencies: &BTreeMap<HintId, String>,
		m_hints: &'a BTreeMap<usize, SharedHint>,
		coefficients: &'a [F],
	) -> Result<Self, Error> {
		let missing: Vec<String> = hint_dependencies
			.iter()
			.filter(|(id, _)| !hint_functions.contains(**id))
			.map(|(_, name)| name.clone())
			.collect();
		if !missing.is_empty() {
			return Err(Error::MissingHintFunction(missing));
		}

		Ok(Self {
			values: (0..nb_wires)
				.map(|_| WireCell(UnsafeCell::new(F::zero())))
				.collect(),
			solved: (0..nb_wires).map(|_| AtomicBool::new(false)).collect(),
			nb_solved: AtomicU64::new(0),
			curve_id,
			coefficients,
			m_hints,
			hint_functions,
		})
	}

	pub fn nb_wires(&self) -> usize {
		self.values.len()
	}

	/// Whether wire `id` has been assigned.
	#[inline]
	pub fn is_wire_solved(&self, id: usize) -> bool {
		self.solved[id].load(Ordering::Acquire)
	}

	#[inline]
	fn value(&self, id: usize) -> F {
		// SAFETY: callers read a wire either after `is_wire_solved`
		// (synchronizing with the release store in `set`) or while it still
		// holds its initial zero.
		unsafe { *self.values[id].0.get() }
	}

	/// Assigns wire `id`. Assigning a wire twice is a solver invariant
	/// violation and aborts.
	pub fn set(&self, id: usize, value: F) {
		if self.solved[id].load(Ordering::Relaxed) {
			panic!("solving the same wire twice should never happen");
		}
		// SAFETY: single writer per wire; the release store below publishes
		// the value.
		unsafe {
			*self.values[id].0.get() = value;
		}
		self.solved[id].store(true, Ordering::Release);
		self.nb_solved.fetch_add(1, Ordering::Relaxed);
	}

	/// Seeds the one-wire and the public/secret witness prefix.
	pub(crate) fn assign_witness(&self, witness: &[F]) {
		self.set(0, F::one());
		for (i, value) in witness.iter().enumerate() {
			self.set(i + 1, *value);
		}
	}

	/// True once every wire has been assigned.
	pub fn is_valid(&self) -> bool {
		self.nb_solved.load(Ordering::Relaxed) as usize == self.values.len()
	}

	pub fn nb_solved(&self) -> u64 {
		self.nb_solved.load(Ordering::Relaxed)
	}

	/// Resolves a coefficient ID: reserved IDs have fixed values and never
	/// touch the pool.
	fn coeff_value(&self, coeff_id: u32) -> F {
		match coeff_id {
			COEFF_ID_ZERO => F::zero(),
			COEFF_ID_ONE => F::one(),
			COEFF_ID_TWO => F::one().double(),
			COEFF_ID_MINUS_ONE => -F::one(),
			_ => self.coefficients[coeff_id as usize],
		}
	}

	/// Evaluates `coefficient · value[wire]`.
	///
	/// Panics when the wire is unsolved, unless the coefficient is the zero
	/// sentinel.
	pub fn compute_term(&self, term: Term) -> F {
		let (coeff_id, wire_id, _) = term.unpack();
		if coeff_id != COEFF_ID_ZERO && !self.is_wire_solved(wire_id) {
			panic!("computing a term with an unsolved wire");
		}
		match coeff_id {
			COEFF_ID_ZERO => F::zero(),
			COEFF_ID_ONE => self.value(wire_id),
			COEFF_ID_TWO => self.value(wire_id).double(),
			COEFF_ID_MINUS_ONE => -self.value(wire_id),
			_ => {
				let value = self.value(wire_id);
				if value.is_zero() {
					return value;
				}
				if value.is_one() {
					return self.coefficients[coeff_id as usize];
				}
				self.coefficients[coeff_id as usize] * value
			}
		}
	}

	/// `acc += coefficient · value[wire]`, with the same fast paths as
	/// [`Self::compute_term`]. No-op for the zero sentinel.
	pub fn accumulate_into(&self, term: Term, acc: &mut F) {
		let (coeff_id, wire_id, _) = term.unpack();
		match coeff_id {
			COEFF_ID_ZERO => {}
			COEFF_ID_ONE => *acc += self.value(wire_id),
			COEFF_ID_TWO => *acc += self.value(wire_id).double(),
			COEFF_ID_MINUS_ONE => *acc -= self.value(wire_id),
			_ => {
				let value = self.value(wire_id);
				if value.is_zero() {
					return;
				}
				if value.is_one() {
					*acc += self.coefficients[coeff_id as usize];
					return;
				}
				*acc += self.coefficients[coeff_id as usize] * value;
			}
		}
	}

	/// Solves `wire_id` (and the descriptor's other output wires) by running
	/// its hint function.
	///
	/// Returns immediately when the wire is already solved: another output
	/// of the same descriptor may have triggered the hint. Inputs that are
	/// themselves unsolved hint outputs are resolved recursively; the levels
	/// guarantee acyclicity, so no cycle detection is done at runtime. An
	/// unsolved non-hint input wire is a dependency-order bug in the
	/// compiled system and aborts.
	pub fn solve_with_hint(&self, wire_id: usize, hint: &Hint) -> Result<(), Error> {
		if self.is_wire_solved(wire_id) {
			return Ok(());
		}

		let f = self
			.hint_functions
			.get(hint.id)
			.ok_or(Error::MissingHint(hint.id))?;

		let q = self.curve_id.scalar_modulus();

		let mut inputs = Vec::with_capacity(hint.inputs.len());
		for input in &hint.inputs {
			let value: BigUint = match input {
				HintInput::LinearExpression(expression) => {
					let mut acc = F::zero();
					for term in expression {
						self.solve_hint_dependency(*term)?;
						self.accumulate_into(*term, &mut acc);
					}
					acc.into()
				}
				HintInput::Term(term) => {
					self.solve_hint_dependency(*term)?;
					self.compute_term(*term).into()
				}
				HintInput::Constant(constant) => constant % &q,
			};
			inputs.push(value);
		}

		let mut outputs = vec![BigUint::ZERO; hint.wires.len()];
		f(self.curve_id, &inputs, &mut outputs)?;

		for (&wire, output) in hint.wires.iter().zip(&outputs) {
			self.set(wire, F::from(output.clone()));
		}

		Ok(())
	}

	fn solve_hint_dependency(&self, term: Term) -> Result<(), Error> {
		let wire_id = term.wire_id();
		if self.is_wire_solved(wire_id) {
			return Ok(());
		}
		match self.m_hints.get(&wire_id) {
			Some(hint) => self.solve_with_hint(wire_id, hint),
			None => panic!("solver can't compute hint; one or more input wires are unsolved"),
		}
	}

	/// Renders one deferred log entry against the current assignment.
	/// Unsolved wires print as a placeholder.
	pub fn log_value(&self, entry: &LogEntry) -> String {
		let mut resolved = Vec::new();
		let mut eval = F::zero();
		let mut is_eval = false;
		let mut missing_value = false;

		for term in &entry.to_resolve {
			if *term == Term::DELIMITER {
				if !is_eval {
					is_eval = true;
					missing_value = false;
					eval = F::zero();
					continue;
				}
				is_eval = false;
				if missing_value {
					resolved.push(UNSOLVED_VARIABLE.to_string());
				} else {
					resolved.push(eval.to_string());
				}
				continue;
			}
			let (coeff_id, wire_id, visibility) = term.unpack();

			if is_eval {
				if visibility == Visibility::Virtual {
					eval += self.coeff_value(coeff_id);
					continue;
				}
				if !self.is_wire_solved(wire_id) {
					missing_value = true;
					continue;
				}
				let term_value = self.compute_term(*term);
				eval += term_value;
				continue;
			}

			if visibility == Visibility::Virtual {
				if coeff_id == COEFF_ID_MINUS_ONE {
					resolved.push("-1".to_string());
				} else {
					resolved.push(self.coeff_value(coeff_id).to_string());
				}
				continue;
			}
			if coeff_id != COEFF_ID_MINUS_ONE && coeff_id != COEFF_ID_ONE {
				resolved.push(self.coeff_value(coeff_id).to_string());
			}
			if !self.is_wire_solved(wire_id) {
				resolved.push(UNSOLVED_VARIABLE.to_string());
			} else {
				resolved.push(self.value(wire_id).to_string());
			}
		}
		format_log(&entry.format, &resolved)
	}

	/// Emits the deferred circuit logs through `tracing` at debug level.
	pub fn print_logs(&self, logs: &[LogEntry]) {
		for entry in logs {
			let line = self.log_value(entry);
			tracing::debug!(caller = %entry.caller, "{line}");
		}
	}

	/// Consumes the state, returning the wire vector.
	pub fn into_values(self) -> Vec<F> {
		self.values
			.into_vec()
			.into_iter()
			.map(|cell| cell.0.into_inner())
			.collect()
	}
}
