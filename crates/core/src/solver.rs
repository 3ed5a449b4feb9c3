//! The level-parallel R1CS solver.
//!
//! Constraints arrive pre-grouped into dependency levels; constraints of one
//! level hold pairwise independent unknown wires, so a level can be solved
//! by a pool of workers with a barrier between levels. Each constraint has
//! at most one unknown wire, resolved by field division or through its hint
//! descriptor.

use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		mpsc,
	},
	time::Instant,
};

use ark_ff::{Field, One, PrimeField, Zero};

use crate::{
	consts::{COEFF_ID_MINUS_ONE, COEFF_ID_ONE, COEFF_ID_TWO, COEFF_ID_ZERO, MIN_WORK_PER_WORKER},
	error::{Error, UnsatisfiedConstraint},
	hint::HintRegistry,
	solution::Solution,
	system::R1cs,
	term::{LinearExpression, Term},
};

/// Options recognized by the solver.
///
/// Built with [`ProverConfig::new`] (or `Default`) and refined through the
/// `with_*` methods, so options added in the future do not affect existing
/// callers.
#[derive(Clone)]
pub struct ProverConfig {
	hint_registry: HintRegistry,
	circuit_logger: bool,
	min_work_per_worker: usize,
}

impl ProverConfig {
	pub fn new() -> Self {
		Self {
			hint_registry: HintRegistry::builtin(),
			circuit_logger: true,
			min_work_per_worker: MIN_WORK_PER_WORKER,
		}
	}

	/// Replaces the hint-function registry consulted by the resolver.
	pub fn with_hints(mut self, registry: HintRegistry) -> Self {
		self.hint_registry = registry;
		self
	}

	/// Disables the deferred circuit log sink.
	pub fn without_circuit_logger(mut self) -> Self {
		self.circuit_logger = false;
		self
	}

	/// Overrides the sequential-level threshold. Keep the default of
	/// [`MIN_WORK_PER_WORKER`] for behavioral parity with reference witness
	/// traces.
	pub fn with_min_work_per_worker(mut self, min_work_per_worker: usize) -> Self {
		self.min_work_per_worker = min_work_per_worker;
		self
	}

	pub fn hint_registry(&self) -> &HintRegistry {
		&self.hint_registry
	}
}

impl Default for ProverConfig {
	fn default() -> Self {
		Self::new()
	}
}

/// Which expression of a constraint holds the unknown wire.
#[derive(Clone, Copy)]
enum Slot {
	L,
	R,
	O,
}

/// Shared view of the per-constraint output vectors `a`, `b`, `c`.
struct OutputSlots<F> {
	a: *mut F,
	b: *mut F,
	c: *mut F,
}

// SAFETY: workers access disjoint constraint indices; every constraint
// belongs to exactly one chunk of exactly one level.
unsafe impl<F: Send> Sync for OutputSlots<F> {}

impl<F> OutputSlots<F> {
	fn new(a: &mut [F], b: &mut [F], c: &mut [F]) -> Self {
		Self {
			a: a.as_mut_ptr(),
			b: b.as_mut_ptr(),
			c: c.as_mut_ptr(),
		}
	}

	/// # Safety
	///
	/// Index `i` must not be accessed concurrently by another worker.
	#[allow(clippy::mut_from_ref)]
	unsafe fn at(&self, i: usize) -> (&mut F, &mut F, &mut F) {
		(&mut *self.a.add(i), &mut *self.b.add(i), &mut *self.c.add(i))
	}
}

/// Decides how many worker tasks a level gets. `None` means the level does
/// not have enough work to pay for synchronization and runs sequentially on
/// the calling thread.
fn level_task_count(level_len: usize, nb_cpus: usize, min_work_per_worker: usize) -> Option<usize> {
	let max_workers = level_len.div_ceil(min_work_per_worker);
	if max_workers <= 1 {
		return None;
	}
	Some(max_workers.min(nb_cpus))
}

/// Splits a level into `nb_tasks` contiguous chunks, as evenly as possible,
/// the remainder going to the earliest chunks.
fn split_level(level: &[usize], nb_tasks: usize) -> impl Iterator<Item = &[usize]> {
	let per_task = level.len() / nb_tasks;
	let mut extra = level.len() - nb_tasks * per_task;
	let mut start = 0;
	(0..nb_tasks).map(move |_| {
		let mut end = start + per_task;
		if extra > 0 {
			end += 1;
			extra -= 1;
		}
		let chunk = &level[start..end];
		start = end;
		chunk
	})
}

impl<F: PrimeField> R1cs<F> {
	/// Solves for every wire value and fills `a[i] = ⟨L_i, w⟩`,
	/// `b[i] = ⟨R_i, w⟩`, `c[i] = ⟨O_i, w⟩`.
	///
	/// `witness` holds the public wires (one-wire excluded) followed by the
	/// secret wires; `a`, `b` and `c` must have one slot per constraint.
	/// Returns the full wire vector `[one | public | secret | internal]`.
	pub fn solve(
		&self,
		witness: &[F],
		a: &mut [F],
		b: &mut [F],
		c: &mut [F],
		config: &ProverConfig,
	) -> Result<Vec<F>, Error> {
		let _span = tracing::debug_span!(
			"solve",
			curve = %self.curve_id,
			nb_constraints = self.constraints.len(),
		)
		.entered();
		let start = Instant::now();

		let solution = Solution::new(
			self.nb_wires(),
			self.curve_id,
			config.hint_registry(),
			&self.m_hints_dependencies,
			&self.m_hints,
			&self.coefficients,
		)?;

		let expected = self.nb_public_variables - 1 + self.nb_secret_variables;
		if witness.len() != expected {
			let err = Error::InvalidWitnessSize {
				got: witness.len(),
				expected,
				public: self.nb_public_variables - 1,
				secret: self.nb_secret_variables,
			};
			tracing::error!("{err}");
			return Err(err);
		}

		if a.len() != self.constraints.len()
			|| b.len() != self.constraints.len()
			|| c.len() != self.constraints.len()
		{
			let err = Error::InvalidBuffer;
			tracing::error!("{err}");
			return Err(err);
		}

		solution.assign_witness(witness);

		let result = self.parallel_solve(a, b, c, &solution, config.min_work_per_worker);

		// Deferred log entries are emitted whether or not the run succeeded;
		// wires that never got solved render as placeholders.
		if config.circuit_logger {
			solution.print_logs(&self.logs);
		}

		if let Err(err) = result {
			tracing::error!("{err}");
			return Err(err);
		}

		if !solution.is_valid() {
			tracing::error!("solver didn't instantiate all wires");
			panic!("solver didn't instantiate all wires");
		}

		tracing::debug!(took = ?start.elapsed(), "constraint system solver done");

		Ok(solution.into_values())
	}

	/// Runs the solver against `witness`, allocating the output vectors.
	/// Returns `Ok(())` when the witness satisfies the system.
	pub fn is_solved(&self, witness: &[F], config: &ProverConfig) -> Result<(), Error> {
		let mut a = vec![F::zero(); self.constraints.len()];
		let mut b = vec![F::zero(); self.constraints.len()];
		let mut c = vec![F::zero(); self.constraints.len()];
		self.solve(witness, &mut a, &mut b, &mut c, config).map(|_| ())
	}

	fn parallel_solve(
		&self,
		a: &mut [F],
		b: &mut [F],
		c: &mut [F],
		solution: &Solution<'_, F>,
		min_work_per_worker: usize,
	) -> Result<(), Error> {
		let slots = OutputSlots::new(a, b, c);

		for level in &self.levels {
			let nb_tasks =
				level_task_count(level.len(), rayon::current_num_threads(), min_work_per_worker);
			let Some(nb_tasks) = nb_tasks else {
				for &i in level {
					// SAFETY: sequential path, no other accessor.
					let (a_i, b_i, c_i) = unsafe { slots.at(i) };
					self.solve_constraint(i, solution, a_i, b_i, c_i)?;
				}
				continue;
			};

			let failed = AtomicBool::new(false);
			let (err_tx, err_rx) = mpsc::sync_channel::<Error>(nb_tasks);

			rayon::scope(|scope| {
				for chunk in split_level(level, nb_tasks) {
					let err_tx = err_tx.clone();
					let failed = &failed;
					let slots = &slots;
					scope.spawn(move |_| {
						for &i in chunk {
							// Another worker already failed the level; no
							// point finishing this chunk.
							if failed.load(Ordering::Relaxed) {
								return;
							}
							// SAFETY: constraint `i` belongs to exactly one
							// chunk of this level.
							let (a_i, b_i, c_i) = unsafe { slots.at(i) };
							if let Err(err) = self.solve_constraint(i, solution, a_i, b_i, c_i) {
								failed.store(true, Ordering::Relaxed);
								let _ = err_tx.try_send(err);
								return;
							}
						}
					});
				}
			});

			// The level barrier has been crossed; surface the first recorded
			// error instead of advancing.
			if let Ok(err) = err_rx.try_recv() {
				return Err(err);
			}
		}

		Ok(())
	}

	/// Solves the single unknown wire of constraint `cid`, if any, and
	/// checks `a · b = c` otherwise.
	fn solve_constraint(
		&self,
		cid: usize,
		solution: &Solution<'_, F>,
		a: &mut F,
		b: &mut F,
		c: &mut F,
	) -> Result<(), Error> {
		let constraint = &self.constraints[cid];

		let mut unknown: Option<(Term, Slot)> = None;
		self.walk_expression(solution, &constraint.l, a, Slot::L, &mut unknown)?;
		self.walk_expression(solution, &constraint.r, b, Slot::R, &mut unknown)?;
		self.walk_expression(solution, &constraint.o, c, Slot::O, &mut unknown)?;

		let Some((term, slot)) = unknown else {
			// Nothing to solve: an assertion-style constraint, or every
			// unknown was a hint output.
			return self.check_satisfied(cid, solution, a, b, c);
		};

		let mut wire = F::zero();
		match slot {
			Slot::L => {
				if !b.is_zero() {
					wire = *c / *b - *a;
					*a += wire;
				} else {
					self.check_satisfied(cid, solution, a, b, c)?;
				}
			}
			Slot::R => {
				if !a.is_zero() {
					wire = *c / *a - *b;
					*b += wire;
				} else {
					self.check_satisfied(cid, solution, a, b, c)?;
				}
			}
			Slot::O => {
				wire = *a * *b - *c;
				*c += wire;
			}
		}

		// `wire` currently holds coefficient · value; strip the coefficient
		// before storing. The front-end guarantees unknown-wire coefficients
		// are ±1, so the division branch is a safety net.
		self.div_by_coeff(&mut wire, term);
		solution.set(term.wire_id(), wire);

		Ok(())
	}

	/// Walks one linear expression, accumulating solved terms into `acc`,
	/// resolving hint wires, and recording the single unknown wire.
	fn walk_expression(
		&self,
		solution: &Solution<'_, F>,
		expression: &LinearExpression,
		acc: &mut F,
		slot: Slot,
		unknown: &mut Option<(Term, Slot)>,
	) -> Result<(), Error> {
		for term in expression {
			let wire_id = term.wire_id();

			if solution.is_wire_solved(wire_id) {
				solution.accumulate_into(*term, acc);
				continue;
			}

			if let Some(hint) = self.m_hints.get(&wire_id) {
				solution.solve_with_hint(wire_id, hint)?;
				solution.accumulate_into(*term, acc);
				continue;
			}

			if unknown.is_some() {
				panic!("found more than one wire to instantiate");
			}
			*unknown = Some((*term, slot));
		}
		Ok(())
	}

	fn check_satisfied(
		&self,
		cid: usize,
		solution: &Solution<'_, F>,
		a: &F,
		b: &F,
		c: &F,
	) -> Result<(), Error> {
		if *a * *b != *c {
			let debug_info = self
				.m_debug
				.get(&cid)
				.map(|&debug_id| solution.log_value(&self.debug_info[debug_id]));
			return Err(Error::Unsatisfied(UnsatisfiedConstraint {
				cid,
				a: a.to_string(),
				b: b.to_string(),
				c: c.to_string(),
				debug_info,
			}));
		}
		Ok(())
	}

	/// `wire /= coefficient(term)`.
	fn div_by_coeff(&self, wire: &mut F, term: Term) {
		match term.coeff_id() {
			COEFF_ID_ONE => {}
			COEFF_ID_MINUS_ONE => *wire = -*wire,
			COEFF_ID_ZERO => panic!("division by 0"),
			coeff_id => *wire /= self.coeff_value(coeff_id),
		}
	}

	fn coeff_value(&self, coeff_id: u32) -> F {
		match coeff_id {
			COEFF_ID_ZERO => F::zero(),
			COEFF_ID_ONE => F::one(),
			COEFF_ID_TWO => F::one().double(),
			COEFF_ID_MINUS_ONE => -F::one(),
			_ => self.coefficients[coeff_id as usize],
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_level_task_count_boundaries() {
		// Below one full task of work: sequential.
		assert_eq!(level_task_count(1, 8, 50), None);
		assert_eq!(level_task_count(49, 8, 50), None);
		assert_eq!(level_task_count(50, 8, 50), None);
		// Just above: two tasks.
		assert_eq!(level_task_count(51, 8, 50), Some(2));
		// Saturation: one task of 50 per CPU.
		assert_eq!(level_task_count(400, 8, 50), Some(8));
		// More work than CPUs can split further.
		assert_eq!(level_task_count(100_000, 8, 50), Some(8));
	}

	#[test]
	fn test_split_level_distributes_remainder_to_earliest_chunks() {
		let level: Vec<usize> = (0..7).collect();
		let chunks: Vec<&[usize]> = split_level(&level, 3).collect();
		assert_eq!(chunks, vec![&[0, 1, 2][..], &[3, 4][..], &[5, 6][..]]);

		let level: Vec<usize> = (0..400).collect();
		let chunks: Vec<&[usize]> = split_level(&level, 8).collect();
		assert_eq!(chunks.len(), 8);
		assert!(chunks.iter().all(|chunk| chunk.len() == 50));
		let flattened: Vec<usize> = chunks.concat();
		assert_eq!(flattened, level);
	}
}
