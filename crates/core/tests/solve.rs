//! End-to-end solver scenarios on BN254.

use std::sync::Arc;

use ark_bn254::Fr;
use ark_ff::{One, Zero};
use fieldline_core::{
	consts::{COEFF_ID_MINUS_ONE, COEFF_ID_ONE},
	hint::IS_ZERO_ID,
	CurveId, Error, Hint, HintInput, HintRegistry, LogEntry, ProverConfig, R1cs, R1C, Term,
	Visibility,
};
use fieldline_utils::{DeserializeBytes, SerializeBytes};
use num_bigint::BigUint;

fn one_term(wire_id: usize, visibility: Visibility) -> Term {
	Term::new(COEFF_ID_ONE, wire_id, visibility)
}

fn base_pool() -> Vec<Fr> {
	vec![Fr::zero(), Fr::one(), Fr::from(2u64), -Fr::one()]
}

fn new_system(nb_public: usize, nb_secret: usize, nb_internal: usize) -> R1cs<Fr> {
	let mut cs = R1cs::new(CurveId::Bn254);
	cs.nb_public_variables = nb_public;
	cs.nb_secret_variables = nb_secret;
	cs.nb_internal_variables = nb_internal;
	cs.coefficients = base_pool();
	cs
}

fn solve(
	cs: &R1cs<Fr>,
	witness: &[Fr],
) -> Result<(Vec<Fr>, Vec<Fr>, Vec<Fr>, Vec<Fr>), Error> {
	let nb = cs.constraints.len();
	let mut a = vec![Fr::zero(); nb];
	let mut b = vec![Fr::zero(); nb];
	let mut c = vec![Fr::zero(); nb];
	let values = cs.solve(witness, &mut a, &mut b, &mut c, &ProverConfig::new())?;
	Ok((values, a, b, c))
}

fn assert_satisfied(a: &[Fr], b: &[Fr], c: &[Fr]) {
	for i in 0..a.len() {
		assert_eq!(a[i] * b[i], c[i], "constraint {i} does not hold");
	}
}

/// Public wire 1 holds `x`; internal wire 2 holds the hint output
/// `y = IsZero(x)`; the single constraint is `x · y = 0`.
fn is_zero_system() -> R1cs<Fr> {
	let mut cs = new_system(2, 0, 1);
	let descriptor = Arc::new(Hint {
		id: IS_ZERO_ID,
		wires: vec![2],
		inputs: vec![HintInput::LinearExpression(vec![one_term(
			1,
			Visibility::Public,
		)])],
	});
	cs.m_hints = [(2usize, descriptor)].into();
	cs.m_hints_dependencies = [(IS_ZERO_ID, "is_zero".to_string())].into();
	cs.constraints = vec![R1C {
		l: vec![one_term(1, Visibility::Public)],
		r: vec![one_term(2, Visibility::Internal)],
		o: vec![],
	}];
	cs.levels = vec![vec![0]];
	cs
}

/// Ten constraints `v_i · v_i = v_{i+1}` with `v_0 = x` (public wire 1) and
/// `v_10 = y` (public wire 2); `v_1 .. v_9` are internal wires 3..11.
fn squaring_chain_system() -> R1cs<Fr> {
	let mut cs = new_system(3, 0, 9);
	let v_wire = |k: usize| match k {
		0 => (1usize, Visibility::Public),
		10 => (2, Visibility::Public),
		_ => (2 + k, Visibility::Internal),
	};
	cs.constraints = (0..10)
		.map(|i| {
			let (in_wire, in_vis) = v_wire(i);
			let (out_wire, out_vis) = v_wire(i + 1);
			R1C {
				l: vec![one_term(in_wire, in_vis)],
				r: vec![one_term(in_wire, in_vis)],
				o: vec![one_term(out_wire, out_vis)],
			}
		})
		.collect();
	cs.levels = (0..10).map(|i| vec![i]).collect();
	cs
}

/// `2^(2^k) mod q`.
fn pow_pow_two(k: u32) -> Fr {
	let q = CurveId::Bn254.scalar_modulus();
	Fr::from(BigUint::from(2u32).modpow(&(BigUint::from(1u32) << k), &q))
}

/// `nb` independent constraints `x · x = w_i`, all in one level.
fn wide_system(nb: usize) -> R1cs<Fr> {
	let mut cs = new_system(2, 0, nb);
	cs.constraints = (0..nb)
		.map(|i| R1C {
			l: vec![one_term(1, Visibility::Public)],
			r: vec![one_term(1, Visibility::Public)],
			o: vec![one_term(2 + i, Visibility::Internal)],
		})
		.collect();
	cs.levels = vec![(0..nb).collect()];
	cs
}

fn solve_in_pool(cs: &R1cs<Fr>, witness: &[Fr], threads: usize) -> Vec<Fr> {
	let pool = rayon::ThreadPoolBuilder::new()
		.num_threads(threads)
		.build()
		.unwrap();
	pool.install(|| solve(cs, witness).unwrap().0)
}

#[test]
fn test_is_zero_of_nonzero() {
	let cs = is_zero_system();
	let (values, a, b, c) = solve(&cs, &[Fr::from(7u64)]).unwrap();

	assert_eq!(values, vec![Fr::one(), Fr::from(7u64), Fr::zero()]);
	assert_eq!(a, vec![Fr::from(7u64)]);
	assert_eq!(b, vec![Fr::zero()]);
	assert_eq!(c, vec![Fr::zero()]);
	assert_satisfied(&a, &b, &c);
}

#[test]
fn test_is_zero_of_zero() {
	let cs = is_zero_system();
	let (values, a, b, c) = solve(&cs, &[Fr::zero()]).unwrap();

	assert_eq!(values, vec![Fr::one(), Fr::zero(), Fr::one()]);
	assert_satisfied(&a, &b, &c);
}

#[test]
fn test_squaring_chain() {
	let cs = squaring_chain_system();
	let y = pow_pow_two(10);
	let (values, a, b, c) = solve(&cs, &[Fr::from(2u64), y]).unwrap();

	for k in 1..=9u32 {
		assert_eq!(values[2 + k as usize], pow_pow_two(k), "v_{k}");
	}
	assert_satisfied(&a, &b, &c);
	assert!(cs.is_solved(&[Fr::from(2u64), y], &ProverConfig::new()).is_ok());
}

#[test]
fn test_squaring_chain_unsatisfied() {
	let cs = squaring_chain_system();
	let y = pow_pow_two(10) + Fr::one();
	let err = solve(&cs, &[Fr::from(2u64), y]).unwrap_err();

	match err {
		Error::Unsatisfied(unsatisfied) => {
			assert_eq!(unsatisfied.cid, 9);
			assert!(unsatisfied.debug_info.is_none());
		}
		other => panic!("expected UnsatisfiedConstraint, got {other:?}"),
	}
}

#[test]
fn test_unsatisfied_constraint_carries_debug_info() {
	let mut cs = squaring_chain_system();
	cs.debug_info = vec![LogEntry {
		format: "chain output mismatch, v10 = {}".to_string(),
		to_resolve: vec![
			Term::DELIMITER,
			one_term(2, Visibility::Public),
			Term::DELIMITER,
		],
		caller: "chain.rs:42".to_string(),
	}];
	cs.m_debug = [(9usize, 0usize)].into();

	let y = pow_pow_two(10) + Fr::one();
	let err = solve(&cs, &[Fr::from(2u64), y]).unwrap_err();
	match err {
		Error::Unsatisfied(unsatisfied) => {
			let info = unsatisfied.debug_info.clone().expect("debug info attached");
			assert!(info.starts_with("chain output mismatch, v10 = "));
			assert_eq!(
				format!("{unsatisfied}"),
				format!("constraint #9 is not satisfied: {info}"),
			);
		}
		other => panic!("expected UnsatisfiedConstraint, got {other:?}"),
	}
}

#[test]
fn test_one_wire_only_constraint() {
	let mut cs = new_system(1, 0, 0);
	cs.constraints = vec![R1C {
		l: vec![one_term(0, Visibility::Public)],
		r: vec![one_term(0, Visibility::Public)],
		o: vec![one_term(0, Visibility::Public)],
	}];
	cs.levels = vec![vec![0]];

	let (values, a, b, c) = solve(&cs, &[]).unwrap();
	assert_eq!(values, vec![Fr::one()]);
	assert_satisfied(&a, &b, &c);
}

#[test]
fn test_zero_cofactor_verifies_without_dividing() {
	// The unknown sits in L while R evaluates to zero: the solver must
	// check `a · b = c` and assign zero instead of dividing.
	let mut cs = new_system(2, 0, 1);
	cs.constraints = vec![R1C {
		l: vec![one_term(2, Visibility::Internal)],
		r: vec![],
		o: vec![],
	}];
	cs.levels = vec![vec![0]];

	let (values, _, _, _) = solve(&cs, &[Fr::from(5u64)]).unwrap();
	assert_eq!(values[2], Fr::zero());
}

#[test]
fn test_hint_depending_on_hint_within_one_constraint() {
	// Wire 2 is IsZero(x), wire 3 is IsZero(wire 2); only wire 3 appears in
	// the constraint, so wire 2 resolves through recursion.
	let mut cs = new_system(2, 0, 2);
	let inner = Arc::new(Hint {
		id: IS_ZERO_ID,
		wires: vec![2],
		inputs: vec![HintInput::LinearExpression(vec![one_term(
			1,
			Visibility::Public,
		)])],
	});
	let outer = Arc::new(Hint {
		id: IS_ZERO_ID,
		wires: vec![3],
		inputs: vec![HintInput::Term(one_term(2, Visibility::Internal))],
	});
	cs.m_hints = [(2usize, inner), (3, outer)].into();
	cs.m_hints_dependencies = [(IS_ZERO_ID, "is_zero".to_string())].into();
	cs.constraints = vec![R1C {
		l: vec![one_term(3, Visibility::Internal)],
		r: vec![one_term(0, Visibility::Public)],
		o: vec![one_term(3, Visibility::Internal)],
	}];
	cs.levels = vec![vec![0]];

	let (values, a, b, c) = solve(&cs, &[Fr::from(7u64)]).unwrap();
	assert_eq!(values[2], Fr::zero());
	assert_eq!(values[3], Fr::one());
	assert_satisfied(&a, &b, &c);
}

#[test]
fn test_shared_hint_codec_round_trip() {
	// Two IsZero outputs backed by one descriptor; both wires must map to
	// the same in-memory descriptor after decoding, and the decoded system
	// must solve identically.
	let mut cs = new_system(2, 0, 2);
	let descriptor = Arc::new(Hint {
		id: IS_ZERO_ID,
		wires: vec![2, 3],
		inputs: vec![HintInput::LinearExpression(vec![one_term(
			1,
			Visibility::Public,
		)])],
	});
	cs.m_hints = [(2usize, Arc::clone(&descriptor)), (3, descriptor)].into();
	cs.m_hints_dependencies = [(IS_ZERO_ID, "is_zero".to_string())].into();
	cs.constraints = vec![
		R1C {
			l: vec![one_term(1, Visibility::Public)],
			r: vec![one_term(2, Visibility::Internal)],
			o: vec![],
		},
		R1C {
			l: vec![one_term(1, Visibility::Public)],
			r: vec![one_term(3, Visibility::Internal)],
			o: vec![],
		},
	];
	cs.levels = vec![vec![0, 1]];

	let mut buf = Vec::new();
	cs.serialize(&mut buf).unwrap();
	let decoded = R1cs::<Fr>::deserialize(&mut buf.as_slice()).unwrap();

	assert_eq!(cs, decoded);
	assert!(Arc::ptr_eq(&decoded.m_hints[&2], &decoded.m_hints[&3]));

	let witness = [Fr::from(7u64)];
	let original = solve(&cs, &witness).unwrap();
	let reloaded = solve(&decoded, &witness).unwrap();
	assert_eq!(original, reloaded);
}

#[test]
fn test_solve_after_round_trip_matches() {
	let cs = squaring_chain_system();
	let witness = [Fr::from(2u64), pow_pow_two(10)];
	let original = solve(&cs, &witness).unwrap();

	let mut buf = Vec::new();
	cs.serialize(&mut buf).unwrap();
	let decoded = R1cs::<Fr>::deserialize(&mut buf.as_slice()).unwrap();
	let reloaded = solve(&decoded, &witness).unwrap();

	assert_eq!(original, reloaded);
}

#[test]
fn test_parallel_determinism() {
	// 400 constraints in one level saturate an 8-worker pool at the default
	// work threshold.
	let cs = wide_system(400);
	let witness = [Fr::from(3u64)];

	let sequential = solve_in_pool(&cs, &witness, 1);
	let two_workers = solve_in_pool(&cs, &witness, 2);
	let eight_workers = solve_in_pool(&cs, &witness, 8);

	assert_eq!(sequential, two_workers);
	assert_eq!(sequential, eight_workers);
	assert!(sequential[2..].iter().all(|w| *w == Fr::from(9u64)));
}

#[test]
fn test_parallel_unsatisfied_surfaces_first_error() {
	// Force the multiplicative check to fail in a parallel level: every
	// constraint claims x · x = x.
	let mut cs = wide_system(400);
	for constraint in &mut cs.constraints {
		constraint.o = vec![one_term(1, Visibility::Public)];
	}
	cs.nb_internal_variables = 0;

	let err = solve(&cs, &[Fr::from(3u64)]).unwrap_err();
	match err {
		Error::Unsatisfied(unsatisfied) => assert!(unsatisfied.cid < 400),
		other => panic!("expected UnsatisfiedConstraint, got {other:?}"),
	}
}

#[test]
fn test_invalid_witness_size() {
	let cs = is_zero_system();
	let err = solve(&cs, &[]).unwrap_err();
	assert!(matches!(err, Error::InvalidWitnessSize { got: 0, expected: 1, .. }));
}

#[test]
fn test_invalid_buffer() {
	let cs = is_zero_system();
	let mut a = vec![Fr::zero(); 2];
	let mut b = vec![Fr::zero(); 1];
	let mut c = vec![Fr::zero(); 1];
	let err = cs
		.solve(&[Fr::from(7u64)], &mut a, &mut b, &mut c, &ProverConfig::new())
		.unwrap_err();
	assert!(matches!(err, Error::InvalidBuffer));
}

#[test]
fn test_missing_hint_function() {
	let cs = is_zero_system();
	let config = ProverConfig::new().with_hints(HintRegistry::empty());
	let nb = cs.constraints.len();
	let mut a = vec![Fr::zero(); nb];
	let mut b = vec![Fr::zero(); nb];
	let mut c = vec![Fr::zero(); nb];
	let err = cs
		.solve(&[Fr::from(7u64)], &mut a, &mut b, &mut c, &config)
		.unwrap_err();
	match err {
		Error::MissingHintFunction(names) => assert_eq!(names, vec!["is_zero"]),
		other => panic!("expected MissingHintFunction, got {other:?}"),
	}
}

#[test]
fn test_custom_hint_registration() {
	// A user hint that negates its input modulo q.
	let mut registry = HintRegistry::builtin();
	let negate_id = registry.register(
		"negate",
		|curve: CurveId, inputs: &[BigUint], outputs: &mut [BigUint]| {
			let q = curve.scalar_modulus();
			outputs[0] = (&q - &inputs[0] % &q) % &q;
			Ok(())
		},
	);

	let mut cs = new_system(2, 0, 1);
	let descriptor = Arc::new(Hint {
		id: negate_id,
		wires: vec![2],
		inputs: vec![HintInput::LinearExpression(vec![one_term(
			1,
			Visibility::Public,
		)])],
	});
	cs.m_hints = [(2usize, descriptor)].into();
	cs.m_hints_dependencies = [(negate_id, "negate".to_string())].into();
	// y = -x, constrained by y · 1 = -x.
	cs.constraints = vec![R1C {
		l: vec![one_term(2, Visibility::Internal)],
		r: vec![one_term(0, Visibility::Public)],
		o: vec![Term::new(COEFF_ID_MINUS_ONE, 1, Visibility::Public)],
	}];
	cs.levels = vec![vec![0]];

	let nb = cs.constraints.len();
	let mut a = vec![Fr::zero(); nb];
	let mut b = vec![Fr::zero(); nb];
	let mut c = vec![Fr::zero(); nb];
	let config = ProverConfig::new().with_hints(registry);
	let values = cs
		.solve(&[Fr::from(7u64)], &mut a, &mut b, &mut c, &config)
		.unwrap();
	assert_eq!(values[2], -Fr::from(7u64));
}
