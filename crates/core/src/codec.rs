//! Deterministic binary serialization of compiled systems.
//!
//! Layout, little-endian throughout:
//!
//! ```text
//! [ hintMapLen u64 | hintMapBytes… ]
//! [ constraintsLen u64 | constraintsBytes… ]
//! [ generic-encoded metadata fields… ]
//! [ generic-encoded coefficients… ]
//! ```
//!
//! The two leading blocks use a custom layout that exploits the dense
//! structure of hint tables and constraints; the metadata tail goes through
//! the workspace's generic encoder, which is canonical by construction
//! (maps serialize in ascending key order).

use std::{
	collections::{BTreeMap, HashMap},
	sync::Arc,
};

use ark_ff::{BigInteger, PrimeField};
use bytes::{Buf, BufMut};
use fieldline_utils::serialization::{
	assert_enough_data_for, assert_enough_space_for, DeserializeBytes, SerializationError,
	SerializeBytes,
};
use num_bigint::BigUint;

use crate::{
	curve::CurveId,
	hint::{Hint, HintId, HintInput, SharedHint},
	log::{Counter, LogEntry, Schema},
	system::R1cs,
	term::{LinearExpression, R1C, Term},
};

// Hint-input tags. Part of the wire format, opaque magic numbers.
const TAG_BIG_INT: i64 = 25446;
const TAG_BIG_INT_REF: i64 = 25447;
const TAG_LINEAR_EXPRESSION: i64 = 25443;

// Hint-map entry modes.
const MODE_ALIAS: i64 = 0;
const MODE_INLINE: i64 = 1;

impl<F: PrimeField> SerializeBytes for R1cs<F> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		let hint_map = encode_hint_map(&self.m_hints);
		write_length_prefixed(&mut write_buf, &hint_map)?;

		let constraints = encode_constraints(&self.constraints);
		write_length_prefixed(&mut write_buf, &constraints)?;

		self.schema.serialize(&mut write_buf)?;
		self.nb_internal_variables.serialize(&mut write_buf)?;
		self.nb_public_variables.serialize(&mut write_buf)?;
		self.nb_secret_variables.serialize(&mut write_buf)?;
		self.public.serialize(&mut write_buf)?;
		self.secret.serialize(&mut write_buf)?;
		self.logs.serialize(&mut write_buf)?;
		self.debug_info.serialize(&mut write_buf)?;
		self.m_debug.serialize(&mut write_buf)?;
		self.counters.serialize(&mut write_buf)?;
		self.m_hints_dependencies.serialize(&mut write_buf)?;
		self.levels.serialize(&mut write_buf)?;
		self.curve_id.serialize(&mut write_buf)?;

		self.coefficients.len().serialize(&mut write_buf)?;
		for coefficient in &self.coefficients {
			serialize_field_element(coefficient, &mut write_buf)?;
		}
		Ok(())
	}
}

impl<F: PrimeField> DeserializeBytes for R1cs<F> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		// Each custom block decodes against exactly the byte range its length
		// prefix declares, so a malformed block fails here instead of
		// desyncing its neighbors.
		let hint_map_len = read_block_len(&mut read_buf)?;
		let mut block = (&mut read_buf).take(hint_map_len);
		let m_hints = decode_hint_map(&mut block)?;
		if block.has_remaining() {
			return Err(SerializationError::InvalidConstruction {
				name: "R1cs::hintMapLen",
			});
		}

		let constraints_len = read_block_len(&mut read_buf)?;
		let mut block = (&mut read_buf).take(constraints_len);
		let constraints = decode_constraints(&mut block)?;
		if block.has_remaining() {
			return Err(SerializationError::InvalidConstruction {
				name: "R1cs::constraintsLen",
			});
		}

		let schema = Schema::deserialize(&mut read_buf)?;
		let nb_internal_variables = usize::deserialize(&mut read_buf)?;
		let nb_public_variables = usize::deserialize(&mut read_buf)?;
		let nb_secret_variables = usize::deserialize(&mut read_buf)?;
		let public = Vec::<String>::deserialize(&mut read_buf)?;
		let secret = Vec::<String>::deserialize(&mut read_buf)?;
		let logs = Vec::<LogEntry>::deserialize(&mut read_buf)?;
		let debug_info = Vec::<LogEntry>::deserialize(&mut read_buf)?;
		let m_debug = BTreeMap::<usize, usize>::deserialize(&mut read_buf)?;
		let counters = Vec::<Counter>::deserialize(&mut read_buf)?;
		let m_hints_dependencies = BTreeMap::<HintId, String>::deserialize(&mut read_buf)?;
		let levels = Vec::<Vec<usize>>::deserialize(&mut read_buf)?;
		let curve_id = CurveId::deserialize(&mut read_buf)?;

		// A system can only be opened under its own scalar field.
		if !curve_id.matches_field::<F>() {
			return Err(SerializationError::InvalidConstruction {
				name: "R1cs::curve_id",
			});
		}

		let nb_coefficients = usize::deserialize(&mut read_buf)?;
		assert_enough_data_for(
			&read_buf,
			nb_coefficients.saturating_mul(field_element_size::<F>()),
		)?;
		let mut coefficients = Vec::with_capacity(nb_coefficients);
		for _ in 0..nb_coefficients {
			coefficients.push(deserialize_field_element(&mut read_buf)?);
		}

		Ok(R1cs {
			schema,
			nb_internal_variables,
			nb_public_variables,
			nb_secret_variables,
			public,
			secret,
			logs,
			debug_info,
			m_debug,
			counters,
			m_hints,
			m_hints_dependencies,
			levels,
			curve_id,
			constraints,
			coefficients,
		})
	}
}

fn write_length_prefixed(
	mut write_buf: impl BufMut,
	block: &[u8],
) -> Result<(), SerializationError> {
	assert_enough_space_for(&write_buf, 8 + block.len())?;
	write_buf.put_u64_le(block.len() as u64);
	write_buf.put_slice(block);
	Ok(())
}

fn read_block_len(mut read_buf: impl Buf) -> Result<usize, SerializationError> {
	assert_enough_data_for(&read_buf, 8)?;
	let len = read_buf.get_u64_le() as usize;
	assert_enough_data_for(&read_buf, len)?;
	Ok(len)
}

fn read_i64(mut read_buf: impl Buf) -> Result<i64, SerializationError> {
	assert_enough_data_for(&read_buf, 8)?;
	Ok(read_buf.get_i64_le())
}

/// Encodes the hint map, preserving pointer-identity sharing: the first
/// entry referencing a descriptor inlines it, later entries alias the first
/// wire ID. Entries are written in ascending wire-ID order so the encoding
/// is canonical.
fn encode_hint_map(m_hints: &BTreeMap<usize, SharedHint>) -> Vec<u8> {
	let mut buf = Vec::new();
	buf.put_i64_le(m_hints.len() as i64);

	let mut seen: HashMap<*const Hint, usize> = HashMap::new();

	for (&wire_id, hint) in m_hints {
		buf.put_i64_le(wire_id as i64);

		if let Some(&first_key) = seen.get(&Arc::as_ptr(hint)) {
			buf.put_i64_le(MODE_ALIAS);
			buf.put_i64_le(first_key as i64);
			continue;
		}
		seen.insert(Arc::as_ptr(hint), wire_id);
		buf.put_i64_le(MODE_INLINE);

		buf.put_u32_le(hint.id);
		buf.put_i64_le(hint.wires.len() as i64);
		for &wire in &hint.wires {
			buf.put_i64_le(wire as i64);
		}
		buf.put_i64_le(hint.inputs.len() as i64);
		for input in &hint.inputs {
			match input {
				HintInput::Constant(value) => {
					buf.put_i64_le(TAG_BIG_INT);
					let bytes = big_int_bytes(value);
					buf.put_i64_le(bytes.len() as i64);
					buf.put_slice(&bytes);
				}
				HintInput::LinearExpression(expression) => {
					buf.put_i64_le(TAG_LINEAR_EXPRESSION);
					buf.put_i64_le(expression.len() as i64);
					for term in expression {
						buf.put_u64_le(term.0);
					}
				}
				// A bare term evaluates exactly like the singleton
				// expression, which is the only term-bearing shape the wire
				// format has.
				HintInput::Term(term) => {
					buf.put_i64_le(TAG_LINEAR_EXPRESSION);
					buf.put_i64_le(1);
					buf.put_u64_le(term.0);
				}
			}
		}
	}
	buf
}

fn decode_hint_map(
	mut read_buf: impl Buf,
) -> Result<BTreeMap<usize, SharedHint>, SerializationError> {
	let count = read_i64(&mut read_buf)?;
	let mut m_hints = BTreeMap::new();

	for _ in 0..count {
		let wire_id = read_i64(&mut read_buf)? as usize;
		let mode = read_i64(&mut read_buf)?;
		match mode {
			MODE_ALIAS => {
				let first_key = read_i64(&mut read_buf)? as usize;
				let shared = m_hints
					.get(&first_key)
					.cloned()
					.ok_or(SerializationError::InvalidConstruction {
						name: "Hint::alias",
					})?;
				m_hints.insert(wire_id, shared);
			}
			MODE_INLINE => {
				let hint = decode_hint(&mut read_buf)?;
				m_hints.insert(wire_id, Arc::new(hint));
			}
			_ => {
				return Err(SerializationError::InvalidConstruction {
					name: "Hint::mode",
				})
			}
		}
	}
	Ok(m_hints)
}

fn decode_hint(mut read_buf: impl Buf) -> Result<Hint, SerializationError> {
	let id = u32::deserialize(&mut read_buf)?;

	// Counts come off the wire; the buffer must be able to hold at least the
	// minimum encoding of every entry before an allocation is sized from
	// them.
	let wire_count = read_i64(&mut read_buf)? as usize;
	assert_enough_data_for(&read_buf, wire_count.saturating_mul(8))?;
	let mut wires = Vec::with_capacity(wire_count);
	for _ in 0..wire_count {
		wires.push(read_i64(&mut read_buf)? as usize);
	}

	// An input is at least a tag and a length.
	let input_count = read_i64(&mut read_buf)? as usize;
	assert_enough_data_for(&read_buf, input_count.saturating_mul(16))?;
	let mut inputs = Vec::with_capacity(input_count);
	for _ in 0..input_count {
		let tag = read_i64(&mut read_buf)?;
		let input = match tag {
			// The value and reference flavors decode identically.
			TAG_BIG_INT | TAG_BIG_INT_REF => {
				let len = read_i64(&mut read_buf)? as usize;
				assert_enough_data_for(&read_buf, len)?;
				let bytes = read_buf.copy_to_bytes(len);
				HintInput::Constant(BigUint::from_bytes_be(&bytes))
			}
			TAG_LINEAR_EXPRESSION => {
				let len = read_i64(&mut read_buf)? as usize;
				assert_enough_data_for(&read_buf, len.saturating_mul(8))?;
				let mut expression = Vec::with_capacity(len);
				for _ in 0..len {
					expression.push(Term(read_buf.get_u64_le()));
				}
				HintInput::LinearExpression(expression)
			}
			_ => {
				return Err(SerializationError::InvalidConstruction {
					name: "HintInput::tag",
				})
			}
		};
		inputs.push(input);
	}

	Ok(Hint { id, wires, inputs })
}

fn encode_constraints(constraints: &[R1C]) -> Vec<u8> {
	let mut buf = Vec::new();
	buf.put_u64_le(constraints.len() as u64);
	for constraint in constraints {
		encode_linear_expression(&mut buf, &constraint.l);
		encode_linear_expression(&mut buf, &constraint.r);
		encode_linear_expression(&mut buf, &constraint.o);
	}
	buf
}

fn encode_linear_expression(buf: &mut Vec<u8>, expression: &LinearExpression) {
	buf.put_i64_le(expression.len() as i64);
	for term in expression {
		buf.put_u64_le(term.0);
	}
}

fn decode_constraints(mut read_buf: impl Buf) -> Result<Vec<R1C>, SerializationError> {
	assert_enough_data_for(&read_buf, 8)?;
	let count = read_buf.get_u64_le() as usize;
	// A constraint is at least three expression lengths.
	assert_enough_data_for(&read_buf, count.saturating_mul(24))?;
	let mut constraints = Vec::with_capacity(count);
	for _ in 0..count {
		let l = decode_linear_expression(&mut read_buf)?;
		let r = decode_linear_expression(&mut read_buf)?;
		let o = decode_linear_expression(&mut read_buf)?;
		constraints.push(R1C { l, r, o });
	}
	Ok(constraints)
}

fn decode_linear_expression(
	mut read_buf: impl Buf,
) -> Result<LinearExpression, SerializationError> {
	let len = read_i64(&mut read_buf)? as usize;
	assert_enough_data_for(&read_buf, len.saturating_mul(8))?;
	let mut expression = Vec::with_capacity(len);
	for _ in 0..len {
		expression.push(Term(read_buf.get_u64_le()));
	}
	Ok(expression)
}

/// Go `big.Int` byte convention: big-endian magnitude, empty for zero.
fn big_int_bytes(value: &BigUint) -> Vec<u8> {
	if *value == BigUint::ZERO {
		Vec::new()
	} else {
		value.to_bytes_be()
	}
}

fn field_element_size<F: PrimeField>() -> usize {
	(F::MODULUS_BIT_SIZE as usize).div_ceil(8)
}

fn serialize_field_element<F: PrimeField>(
	element: &F,
	mut write_buf: impl BufMut,
) -> Result<(), SerializationError> {
	let size = field_element_size::<F>();
	assert_enough_space_for(&write_buf, size)?;
	// Canonical (non-Montgomery) little-endian bytes, padded to the field
	// size.
	let mut bytes = element.into_bigint().to_bytes_le();
	bytes.resize(size, 0);
	write_buf.put_slice(&bytes);
	Ok(())
}

fn deserialize_field_element<F: PrimeField>(
	mut read_buf: impl Buf,
) -> Result<F, SerializationError> {
	let size = field_element_size::<F>();
	assert_enough_data_for(&read_buf, size)?;
	let bytes = read_buf.copy_to_bytes(size);
	Ok(F::from_le_bytes_mod_order(&bytes))
}
