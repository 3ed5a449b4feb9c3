//! Packed terms, linear expressions, and rank-1 constraints.

use std::fmt;

use bytes::{Buf, BufMut};
use fieldline_utils::{DeserializeBytes, SerializationError, SerializeBytes};

/// Who provides a wire's value.
///
/// `Virtual` terms carry no wire at all: they denote a bare coefficient and
/// only appear in log entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
	Public,
	Secret,
	Internal,
	Virtual,
}

impl Visibility {
	fn index(self) -> u8 {
		match self {
			Visibility::Public => 0,
			Visibility::Secret => 1,
			Visibility::Internal => 2,
			Visibility::Virtual => 3,
		}
	}

	fn from_bits(bits: u64) -> Self {
		match bits & 0b11 {
			0 => Visibility::Public,
			1 => Visibility::Secret,
			2 => Visibility::Internal,
			_ => Visibility::Virtual,
		}
	}
}

impl SerializeBytes for Visibility {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.index().serialize(write_buf)
	}
}

impl DeserializeBytes for Visibility {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		let index = u8::deserialize(read_buf)?;
		match index {
			0 => Ok(Visibility::Public),
			1 => Ok(Visibility::Secret),
			2 => Ok(Visibility::Internal),
			3 => Ok(Visibility::Virtual),
			_ => Err(SerializationError::UnknownEnumVariant {
				name: "Visibility",
				index,
			}),
		}
	}
}

const WIRE_ID_MASK: u64 = (1 << 32) - 1;
const COEFF_ID_SHIFT: u32 = 32;
const COEFF_ID_MASK: u64 = (1 << 30) - 1;
const VISIBILITY_SHIFT: u32 = 62;

/// A single `coefficient · wire` product, packed into 64 bits.
///
/// Layout: wire ID in bits `[0, 32)`, coefficient ID in `[32, 62)`,
/// visibility tag in `[62, 64)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Term(pub u64);

impl Term {
	/// Separates groups of terms that log entries evaluate as a single sum.
	pub const DELIMITER: Term = Term(u64::MAX);

	pub fn new(coeff_id: u32, wire_id: usize, visibility: Visibility) -> Self {
		assert!(u64::from(coeff_id) <= COEFF_ID_MASK, "coefficient id out of range");
		assert!(wire_id as u64 <= WIRE_ID_MASK, "wire id out of range");
		Term(
			wire_id as u64
				| (u64::from(coeff_id) << COEFF_ID_SHIFT)
				| (u64::from(visibility.index()) << VISIBILITY_SHIFT),
		)
	}

	/// Unpacks `(coefficient ID, wire ID, visibility)`. Mask-and-shift only,
	/// no data-dependent branches.
	#[inline(always)]
	pub fn unpack(self) -> (u32, usize, Visibility) {
		(self.coeff_id(), self.wire_id(), self.visibility())
	}

	#[inline(always)]
	pub fn coeff_id(self) -> u32 {
		((self.0 >> COEFF_ID_SHIFT) & COEFF_ID_MASK) as u32
	}

	#[inline(always)]
	pub fn wire_id(self) -> usize {
		(self.0 & WIRE_ID_MASK) as usize
	}

	#[inline(always)]
	pub fn visibility(self) -> Visibility {
		Visibility::from_bits(self.0 >> VISIBILITY_SHIFT)
	}
}

impl fmt::Debug for Term {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if *self == Term::DELIMITER {
			return f.write_str("Term(DELIMITER)");
		}
		write!(
			f,
			"Term(coeff={}, wire={}, {:?})",
			self.coeff_id(),
			self.wire_id(),
			self.visibility()
		)
	}
}

impl SerializeBytes for Term {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.0.serialize(write_buf)
	}
}

impl DeserializeBytes for Term {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		Ok(Term(u64::deserialize(read_buf)?))
	}
}

/// An ordered sequence of terms, interpreted as their field sum. Source
/// order matters only for log formatting; the solver may sum in any order.
pub type LinearExpression = Vec<Term>;

/// A rank-1 constraint with the semantic `L · R = O` in the scalar field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct R1C {
	pub l: LinearExpression,
	pub r: LinearExpression,
	pub o: LinearExpression,
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	fn visibility_strategy() -> impl Strategy<Value = Visibility> {
		prop_oneof![
			Just(Visibility::Public),
			Just(Visibility::Secret),
			Just(Visibility::Internal),
			Just(Visibility::Virtual),
		]
	}

	proptest! {
		#[test]
		fn test_pack_unpack(
			coeff_id in 0u32..(1 << 30),
			wire_id in 0usize..(1 << 32),
			visibility in visibility_strategy(),
		) {
			let term = Term::new(coeff_id, wire_id, visibility);
			prop_assert_eq!(term.unpack(), (coeff_id, wire_id, visibility));
		}
	}

	#[test]
	fn test_delimiter_is_no_ordinary_term() {
		let max_term = Term::new((1 << 30) - 1, u32::MAX as usize, Visibility::Virtual);
		assert_eq!(max_term, Term::DELIMITER);
		// The delimiter is recognized by value comparison before unpacking,
		// never built by Term::new in practice: no real system has 2^30 - 1
		// coefficients.
	}

	#[test]
	fn test_serialization_round_trip() {
		let term = Term::new(17, 42, Visibility::Internal);
		let mut buf = Vec::new();
		term.serialize(&mut buf).unwrap();
		assert_eq!(term, Term::deserialize(&mut buf.as_slice()).unwrap());
	}
}
