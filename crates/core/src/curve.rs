//! Curve identifiers.

use std::fmt;

use ark_ff::PrimeField;
use bytes::{Buf, BufMut};
use fieldline_utils::{DeserializeBytes, SerializationError, SerializeBytes};
use num_bigint::BigUint;

/// Identifies the ambient elliptic curve, and with it the scalar field the
/// constraint system is defined over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CurveId {
	Bn254,
	Bls12_381,
}

impl CurveId {
	/// Modulus of the curve's scalar field.
	pub fn scalar_modulus(&self) -> BigUint {
		match self {
			CurveId::Bn254 => ark_bn254::Fr::MODULUS.into(),
			CurveId::Bls12_381 => ark_bls12_381::Fr::MODULUS.into(),
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			CurveId::Bn254 => "bn254",
			CurveId::Bls12_381 => "bls12_381",
		}
	}

	/// Whether `F` is this curve's scalar field.
	pub fn matches_field<F: PrimeField>(&self) -> bool {
		let modulus: BigUint = F::MODULUS.into();
		modulus == self.scalar_modulus()
	}
}

impl fmt::Display for CurveId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl SerializeBytes for CurveId {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		let index = match self {
			CurveId::Bn254 => 0u8,
			CurveId::Bls12_381 => 1u8,
		};
		index.serialize(write_buf)
	}
}

impl DeserializeBytes for CurveId {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		let index = u8::deserialize(read_buf)?;
		match index {
			0 => Ok(CurveId::Bn254),
			1 => Ok(CurveId::Bls12_381),
			_ => Err(SerializationError::UnknownEnumVariant {
				name: "CurveId",
				index,
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_scalar_modulus_matches_field() {
		assert!(CurveId::Bn254.matches_field::<ark_bn254::Fr>());
		assert!(CurveId::Bls12_381.matches_field::<ark_bls12_381::Fr>());
		assert!(!CurveId::Bn254.matches_field::<ark_bls12_381::Fr>());
	}

	#[test]
	fn test_serialization_round_trip() {
		for curve in [CurveId::Bn254, CurveId::Bls12_381] {
			let mut buf = Vec::new();
			curve.serialize(&mut buf).unwrap();
			assert_eq!(curve, CurveId::deserialize(&mut buf.as_slice()).unwrap());
		}
	}
}
