use std::collections::BTreeMap;

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Writes a value into a byte buffer in the workspace wire format.
///
/// The encoding is canonical: serializing equal values always yields equal
/// bytes. Multi-byte integers are little-endian.
pub trait SerializeBytes {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError>;
}

/// Reads back a value written by [`SerializeBytes`].
pub trait DeserializeBytes {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized;
}

#[derive(Error, Debug, Clone)]
pub enum SerializationError {
	#[error("write buffer is full")]
	WriteBufferFull,
	#[error("not enough data in read buffer to deserialize")]
	NotEnoughBytes,
	#[error("unknown enum variant index {name}::{index}")]
	UnknownEnumVariant { name: &'static str, index: u8 },
	#[error("invalid construction of {name}")]
	InvalidConstruction { name: &'static str },
	#[error("usize {size} is too large to serialize (max is {max})", max = u32::MAX)]
	UsizeTooLarge { size: usize },
	#[error("FromUtf8Error: {0}")]
	FromUtf8Error(#[from] std::string::FromUtf8Error),
}

#[inline]
pub fn assert_enough_space_for(
	write_buf: &impl BufMut,
	size: usize,
) -> Result<(), SerializationError> {
	if write_buf.remaining_mut() < size {
		return Err(SerializationError::WriteBufferFull);
	}
	Ok(())
}

#[inline]
pub fn assert_enough_data_for(read_buf: &impl Buf, size: usize) -> Result<(), SerializationError> {
	if read_buf.remaining() < size {
		return Err(SerializationError::NotEnoughBytes);
	}
	Ok(())
}

impl<T: SerializeBytes + ?Sized> SerializeBytes for &T {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		(**self).serialize(write_buf)
	}
}

macro_rules! impl_serialize_bytes_for_uint {
	($ty:ty, $put:ident, $get:ident) => {
		impl SerializeBytes for $ty {
			fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
				assert_enough_space_for(&write_buf, std::mem::size_of::<Self>())?;
				write_buf.$put(*self);
				Ok(())
			}
		}

		impl DeserializeBytes for $ty {
			fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
				assert_enough_data_for(&read_buf, std::mem::size_of::<Self>())?;
				Ok(read_buf.$get())
			}
		}
	};
}

impl_serialize_bytes_for_uint!(u8, put_u8, get_u8);
impl_serialize_bytes_for_uint!(u16, put_u16_le, get_u16_le);
impl_serialize_bytes_for_uint!(u32, put_u32_le, get_u32_le);
impl_serialize_bytes_for_uint!(u64, put_u64_le, get_u64_le);

// usize goes over the wire as u32 so the format does not depend on the host
// platform.
impl SerializeBytes for usize {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		let value: u32 = (*self)
			.try_into()
			.map_err(|_| SerializationError::UsizeTooLarge { size: *self })?;
		value.serialize(&mut write_buf)
	}
}

impl DeserializeBytes for usize {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let value = u32::deserialize(&mut read_buf)?;
		Ok(value as Self)
	}
}

impl SerializeBytes for bool {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		u8::serialize(&(*self as u8), write_buf)
	}
}

impl DeserializeBytes for bool {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		Ok(u8::deserialize(read_buf)? != 0)
	}
}

impl SerializeBytes for str {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		let bytes = self.as_bytes();
		bytes.len().serialize(&mut write_buf)?;
		assert_enough_space_for(&write_buf, bytes.len())?;
		write_buf.put_slice(bytes);
		Ok(())
	}
}

impl SerializeBytes for String {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.as_str().serialize(write_buf)
	}
}

impl DeserializeBytes for String {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let len = usize::deserialize(&mut read_buf)?;
		assert_enough_data_for(&read_buf, len)?;
		Ok(Self::from_utf8(read_buf.copy_to_bytes(len).to_vec())?)
	}
}

impl<T: SerializeBytes> SerializeBytes for [T] {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.len().serialize(&mut write_buf)?;
		self.iter().try_for_each(|item| item.serialize(&mut write_buf))
	}
}

impl<T: SerializeBytes> SerializeBytes for Vec<T> {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.as_slice().serialize(write_buf)
	}
}

impl<T: DeserializeBytes> DeserializeBytes for Vec<T> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let len = usize::deserialize(&mut read_buf)?;
		(0..len).map(|_| T::deserialize(&mut read_buf)).collect()
	}
}

impl<T: SerializeBytes> SerializeBytes for Option<T> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		match self {
			Some(value) => {
				true.serialize(&mut write_buf)?;
				value.serialize(&mut write_buf)
			}
			None => false.serialize(write_buf),
		}
	}
}

impl<T: DeserializeBytes> DeserializeBytes for Option<T> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		Ok(match bool::deserialize(&mut read_buf)? {
			true => Some(T::deserialize(&mut read_buf)?),
			false => None,
		})
	}
}

impl<U: SerializeBytes, V: SerializeBytes> SerializeBytes for (U, V) {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.0.serialize(&mut write_buf)?;
		self.1.serialize(write_buf)
	}
}

impl<U: DeserializeBytes, V: DeserializeBytes> DeserializeBytes for (U, V) {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		Ok((U::deserialize(&mut read_buf)?, V::deserialize(read_buf)?))
	}
}

// BTreeMap iterates in ascending key order, so map encoding is canonical.
impl<K: SerializeBytes, V: SerializeBytes> SerializeBytes for BTreeMap<K, V> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.len().serialize(&mut write_buf)?;
		self.iter().try_for_each(|(key, value)| {
			key.serialize(&mut write_buf)?;
			value.serialize(&mut write_buf)
		})
	}
}

impl<K: DeserializeBytes + Ord, V: DeserializeBytes> DeserializeBytes for BTreeMap<K, V> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let len = usize::deserialize(&mut read_buf)?;
		(0..len)
			.map(|_| Ok((K::deserialize(&mut read_buf)?, V::deserialize(&mut read_buf)?)))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use rand::{Rng, SeedableRng, rngs::StdRng};

	use super::*;

	fn round_trip<T: SerializeBytes + DeserializeBytes + PartialEq + std::fmt::Debug>(value: T) {
		let mut buf = Vec::new();
		value.serialize(&mut buf).unwrap();
		let decoded = T::deserialize(&mut buf.as_slice()).unwrap();
		assert_eq!(value, decoded);
	}

	#[test]
	fn test_uint_round_trips() {
		let mut rng = StdRng::seed_from_u64(0);
		round_trip(rng.gen::<u8>());
		round_trip(rng.gen::<u16>());
		round_trip(rng.gen::<u32>());
		round_trip(rng.gen::<u64>());
	}

	#[test]
	fn test_compound_round_trips() {
		round_trip(String::from("one wire"));
		round_trip(vec![3u64, 1, 4, 1, 5]);
		round_trip(Some(42u32));
		round_trip(Option::<u32>::None);
		round_trip((7usize, String::from("seven")));
	}

	#[test]
	fn test_btree_map_encoding_is_canonical() {
		let forward: BTreeMap<u32, String> =
			[(1, "a".into()), (2, "b".into()), (3, "c".into())].into();
		let backward: BTreeMap<u32, String> =
			[(3, "c".into()), (1, "a".into()), (2, "b".into())].into();

		let mut buf_forward = Vec::new();
		forward.serialize(&mut buf_forward).unwrap();
		let mut buf_backward = Vec::new();
		backward.serialize(&mut buf_backward).unwrap();

		assert_eq!(buf_forward, buf_backward);
		round_trip(forward);
	}

	#[test]
	fn test_usize_too_large() {
		if usize::BITS <= 32 {
			return;
		}
		let too_large = u32::MAX as usize + 1;
		let mut buf = Vec::new();
		let result = too_large.serialize(&mut buf);
		assert!(matches!(result, Err(SerializationError::UsizeTooLarge { .. })));
	}

	#[test]
	fn test_not_enough_bytes() {
		let buf = [1u8, 2];
		let result = u64::deserialize(&mut buf.as_slice());
		assert!(matches!(result, Err(SerializationError::NotEnoughBytes)));
	}
}
