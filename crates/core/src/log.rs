//! Deferred circuit logs and compile-front-end metadata.

use bytes::{Buf, BufMut};
use fieldline_utils::{DeserializeBytes, SerializationError, SerializeBytes};

use crate::term::{Term, Visibility};

/// A log statement recorded by the circuit front-end, resolved against the
/// solution once solving finishes.
///
/// `format` contains one `{}` placeholder per resolved argument. Arguments
/// come from `to_resolve`; a group of terms bracketed by [`Term::DELIMITER`]
/// evaluates as a single field sum.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogEntry {
	pub format: String,
	pub to_resolve: Vec<Term>,
	/// Source location that produced the entry.
	pub caller: String,
}

impl SerializeBytes for LogEntry {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.format.serialize(&mut write_buf)?;
		self.to_resolve.serialize(&mut write_buf)?;
		self.caller.serialize(write_buf)
	}
}

impl DeserializeBytes for LogEntry {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let format = String::deserialize(&mut read_buf)?;
		let to_resolve = Vec::<Term>::deserialize(&mut read_buf)?;
		let caller = String::deserialize(read_buf)?;
		Ok(LogEntry {
			format,
			to_resolve,
			caller,
		})
	}
}

/// Replaces each `{}` in `format` with the next entry of `args`. Surplus
/// placeholders are left in place.
pub(crate) fn format_log(format: &str, args: &[String]) -> String {
	let mut out = String::with_capacity(format.len());
	let mut args = args.iter();
	let mut rest = format;
	while let Some(pos) = rest.find("{}") {
		out.push_str(&rest[..pos]);
		match args.next() {
			Some(arg) => out.push_str(arg),
			None => out.push_str("{}"),
		}
		rest = &rest[pos + 2..];
	}
	out.push_str(rest);
	out
}

/// Flattened layout of the circuit's input struct: one leaf per declared
/// variable, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schema {
	pub leaves: Vec<SchemaLeaf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaLeaf {
	pub full_name: String,
	pub visibility: Visibility,
}

impl SerializeBytes for Schema {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.leaves.serialize(write_buf)
	}
}

impl DeserializeBytes for Schema {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		Ok(Schema {
			leaves: Vec::<SchemaLeaf>::deserialize(read_buf)?,
		})
	}
}

impl SerializeBytes for SchemaLeaf {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.full_name.serialize(&mut write_buf)?;
		self.visibility.serialize(write_buf)
	}
}

impl DeserializeBytes for SchemaLeaf {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let full_name = String::deserialize(&mut read_buf)?;
		let visibility = Visibility::deserialize(read_buf)?;
		Ok(SchemaLeaf {
			full_name,
			visibility,
		})
	}
}

/// Compile-time measurement between two named checkpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Counter {
	pub from: String,
	pub to: String,
	pub nb_variables: usize,
	pub nb_constraints: usize,
}

impl SerializeBytes for Counter {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.from.serialize(&mut write_buf)?;
		self.to.serialize(&mut write_buf)?;
		self.nb_variables.serialize(&mut write_buf)?;
		self.nb_constraints.serialize(write_buf)
	}
}

impl DeserializeBytes for Counter {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let from = String::deserialize(&mut read_buf)?;
		let to = String::deserialize(&mut read_buf)?;
		let nb_variables = usize::deserialize(&mut read_buf)?;
		let nb_constraints = usize::deserialize(read_buf)?;
		Ok(Counter {
			from,
			to,
			nb_variables,
			nb_constraints,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_format_log() {
		let args = vec!["3".to_string(), "9".to_string()];
		assert_eq!(format_log("{} squared is {}", &args), "3 squared is 9");
		assert_eq!(format_log("no placeholders", &args), "no placeholders");
		assert_eq!(format_log("{} and {} and {}", &args), "3 and 9 and {}");
	}
}
