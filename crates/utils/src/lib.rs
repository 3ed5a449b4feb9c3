pub mod serialization;

pub use serialization::{DeserializeBytes, SerializationError, SerializeBytes};
