//! Record capability trait
//!
//! A record is any caller-defined type that can name its primary key and
//! round-trip through bytes. The default codec is `bincode` over the
//! type's serde implementation.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// A typed item stored in a collection
///
/// The primary key must be unique within the collection and must not change
/// across updates of the same logical record.
///
/// # Example
///
/// ```
/// use relaydb_core::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Person {
///     name: String,
///     age: u32,
/// }
///
/// impl Record for Person {
///     fn primary_key(&self) -> Vec<u8> {
///         self.name.as_bytes().to_vec()
///     }
/// }
///
/// let person = Person { name: "foo".into(), age: 42 };
/// let bytes = person.encode().unwrap();
/// assert_eq!(Person::decode(&bytes).unwrap(), person);
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique, immutable primary key
    fn primary_key(&self) -> Vec<u8>;

    /// Serialize the record into its row bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the record cannot be encoded.
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a record from row bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the bytes are not a valid record.
    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
