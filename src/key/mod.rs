//! Key Module
//!
//! Typed composite keys and their order-preserving native encoding.
//!
//! ## Responsibilities
//! - Composite keys built from Boolean, Number and String parts
//! - Total order: type precedence first, then value
//! - Bidirectional mapping to the store's native byte keys
//!
//! ## Key Order
//! ```text
//! false < true < -inf < ... < -0.0 < 0.0 < ... < +inf < NaN < "" < "a" < "b"
//! ```
//! Keys compare part by part; a key that is a part-prefix of another sorts
//! first (`["users"] < ["users", 1]`).

mod codec;
mod part;

use std::fmt;

pub use codec::{decode, encode, NativeKey};
pub use part::KeyPart;

pub(crate) use codec::prefix_end;

use crate::config::Config;
use crate::error::{KvError, Result};

/// Build a [`Key`] from a list of part literals
///
/// ```
/// use tuplekv::key;
///
/// let k = key!["users", 42, true];
/// assert_eq!(k.len(), 3);
/// ```
#[macro_export]
macro_rules! key {
    () => {
        $crate::Key::root()
    };
    ($($part:expr),+ $(,)?) => {
        $crate::Key::from(vec![$($crate::KeyPart::from($part)),+])
    };
}

/// An ordered sequence of key parts
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(Vec<KeyPart>);

impl Key {
    /// The empty key; only meaningful as the root of a scan
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// A time-ordered unique string part (UUIDv7), for fresh record ids
    pub fn id() -> KeyPart {
        KeyPart::String(uuid::Uuid::now_v7().to_string())
    }

    /// Build a key from dynamically-typed values, rejecting unsupported kinds
    pub fn try_from_values<I, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        KeyPart: TryFrom<V, Error = KvError>,
    {
        values
            .into_iter()
            .map(KeyPart::try_from)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&KeyPart> {
        self.0.last()
    }

    pub fn push(&mut self, part: impl Into<KeyPart>) {
        self.0.push(part.into());
    }

    /// Return a copy of this key extended by one part
    pub fn with(&self, part: impl Into<KeyPart>) -> Self {
        let mut key = self.clone();
        key.push(part);
        key
    }

    /// The key without its last part, or `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Whether `prefix` is a part-wise prefix of this key
    pub fn starts_with(&self, prefix: &Key) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn encode(&self) -> NativeKey {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }

    pub fn into_parts(self) -> Vec<KeyPart> {
        self.0
    }
}

/// Encode a key addressed by a point operation or mutation.
///
/// The root key names no record, and the encoded form must fit the
/// configured key size limit.
pub(crate) fn encode_record_key(key: &Key, config: &Config) -> Result<NativeKey> {
    if key.is_empty() {
        return Err(KvError::InvalidKey(
            "the empty key can only be used as a scan prefix".to_string(),
        ));
    }

    let native = encode(key);
    config.check_key_size(&native)?;
    Ok(native)
}

impl From<Vec<KeyPart>> for Key {
    fn from(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }
}

impl FromIterator<KeyPart> for Key {
    fn from_iter<I: IntoIterator<Item = KeyPart>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, "]")
    }
}
