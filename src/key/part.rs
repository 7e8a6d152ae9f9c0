//! Key parts
//!
//! A key part is one of exactly three kinds. The variant order is the type
//! precedence of the key order: every Boolean sorts before every Number, and
//! every Number before every String.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{KvError, Result};
use crate::value::Value;

/// A single component of a composite [`Key`](super::Key)
#[derive(Debug, Clone)]
pub enum KeyPart {
    Boolean(bool),
    /// Ordered by IEEE 754 total order: `-0.0 < +0.0`, NaN after `+inf`
    Number(f64),
    /// Ordered byte-lexicographically over UTF-8
    String(String),
}

impl KeyPart {
    /// Position of this part's kind in the type precedence
    fn rank(&self) -> u8 {
        match self {
            KeyPart::Boolean(_) => 0,
            KeyPart::Number(_) => 1,
            KeyPart::String(_) => 2,
        }
    }

    /// Name of the kind, for messages
    pub fn kind(&self) -> &'static str {
        match self {
            KeyPart::Boolean(_) => "boolean",
            KeyPart::Number(_) => "number",
            KeyPart::String(_) => "string",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KeyPart::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KeyPart::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyPart::String(s) => Some(s),
            _ => None,
        }
    }
}

// =============================================================================
// Ordering & Equality
// =============================================================================

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Boolean(a), KeyPart::Boolean(b)) => a.cmp(b),
            (KeyPart::Number(a), KeyPart::Number(b)) => a.total_cmp(b),
            (KeyPart::String(a), KeyPart::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

impl Hash for KeyPart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            KeyPart::Boolean(b) => b.hash(state),
            // total_cmp equality is bit equality
            KeyPart::Number(n) => n.to_bits().hash(state),
            KeyPart::String(s) => s.hash(state),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Boolean(b) => write!(f, "{}", b),
            KeyPart::Number(n) => write!(f, "{}", n),
            KeyPart::String(s) => write!(f, "{:?}", s),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Boolean(b)
    }
}

impl From<f64> for KeyPart {
    fn from(n: f64) -> Self {
        KeyPart::Number(n)
    }
}

impl From<f32> for KeyPart {
    fn from(n: f32) -> Self {
        KeyPart::Number(n as f64)
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for KeyPart {
                fn from(n: $t) -> Self {
                    KeyPart::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::String(s)
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::String(s.to_string())
    }
}

impl From<&String> for KeyPart {
    fn from(s: &String) -> Self {
        KeyPart::String(s.clone())
    }
}

/// Dynamic construction: only booleans, numbers and strings are key parts.
impl TryFrom<Value> for KeyPart {
    type Error = KvError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(KeyPart::Boolean(b)),
            Value::Integer(i) => Ok(KeyPart::Number(i as f64)),
            Value::Number(n) => Ok(KeyPart::Number(n)),
            Value::String(s) => Ok(KeyPart::String(s)),
            other => Err(KvError::InvalidKeyPart(format!(
                "{} cannot be used as a key part",
                other.kind()
            ))),
        }
    }
}

impl TryFrom<serde_json::Value> for KeyPart {
    type Error = KvError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        KeyPart::try_from(Value::from(value))
    }
}
