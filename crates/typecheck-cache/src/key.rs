//! # Cache Keys
//!
//! A [`CacheKey`] is the structural fingerprint of an argument list.
//! Plain data is compared by value; objects are compared by identity and
//! held only through [`Weak`] references, so a cached entry never keeps an
//! argument alive.
//!
//! Keying rules:
//!
//! - `Int(1)` and `Float(1.0)` are different keys. Floats are keyed by bit
//!   pattern, so `NaN` equals itself and `0.0` differs from `-0.0`.
//! - Sets are keyed independently of element order.
//! - Objects are keyed by allocation. Two equal-looking objects are two keys.
//! - Producers cannot be keyed.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use typecheck_core::{Object, Value};

use crate::error::CacheError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Shape {
    List,
    Tuple,
    Set,
    Map,
}

/// One token of the flattened argument encoding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Part {
    None,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    Bytes(Vec<u8>),
    Open(Shape, usize),
    Object(usize),
    Type(String),
}

/// Hashable identity of a call's arguments.
///
/// Equality and hashing consider the encoded parts only; the weak
/// referents ride along so the cache can tell when an entry went stale.
#[derive(Debug, Clone)]
pub struct CacheKey {
    parts: Vec<Part>,
    referents: Vec<Weak<Object>>,
}

impl CacheKey {
    /// Encode an argument list.
    pub fn from_args(args: &[Value]) -> Result<Self, CacheError> {
        let mut key = CacheKey {
            parts: Vec::with_capacity(args.len()),
            referents: Vec::new(),
        };
        for (index, arg) in args.iter().enumerate() {
            key.encode(arg).map_err(|type_name| CacheError::Unhashable {
                index,
                type_name,
            })?;
        }
        Ok(key)
    }

    /// Whether every object the key refers to is still alive.
    pub fn is_live(&self) -> bool {
        self.referents.iter().all(|r| r.strong_count() > 0)
    }

    pub(crate) fn referents(&self) -> &[Weak<Object>] {
        &self.referents
    }

    /// Number of object arguments the key refers to.
    pub fn referent_count(&self) -> usize {
        self.referents.len()
    }

    fn encode(&mut self, value: &Value) -> Result<(), String> {
        match value {
            Value::None => self.parts.push(Part::None),
            Value::Bool(b) => self.parts.push(Part::Bool(*b)),
            Value::Int(n) => self.parts.push(Part::Int(*n)),
            Value::Float(x) => self.parts.push(Part::Float(x.to_bits())),
            Value::Str(s) => self.parts.push(Part::Str(s.clone())),
            Value::Bytes(b) => self.parts.push(Part::Bytes(b.clone())),
            Value::Type(name) => self.parts.push(Part::Type(name.clone())),
            Value::Object(obj) => {
                self.parts.push(Part::Object(Arc::as_ptr(obj) as usize));
                self.referents.push(Arc::downgrade(obj));
            }
            Value::List(items) => self.encode_seq(Shape::List, items)?,
            Value::Tuple(items) => self.encode_seq(Shape::Tuple, items)?,
            Value::Set(items) => {
                // Encode each element on its own, then order the encodings.
                let mut encoded = Vec::with_capacity(items.len());
                for item in items {
                    let mut sub = CacheKey {
                        parts: Vec::new(),
                        referents: Vec::new(),
                    };
                    sub.encode(item)?;
                    encoded.push(sub);
                }
                encoded.sort_by(|a, b| a.parts.cmp(&b.parts));
                self.parts.push(Part::Open(Shape::Set, items.len()));
                for sub in encoded {
                    self.parts.extend(sub.parts);
                    self.referents.extend(sub.referents);
                }
            }
            Value::Map(pairs) => {
                self.parts.push(Part::Open(Shape::Map, pairs.len()));
                for (k, v) in pairs {
                    self.encode(k)?;
                    self.encode(v)?;
                }
            }
            Value::Iter(_) => return Err(value.type_name().to_string()),
        }
        Ok(())
    }

    fn encode_seq(&mut self, shape: Shape, items: &[Value]) -> Result<(), String> {
        self.parts.push(Part::Open(shape, items.len()));
        items.iter().try_for_each(|item| self.encode(item))
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}
