//! # Runtime Value Model
//!
//! Checked callables receive and return [`Value`]s: a dynamically typed tree
//! covering scalars, collections, class instances, class objects, and
//! step-wise producers. The matcher inspects a value's shape at runtime and
//! compares it against a [`TypeDescriptor`](crate::TypeDescriptor).
//!
//! ## Ownership
//!
//! Class instances are shared through `Arc<Object>` so that callers keep
//! identity semantics (two handles to the same instance compare by pointer
//! in the memoization cache) and so that non-owning `Weak` back-references
//! can observe when an instance is dropped.
//!
//! Producers ([`Producer`]) are consumed, not inspected. Cloning a producer
//! clones the handle; both clones drain the same underlying sequence.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::TypeCheckError;

// ---------------------------------------------------------------------------
// MethodSig
// ---------------------------------------------------------------------------

/// Call shape of a method exposed by an [`Object`], excluding the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSig {
    /// Number of parameters without defaults.
    pub required: usize,
    /// Number of parameters with defaults.
    #[serde(default)]
    pub optional: usize,
    /// Whether the method also takes a variable number of positionals.
    #[serde(default)]
    pub variadic: bool,
}

impl MethodSig {
    /// A method taking exactly `required` arguments.
    pub fn new(required: usize) -> Self {
        Self {
            required,
            optional: 0,
            variadic: false,
        }
    }

    /// Add `optional` defaulted parameters.
    pub fn with_optional(mut self, optional: usize) -> Self {
        self.optional = optional;
        self
    }

    /// Mark the method as accepting extra positionals.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Whether a call with `count` positional arguments is accepted.
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.required && (self.variadic || count <= self.required + self.optional)
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.optional, self.variadic) {
            (0, false) => write!(f, "{}", self.required),
            (opt, false) => write!(f, "{}..{}", self.required, self.required + opt),
            (_, true) => write!(f, "{} or more", self.required),
        }
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

/// An instance of a user-defined class.
///
/// Carries the class name, the names of its base classes (for
/// `isinstance`-style checks), its attribute table, and the call shapes of
/// its methods (for structural protocol checks).
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    class: String,
    bases: Vec<String>,
    attributes: BTreeMap<String, Value>,
    methods: BTreeMap<String, MethodSig>,
}

impl Object {
    /// Create an instance of `class` with no members.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            bases: Vec::new(),
            attributes: BTreeMap::new(),
            methods: BTreeMap::new(),
        }
    }

    /// Declare a base class.
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    /// Set an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Declare a method and its call shape.
    pub fn with_method(mut self, name: impl Into<String>, sig: MethodSig) -> Self {
        self.methods.insert(name.into(), sig);
        self
    }

    /// The instance's class name.
    pub fn class_name(&self) -> &str {
        &self.class
    }

    /// Declared base class names.
    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    /// `isinstance`-equivalent check against a class name.
    pub fn is_instance_of(&self, class: &str) -> bool {
        self.class == class || self.bases.iter().any(|b| b == class)
    }

    /// Look up an attribute.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Look up a method's call shape.
    pub fn method(&self, name: &str) -> Option<MethodSig> {
        self.methods.get(name).copied()
    }

    /// Whether the instance exposes `name` as either an attribute or a method.
    pub fn has_member(&self, name: &str) -> bool {
        self.attributes.contains_key(name) || self.methods.contains_key(name)
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

/// Item yielded by a [`Producer`]. Validating producers yield `Err` at the
/// first element that violates the declared element type.
pub type ProducerItem = Result<Value, TypeCheckError>;

type BoxedIter = Box<dyn Iterator<Item = ProducerItem> + Send>;

/// A step-wise producer of values (a generator).
#[derive(Clone)]
pub struct Producer {
    inner: Arc<Mutex<BoxedIter>>,
}

impl Producer {
    /// Wrap an iterator of plain values.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self::from_items(values.into_iter().map(Ok))
    }

    /// Wrap an iterator of already-fallible items.
    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = ProducerItem>,
        I::IntoIter: Send + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Box::new(items.into_iter()))),
        }
    }

    /// Adapt every produced item through `f`, consuming this handle.
    ///
    /// The resulting producer pulls from the same underlying sequence.
    pub fn map_items<F>(self, mut f: F) -> Self
    where
        F: FnMut(usize, ProducerItem) -> ProducerItem + Send + 'static,
    {
        let mut index = 0usize;
        let mut source = self;
        Self::from_items(std::iter::from_fn(move || {
            let item = source.next()?;
            let out = f(index, item);
            index += 1;
            Some(out)
        }))
    }

    /// Drain the producer, stopping at the first error.
    pub fn collect_values(self) -> Result<Vec<Value>, TypeCheckError> {
        self.collect()
    }

    /// Whether two handles share one underlying sequence.
    pub fn same_source(&self, other: &Producer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Iterator for Producer {
    type Item = ProducerItem;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.lock().next()
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Producer(..)")
    }
}

impl PartialEq for Producer {
    fn eq(&self, other: &Self) -> bool {
        self.same_source(other)
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A dynamically typed runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The absent value.
    None,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A double-precision float.
    Float(f64),
    /// A UTF-8 string.
    Str(String),
    /// A byte string.
    Bytes(Vec<u8>),
    /// A mutable ordered sequence.
    List(Vec<Value>),
    /// An immutable ordered sequence.
    Tuple(Vec<Value>),
    /// An unordered collection of distinct values.
    Set(Vec<Value>),
    /// An insertion-ordered mapping.
    Map(Vec<(Value, Value)>),
    /// An instance of a user-defined class.
    Object(Arc<Object>),
    /// A class object (the receiver of class-scoped methods).
    Type(String),
    /// A step-wise producer.
    Iter(Producer),
}

impl Value {
    /// Runtime type name used in diagnostics (`int`, `str`, `NoneType`,
    /// or the class name of an object).
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Map(_) => "dict",
            Value::Object(obj) => obj.class_name(),
            Value::Type(_) => "type",
            Value::Iter(_) => "generator",
        }
    }

    /// Build an object value.
    pub fn object(obj: Object) -> Self {
        Value::Object(Arc::new(obj))
    }

    /// Build a mapping from string-keyed pairs.
    pub fn map<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (Value::Str(k.into()), v.into()))
                .collect(),
        )
    }

    /// Build a list from anything convertible to values.
    pub fn list<V: Into<Value>, I: IntoIterator<Item = V>>(items: I) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a producer value from plain values.
    pub fn producer<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Value::Iter(Producer::from_values(values))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Object>> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Look up a string key in a mapping value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Elements of a materialized sequence or set, if this is one.
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
            f.write_str(open)?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str(close)
        }

        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "'{s}'"),
            Value::Bytes(b) => write!(f, "b'{}'", String::from_utf8_lossy(b)),
            Value::List(items) => seq(f, "[", items, "]"),
            Value::Tuple(items) => seq(f, "(", items, ")"),
            Value::Set(items) => seq(f, "{", items, "}"),
            Value::Map(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Object(obj) => write!(f, "<{} object>", obj.class_name()),
            Value::Type(name) => write!(f, "<class '{name}'>"),
            Value::Iter(_) => f.write_str("<generator>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::object(obj)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

/// JSON documents map onto the value model directly: objects become
/// string-keyed mappings and numbers keep their integer/float distinction.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_follow_runtime_shape() {
        assert_eq!(Value::None.type_name(), "NoneType");
        assert_eq!(Value::from(3).type_name(), "int");
        assert_eq!(Value::from("x").type_name(), "str");
        assert_eq!(Value::map([("a", 1)]).type_name(), "dict");
        let obj = Value::object(Object::new("Resource"));
        assert_eq!(obj.type_name(), "Resource");
    }

    #[test]
    fn object_instance_check_includes_bases() {
        let obj = Object::new("PositiveInt").with_base("int");
        assert!(obj.is_instance_of("PositiveInt"));
        assert!(obj.is_instance_of("int"));
        assert!(!obj.is_instance_of("str"));
    }

    #[test]
    fn method_sig_accepts_defaults_and_varargs() {
        let sig = MethodSig::new(1).with_optional(2);
        assert!(!sig.accepts(0));
        assert!(sig.accepts(1));
        assert!(sig.accepts(3));
        assert!(!sig.accepts(4));
        assert!(MethodSig::new(0).variadic().accepts(10));
    }

    #[test]
    fn producer_handles_share_one_sequence() {
        let mut a = Producer::from_values(vec![Value::Int(1), Value::Int(2)]);
        let mut b = a.clone();
        assert_eq!(a.next(), Some(Ok(Value::Int(1))));
        assert_eq!(b.next(), Some(Ok(Value::Int(2))));
        assert!(a.next().is_none());
        assert!(a.same_source(&b));
    }

    #[test]
    fn map_items_sees_indices_in_order() {
        let p = Producer::from_values(vec![Value::from("a"), Value::from("b")]);
        let seen = p
            .map_items(|i, item| item.map(|v| Value::Str(format!("{i}:{v}"))))
            .collect_values()
            .unwrap();
        assert_eq!(seen, vec![Value::from("0:'a'"), Value::from("1:'b'")]);
    }

    #[test]
    fn json_conversion_keeps_number_kinds() {
        let v = Value::from(serde_json::json!({"name": "Alice", "age": 30, "score": 1.5}));
        assert_eq!(v.get("name"), Some(&Value::from("Alice")));
        assert_eq!(v.get("age"), Some(&Value::Int(30)));
        assert_eq!(v.get("score"), Some(&Value::Float(1.5)));
        assert!(v.get("missing").is_none());
    }

    #[test]
    fn display_renders_nested_values() {
        let v = Value::list(vec![Value::Int(1), Value::from("x"), Value::None]);
        assert_eq!(v.to_string(), "[1, 'x', None]");
    }
}
