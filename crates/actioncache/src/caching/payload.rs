use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use serde::Serialize;
use serde_json::{Number, Value};

/// The input value passed to an action.
///
/// Payloads are plain JSON-like trees, with one addition: a [`SharedPayload`] node is a reference
/// to a value that may be referenced from several places at once. Since a shared node can be
/// mutated after it was placed into a tree, payloads are able to contain themselves, which makes
/// them impossible to key (see [`CacheKey::generate`](super::CacheKey::generate)).
#[derive(Clone, Debug, Default)]
pub enum Payload {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Payload>),
    /// An object. Keys are kept sorted, so that structurally equal objects always serialize the
    /// same way.
    Object(BTreeMap<String, Payload>),
    Shared(SharedPayload),
}

impl Payload {
    /// Converts any serializable value into a payload.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::from)
    }

    /// Creates an empty object payload.
    pub fn object() -> Self {
        Self::Object(BTreeMap::new())
    }

    /// Inserts a field into an object payload, turning any other payload into an object first.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Payload>) -> Self {
        if !matches!(self, Self::Object(_)) {
            self = Self::object();
        }
        if let Self::Object(ref mut map) = self {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Whether this is a primitive, which is coerced to a plain string when keying.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Array(_) | Self::Object(_) | Self::Shared(_))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for Payload {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<i32> for Payload {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

/// Non-finite floats have no JSON representation and become [`Payload::Null`].
impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Payload>> for Payload {
    fn from(items: Vec<Payload>) -> Self {
        Self::Array(items)
    }
}

impl From<BTreeMap<String, Payload>> for Payload {
    fn from(map: BTreeMap<String, Payload>) -> Self {
        Self::Object(map)
    }
}

impl From<SharedPayload> for Payload {
    fn from(node: SharedPayload) -> Self {
        Self::Shared(node)
    }
}

/// A reference-counted, mutable payload node.
///
/// Cloning a `SharedPayload` clones the reference, not the value.
#[derive(Clone, Default)]
pub struct SharedPayload(Arc<RwLock<Payload>>);

impl SharedPayload {
    pub fn new(value: impl Into<Payload>) -> Self {
        Self(Arc::new(RwLock::new(value.into())))
    }

    /// Replaces the referenced value.
    pub fn set(&self, value: impl Into<Payload>) {
        *self.0.write() = value.into();
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Payload> {
        self.0.read()
    }

    /// An address identifying the referenced value, stable for as long as the node is alive.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// Whether both handles refer to the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// Not derived: printing the referenced value would recurse forever on cycles.
impl fmt::Debug for SharedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedPayload")
            .field(&format_args!("{:#x}", self.addr()))
            .finish()
    }
}
