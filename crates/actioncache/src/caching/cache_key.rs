use std::fmt::{self, Write};
use std::sync::Arc;

use thiserror::Error;

use super::Payload;

/// The serialized form of an absent payload.
///
/// An explicit [`Payload::Null`] serializes as `null`, so it never collides with this.
pub const NO_PAYLOAD: &str = "undefined";

/// The payload could not be turned into a stable key because it contains itself.
///
/// This is not surfaced to callers: dispatches with such payloads are executed without caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("payload contains a reference cycle")]
pub struct Unrepresentable;

/// Identifies a cache slot by action name and serialized payload.
///
/// The action name is kept as its own field, so that partitioning keys by action never has to
/// re-parse the `"<action>:<payload>"` display form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    action: Arc<str>,
    payload: Arc<str>,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.payload)
    }
}

impl CacheKey {
    /// Derives the key for dispatching `action` with `payload`.
    ///
    /// Primitive payloads are coerced to their plain string form, everything else goes through
    /// a canonical JSON-style encoding. Structurally equal payloads always produce equal keys.
    ///
    /// # Errors
    ///
    /// Returns [`Unrepresentable`] if the payload transitively contains itself.
    pub fn generate(action: &str, payload: Option<&Payload>) -> Result<Self, Unrepresentable> {
        let payload = match payload {
            None => NO_PAYLOAD.to_owned(),
            Some(payload) => serialize(payload)?,
        };
        Ok(Self {
            action: action.into(),
            payload: payload.into(),
        })
    }

    /// The action component of this key.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The serialized payload component of this key.
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

fn serialize(payload: &Payload) -> Result<String, Unrepresentable> {
    match payload {
        Payload::Null => Ok("null".to_owned()),
        Payload::Bool(b) => Ok(b.to_string()),
        Payload::Number(n) => Ok(n.to_string()),
        Payload::String(s) => Ok(s.clone()),
        Payload::Array(_) | Payload::Object(_) | Payload::Shared(_) => {
            let mut encoder = Encoder::default();
            encoder.encode(payload)?;
            Ok(encoder.out)
        }
    }
}

/// A recursive structural encoder that detects reference cycles.
#[derive(Default)]
struct Encoder {
    out: String,
    /// Addresses of the shared nodes currently being encoded, from the root down.
    path: Vec<usize>,
}

impl Encoder {
    fn encode(&mut self, payload: &Payload) -> Result<(), Unrepresentable> {
        match payload {
            Payload::Null => self.out.push_str("null"),
            Payload::Bool(b) => write!(self.out, "{b}").map_err(|_| Unrepresentable)?,
            Payload::Number(n) => write!(self.out, "{n}").map_err(|_| Unrepresentable)?,
            Payload::String(s) => self.encode_str(s),
            Payload::Array(items) => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.encode(item)?;
                }
                self.out.push(']');
            }
            Payload::Object(map) => {
                self.out.push('{');
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.encode_str(key);
                    self.out.push(':');
                    self.encode(value)?;
                }
                self.out.push('}');
            }
            Payload::Shared(node) => {
                let addr = node.addr();
                // Only ancestors count: the same node reached twice on sibling branches is fine.
                if self.path.contains(&addr) {
                    return Err(Unrepresentable);
                }
                self.path.push(addr);
                let result = self.encode(&node.read());
                self.path.pop();
                result?;
            }
        }
        Ok(())
    }

    fn encode_str(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                c if (c as u32) < 0x20 => {
                    // Writing into a `String` never fails.
                    let _ = write!(self.out, "\\u{:04x}", c as u32);
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }
}
