use std::sync::Arc;

use crate::error::BridgeError;
use crate::registry::HostCallback;
use crate::tag::Tag;

/// Bit width of the `detail` payload (spec §3).
pub const DETAIL_BITS: u32 = 128 - Tag::BITS;

fn detail_mask() -> u128 {
    (1u128 << DETAIL_BITS) - 1
}

/// The 128-bit tagged interchange value, as it exists on the wire.
///
/// Crosses the call boundary as two `u64` halves, `(low, high)`, in that
/// order (spec §3 "Wire transport across the call boundary").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IplValue(u128);

impl IplValue {
    /// Packs a tag and an already-masked detail payload. `detail` is
    /// truncated to [`DETAIL_BITS`] bits; callers that rely on truncation
    /// are a caller error per spec §4.1.
    pub fn new(tag: Tag, detail: u128) -> Self {
        IplValue((detail & detail_mask()) << Tag::BITS | tag.as_u128())
    }

    pub fn tag(self) -> Result<Tag, BridgeError> {
        Tag::from_u128(self.0 & ((1u128 << Tag::BITS) - 1))
    }

    pub fn detail(self) -> u128 {
        self.0 >> Tag::BITS
    }

    pub fn to_halves(self) -> (u64, u64) {
        (self.0 as u64, (self.0 >> 64) as u64)
    }

    pub fn from_halves(low: u64, high: u64) -> Self {
        IplValue(u128::from(low) | (u128::from(high) << 64))
    }

    pub const VOID: IplValue = IplValue(Tag::Void as u128);
}

/// A `(ptr, len)` pair shared by the `bytes`, `string`, `json`, and `array`
/// detail layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtrLen {
    pub ptr: u32,
    pub len: u32,
}

impl PtrLen {
    pub fn from_detail(detail: u128) -> Self {
        PtrLen {
            ptr: detail as u32,
            len: (detail >> 32) as u32,
        }
    }

    pub fn to_detail(self) -> u128 {
        u128::from(self.ptr) | (u128::from(self.len) << 32)
    }
}

/// Which side of the boundary owns a `function` IPL value's referent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Guest,
    Host,
}

impl Origin {
    pub fn as_name(self) -> &'static str {
        match self {
            Origin::Guest => "guest",
            Origin::Host => "host",
        }
    }
}

/// A decoded or not-yet-encoded callable reference (spec §3 `function`).
#[derive(Clone)]
pub enum Function {
    /// A function living in the guest, identified by the address in linear
    /// memory of its trampoline. Re-encoding this reproduces the original
    /// bits unchanged (spec §4.3).
    Guest(u32),
    /// A callback supplied by the host. Encoding this registers it in the
    /// callback registry under a fresh key.
    Host(Arc<HostCallback>),
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Function::Guest(ptr) => f.debug_tuple("Function::Guest").field(ptr).finish(),
            Function::Host(_) => f.write_str("Function::Host(..)"),
        }
    }
}

/// A host-side value: the high-level representation an embedder works with,
/// one variant per IPL tag (spec §3 / §4.2).
#[derive(Debug, Clone)]
pub enum Value {
    Void,
    Bool(bool),
    /// Signed 124-bit integer, representable in `i128`.
    Int(i128),
    /// Unsigned 124-bit integer, representable in `u128`.
    Uint(u128),
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    Json(serde_json::Value),
    Function(Function),
    Array(Vec<Value>),
}

impl Value {
    /// The tag this value will be encoded with.
    pub fn tag(&self) -> Tag {
        match self {
            Value::Void => Tag::Void,
            Value::Bool(_) => Tag::Bool,
            Value::Int(_) => Tag::Int,
            Value::Uint(_) => Tag::Uint,
            Value::Float(_) => Tag::Float,
            Value::Bytes(_) => Tag::Bytes,
            Value::String(_) => Tag::String,
            Value::Json(_) => Tag::Json,
            Value::Function(_) => Tag::Function,
            Value::Array(_) => Tag::Array,
        }
    }

    /// Implements the host-value type inference table of spec §4.2 for
    /// dynamically-shaped data, such as values arriving as JSON from a
    /// scripting caller. Rust call sites that already know their variant
    /// should construct a `Value` directly instead.
    pub fn infer_from_json(v: serde_json::Value) -> Result<Value, BridgeError> {
        use serde_json::Value as J;
        Ok(match v {
            J::Null => Value::Void,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Value::Uint(u128::from(u))
                } else if let Some(i) = n.as_i64() {
                    if i < 0 {
                        Value::Int(i128::from(i))
                    } else {
                        Value::Uint(u128::try_from(i).unwrap())
                    }
                } else {
                    Value::Float(n.as_f64().ok_or_else(|| {
                        BridgeError::UnsupportedType("number out of f64 range".into())
                    })?)
                }
            }
            J::String(s) => Value::String(s),
            J::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::infer_from_json)
                    .collect::<Result<_, _>>()?,
            ),
            obj @ J::Object(_) => Value::Json(obj),
        })
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_array_has_zero_detail_by_construction() {
        let v = IplValue::new(Tag::Array, 0);
        assert_eq!(v.detail(), 0);
        assert_eq!(v.tag().unwrap(), Tag::Array);
    }

    #[test]
    fn halves_round_trip() {
        let v = IplValue::new(Tag::Uint, 0x1234_5678_9abc_def0);
        let (lo, hi) = v.to_halves();
        assert_eq!(IplValue::from_halves(lo, hi), v);
    }

    #[test]
    fn ptr_len_round_trips_through_detail() {
        let pl = PtrLen { ptr: 0xdead_beef, len: 42 };
        assert_eq!(PtrLen::from_detail(pl.to_detail()), pl);
    }

    #[test]
    fn infers_uint_for_zero_and_int_for_negative() {
        assert!(matches!(
            Value::infer_from_json(serde_json::json!(0)).unwrap(),
            Value::Uint(0)
        ));
        assert!(matches!(
            Value::infer_from_json(serde_json::json!(-5)).unwrap(),
            Value::Int(-5)
        ));
    }
}
