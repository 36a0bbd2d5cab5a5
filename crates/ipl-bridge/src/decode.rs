use std::cell::RefCell;

use wasmtime::AsContext;

use crate::error::BridgeError;
use crate::ops::GuestOps;
use crate::registry::CallbackRegistry;
use crate::tag::Tag;
use crate::value::{Function, IplValue, PtrLen, Value};

const INT_BITS: u32 = 124;

fn sign_extend_124(detail: u128) -> i128 {
    let sign_bit = 1u128 << (INT_BITS - 1);
    if detail & sign_bit != 0 {
        (detail as i128) - (1i128 << INT_BITS)
    } else {
        detail as i128
    }
}

/// Decodes an [`IplValue`] back into a host [`Value`] (spec §4.4).
///
/// `store` should be passed as a reference (e.g. `&store`) so it can be
/// reused across the recursive calls array decoding makes.
pub fn decode_value<S: AsContext + Copy>(
    value: IplValue,
    ops: &GuestOps,
    store: S,
    registry: &RefCell<CallbackRegistry>,
    max_array_len: u32,
) -> Result<Value, BridgeError> {
    match value.tag()? {
        Tag::Void => Ok(Value::Void),
        Tag::Bool => Ok(Value::Bool(value.detail() & 1 == 1)),
        Tag::Int => Ok(Value::Int(sign_extend_124(value.detail()))),
        Tag::Uint => Ok(Value::Uint(value.detail())),
        Tag::Float => Ok(Value::Float(f64::from_bits(value.detail() as u64))),
        Tag::Bytes => Ok(Value::Bytes(read_bytes_like(value, ops, store)?)),
        Tag::String => {
            let bytes = read_bytes_like(value, ops, store)?;
            String::from_utf8(bytes)
                .map(Value::String)
                .map_err(|e| BridgeError::UnsupportedType(e.to_string()))
        }
        Tag::Json => {
            let bytes = read_bytes_like(value, ops, store)?;
            let text =
                String::from_utf8(bytes).map_err(|e| BridgeError::UnsupportedType(e.to_string()))?;
            Ok(Value::Json(serde_json::from_str(&text)?))
        }
        Tag::Function => {
            let detail = value.detail();
            let ptr = detail as u32;
            let origin_is_host = (detail >> 32) & 1 == 1;
            if origin_is_host {
                let callback = registry.borrow().get(ptr).ok_or(BridgeError::UnknownCallback(ptr))?;
                Ok(Value::Function(Function::Host(callback)))
            } else {
                Ok(Value::Function(Function::Guest(ptr)))
            }
        }
        Tag::Array => decode_array(value, ops, store, registry, max_array_len),
    }
}

fn read_bytes_like<S: AsContext>(value: IplValue, ops: &GuestOps, store: S) -> Result<Vec<u8>, BridgeError> {
    let pl = PtrLen::from_detail(value.detail());
    if pl.len == 0 {
        return Ok(Vec::new());
    }
    crate::memory::read_bytes(&ops.memory, store, pl.ptr, pl.len)
}

fn decode_array<S: AsContext + Copy>(
    value: IplValue,
    ops: &GuestOps,
    store: S,
    registry: &RefCell<CallbackRegistry>,
    max_array_len: u32,
) -> Result<Value, BridgeError> {
    let pl = PtrLen::from_detail(value.detail());
    if pl.len == 0 {
        return Ok(Value::Array(Vec::new()));
    }
    if pl.len > max_array_len {
        return Err(BridgeError::MemoryFault {
            ptr: pl.ptr,
            len: pl.len,
            memory_size: ops.memory.data_size(store),
        });
    }
    let mut items = Vec::with_capacity(pl.len as usize);
    for i in 0..pl.len {
        let slot_ptr = pl.ptr + i * 16;
        let slot = crate::memory::read_bytes(&ops.memory, store, slot_ptr, 16)?;
        let lo = u64::from_le_bytes(slot[0..8].try_into().unwrap());
        let hi = u64::from_le_bytes(slot[8..16].try_into().unwrap());
        let element = IplValue::from_halves(lo, hi);
        items.push(decode_value(element, ops, store, registry, max_array_len)?);
    }
    Ok(Value::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extends_negative_values() {
        let all_ones_124 = (1u128 << INT_BITS) - 1;
        assert_eq!(sign_extend_124(all_ones_124), -1);
        assert_eq!(sign_extend_124(0), 0);
    }
}
