use std::cell::RefCell;

use wasmtime::AsContextMut;

use crate::error::BridgeError;
use crate::free::free_value;
use crate::ops::GuestOps;
use crate::registry::CallbackRegistry;
use crate::tag::Tag;
use crate::value::{Function, IplValue, PtrLen, Value};

/// Encodes a host [`Value`] into an [`IplValue`], allocating in the guest's
/// linear memory as needed (spec §4.3).
pub fn encode_value(
    value: &Value,
    ops: &GuestOps,
    mut store: impl AsContextMut,
    registry: &RefCell<CallbackRegistry>,
) -> Result<IplValue, BridgeError> {
    match value {
        Value::Void => Ok(IplValue::VOID),
        Value::Bool(b) => Ok(IplValue::new(Tag::Bool, u128::from(*b))),
        Value::Int(i) => Ok(IplValue::new(Tag::Int, *i as u128)),
        Value::Uint(u) => Ok(IplValue::new(Tag::Uint, *u)),
        Value::Float(f) => Ok(IplValue::new(Tag::Float, u128::from(f.to_bits()))),
        Value::Bytes(bytes) => encode_bytes_like(Tag::Bytes, bytes, ops, store),
        Value::String(s) => encode_bytes_like(Tag::String, s.as_bytes(), ops, store),
        Value::Json(json) => {
            let encoded = serde_json::to_vec(json)?;
            encode_bytes_like(Tag::Json, &encoded, ops, store)
        }
        Value::Function(Function::Guest(ptr)) => Ok(IplValue::new(Tag::Function, u128::from(*ptr))),
        Value::Function(Function::Host(callback)) => {
            let key = registry.borrow_mut().register(callback.clone());
            let detail = u128::from(key) | (1u128 << 32);
            Ok(IplValue::new(Tag::Function, detail))
        }
        Value::Array(items) => encode_array(items, ops, store.as_context_mut(), registry),
    }
}

fn encode_bytes_like(
    tag: Tag,
    bytes: &[u8],
    ops: &GuestOps,
    mut store: impl AsContextMut,
) -> Result<IplValue, BridgeError> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| BridgeError::UnsupportedType("buffer exceeds 32-bit linear memory addressing".into()))?;
    let ptr = ops.alloc_fn.call(store.as_context_mut(), len)?;
    if ptr == 0 && len > 0 {
        return Err(BridgeError::AllocationFailure { len });
    }
    crate::memory::write_bytes(&ops.memory, store.as_context_mut(), ptr, bytes)?;
    Ok(IplValue::new(tag, PtrLen { ptr, len }.to_detail()))
}

/// Lays out `items` contiguously in linear memory as `16*len` bytes,
/// recursively encoding each element (spec §4.3 `array`). An empty array
/// is encoded with `detail = 0` and no allocation (spec §3).
///
/// Encoding is transactional: if an element fails to encode, every element
/// already written and the array's own buffer are freed before the error
/// propagates (spec §7).
fn encode_array(
    items: &[Value],
    ops: &GuestOps,
    mut store: impl AsContextMut,
    registry: &RefCell<CallbackRegistry>,
) -> Result<IplValue, BridgeError> {
    if items.is_empty() {
        return Ok(IplValue::new(Tag::Array, 0));
    }
    let len = u32::try_from(items.len())
        .map_err(|_| BridgeError::UnsupportedType("array exceeds 32-bit element count".into()))?;
    let byte_len = len
        .checked_mul(16)
        .ok_or_else(|| BridgeError::UnsupportedType("array byte length overflows u32".into()))?;
    let ptr = ops.alloc_fn.call(store.as_context_mut(), byte_len)?;
    if ptr == 0 {
        return Err(BridgeError::AllocationFailure { len: byte_len });
    }

    let mut encoded_so_far = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match encode_value(item, ops, store.as_context_mut(), registry) {
            Ok(encoded) => {
                let (lo, hi) = encoded.to_halves();
                let mut slot = [0u8; 16];
                slot[0..8].copy_from_slice(&lo.to_le_bytes());
                slot[8..16].copy_from_slice(&hi.to_le_bytes());
                let slot_ptr = ptr + (i as u32) * 16;
                crate::memory::write_bytes(&ops.memory, store.as_context_mut(), slot_ptr, &slot)?;
                encoded_so_far.push(encoded);
            }
            Err(err) => {
                for prior in encoded_so_far {
                    let _ = free_value(prior, ops, store.as_context_mut(), registry);
                }
                let _ = ops.free_fn.call(store.as_context_mut(), (ptr, byte_len));
                return Err(err);
            }
        }
    }

    Ok(IplValue::new(Tag::Array, PtrLen { ptr, len }.to_detail()))
}
