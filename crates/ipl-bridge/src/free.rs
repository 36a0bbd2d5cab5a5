use std::cell::RefCell;

use wasmtime::AsContextMut;

use crate::error::BridgeError;
use crate::ops::GuestOps;
use crate::registry::CallbackRegistry;
use crate::tag::Tag;
use crate::value::{IplValue, PtrLen};

/// Recursively reclaims any linear-memory allocation (and, for host-origin
/// functions, callback-registry slot) introduced by encoding `value`
/// (spec §4.7).
///
/// Must be safe to run over anything the encoder produced even if the
/// subsequent guest call itself trapped.
pub fn free_value(
    value: IplValue,
    ops: &GuestOps,
    mut store: impl AsContextMut,
    registry: &RefCell<CallbackRegistry>,
) -> Result<(), BridgeError> {
    match value.tag()? {
        Tag::Void | Tag::Bool | Tag::Int | Tag::Uint | Tag::Float => Ok(()),
        Tag::Bytes | Tag::String | Tag::Json => {
            let pl = PtrLen::from_detail(value.detail());
            if pl.len > 0 {
                ops.free_fn.call(store.as_context_mut(), (pl.ptr, pl.len))?;
            }
            Ok(())
        }
        Tag::Function => {
            let detail = value.detail();
            let origin_is_host = (detail >> 32) & 1 == 1;
            if origin_is_host {
                let key = detail as u32;
                registry.borrow_mut().remove(key);
            }
            Ok(())
        }
        Tag::Array => {
            let pl = PtrLen::from_detail(value.detail());
            if pl.len == 0 {
                return Ok(());
            }
            for i in 0..pl.len {
                let slot_ptr = pl.ptr + i * 16;
                let bytes = crate::memory::read_bytes(&ops.memory, store.as_context_mut(), slot_ptr, 16)?;
                let lo = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
                let hi = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
                let element = IplValue::from_halves(lo, hi);
                free_value(element, ops, store.as_context_mut(), registry)?;
            }
            ops.free_fn.call(store.as_context_mut(), (pl.ptr, pl.len * 16))?;
            Ok(())
        }
    }
}
