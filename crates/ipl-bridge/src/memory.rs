use wasmtime::{AsContext, AsContextMut, Memory};

use crate::error::BridgeError;

/// Bounds-checked read of `[ptr, ptr+len)` out of `memory`.
///
/// The reference behaviour spec.md describes does not bounds-check; spec §9
/// flags this and requires a compliant implementation to add the check.
/// Always returns an owned copy, never a borrow into `memory`'s backing
/// store, since that store may be reallocated or freed after the call
/// (spec §3 "A decoded bytes buffer ... is always a copy").
pub fn read_bytes(
    memory: &Memory,
    store: impl AsContext,
    ptr: u32,
    len: u32,
) -> Result<Vec<u8>, BridgeError> {
    let data = memory.data(store.as_context());
    let start = ptr as usize;
    let end = start.checked_add(len as usize).ok_or(BridgeError::MemoryFault {
        ptr,
        len,
        memory_size: data.len(),
    })?;
    data.get(start..end)
        .map(<[u8]>::to_vec)
        .ok_or(BridgeError::MemoryFault { ptr, len, memory_size: data.len() })
}

/// Bounds-checked write of `bytes` into `memory` starting at `ptr`.
pub fn write_bytes(
    memory: &Memory,
    mut store: impl AsContextMut,
    ptr: u32,
    bytes: &[u8],
) -> Result<(), BridgeError> {
    let data = memory.data_mut(store.as_context_mut());
    let memory_size = data.len();
    let start = ptr as usize;
    let end = start
        .checked_add(bytes.len())
        .ok_or(BridgeError::MemoryFault { ptr, len: bytes.len() as u32, memory_size })?;
    let dst = data
        .get_mut(start..end)
        .ok_or(BridgeError::MemoryFault { ptr, len: bytes.len() as u32, memory_size })?;
    dst.copy_from_slice(bytes);
    Ok(())
}
