use wasmtime::{Memory, TypedFunc};

/// The guest-exposed linear-memory allocator (spec §3's "two externally
/// supplied symbols `alloc(len)->ptr` and `free(ptr,len)`"), bundled with
/// the memory they operate on so encode/decode/free don't each need three
/// separate parameters threaded through every call.
#[derive(Clone)]
pub struct GuestOps {
    pub memory: Memory,
    pub alloc_fn: TypedFunc<u32, u32>,
    pub free_fn: TypedFunc<(u32, u32), ()>,
}
