use thiserror::Error;

/// Errors produced by the value bridge (spec §7).
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("cannot encode value as an IPL value: {0}")]
    UnsupportedType(String),

    #[error("decoded tag {0} is outside the 0..10 variant range")]
    UnknownVariant(u128),

    #[error("function called across the wrong origin (expected {expected}, got {actual})")]
    WrongOrigin { expected: &'static str, actual: &'static str },

    #[error("(ptr={ptr}, len={len}) is out of bounds of linear memory (size {memory_size})")]
    MemoryFault { ptr: u32, len: u32, memory_size: usize },

    #[error("alloc({len}) returned a null pointer")]
    AllocationFailure { len: u32 },

    #[error("JSON serialization or parsing failed")]
    JsonFailure(#[from] serde_json::Error),

    #[error("bit sections overflow the 128-bit value (total width {total})")]
    SectionOverflow { total: u64 },

    #[error("export `{0}` is not callable or does not exist")]
    MissingExport(String),

    #[error("no callback registered under key {0}")]
    UnknownCallback(u32),

    #[error("guest trapped")]
    Trap(#[from] wasmtime::Error),
}
