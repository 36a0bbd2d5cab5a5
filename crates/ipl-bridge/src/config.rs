/// Tunables for a [`crate::bridge::Bridge`], in the shape of
/// `wasmtime::Config`: a struct of plain fields, a `Default` impl with
/// sensible values, and builder methods that take/return `&mut Self`.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    memory_export: String,
    max_array_len: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            memory_export: "memory".to_string(),
            // Not part of the distilled protocol: without a cap a malformed
            // or adversarial `array` length silently asks the host to
            // allocate and walk an unbounded region. See DESIGN.md.
            max_array_len: 1 << 20,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the guest's exported linear memory. Defaults to `"memory"`.
    pub fn memory_export(&mut self, name: impl Into<String>) -> &mut Self {
        self.memory_export = name.into();
        self
    }

    /// Upper bound on the element count of any single `array` IPL value
    /// this bridge will materialise. Defaults to 2^20.
    pub fn max_array_len(&mut self, len: u32) -> &mut Self {
        self.max_array_len = len;
        self
    }

    pub(crate) fn memory_export_name(&self) -> &str {
        &self.memory_export
    }

    pub(crate) fn max_array_len_value(&self) -> u32 {
        self.max_array_len
    }
}
