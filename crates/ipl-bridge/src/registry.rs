use std::collections::HashMap;
use std::sync::Arc;

use crate::value::Value;

/// A host callback invokable from the guest via the `call` import.
///
/// Takes the decoded argument list and returns the decoded return value.
pub type HostCallback = dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static;

/// Host-side slot map from integer key to registered callback
/// (spec §3 "callback registry", §9 open question on key assignment).
///
/// The reference behaviour assigns `key = registry.len()` at insertion,
/// which collides with a still-live higher key once an earlier key is
/// freed mid-session (spec §9). This implementation instead uses a
/// monotonically increasing counter that is never reused, so a freed key
/// can never alias a live one.
#[derive(Default)]
pub struct CallbackRegistry {
    next_key: u32,
    slots: HashMap<u32, Arc<HostCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`, returning its newly assigned key.
    pub fn register(&mut self, callback: Arc<HostCallback>) -> u32 {
        let key = self.next_key;
        self.next_key += 1;
        self.slots.insert(key, callback);
        key
    }

    pub fn get(&self, key: u32) -> Option<Arc<HostCallback>> {
        self.slots.get(&key).cloned()
    }

    /// Releases the callback at `key`, as happens when the function IPL
    /// value referencing it is freed (spec §3 "Lifecycle & ownership").
    pub fn remove(&mut self, key: u32) -> Option<Arc<HostCallback>> {
        self.slots.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Arc<HostCallback> {
        Arc::new(|_args: &[Value]| Ok(Value::Void))
    }

    #[test]
    fn keys_are_strictly_increasing_and_never_reused() {
        let mut reg = CallbackRegistry::new();
        let a = reg.register(noop());
        let b = reg.register(noop());
        assert!(b > a);
        reg.remove(a);
        let c = reg.register(noop());
        // A freed low key must never collide with a still-live higher key;
        // the reference `key = len()` scheme would reassign `a` here.
        assert_ne!(c, a);
        assert!(c > b);
    }

    #[test]
    fn remove_releases_the_slot() {
        let mut reg = CallbackRegistry::new();
        let key = reg.register(noop());
        assert!(reg.get(key).is_some());
        reg.remove(key);
        assert!(reg.get(key).is_none());
    }
}
