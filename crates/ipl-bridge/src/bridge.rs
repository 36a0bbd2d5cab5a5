use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, Context};
use smallvec::{smallvec, SmallVec};
use wasmtime::{Engine, Instance, Linker, Module, Store, TypedFunc, Val};

use crate::config::BridgeConfig;
use crate::decode::decode_value;
use crate::encode::encode_value;
use crate::error::BridgeError;
use crate::free::free_value;
use crate::ops::GuestOps;
use crate::registry::CallbackRegistry;
use crate::tag::Tag;
use crate::value::{Function, IplValue, Value};

/// Exports that exist to serve the bridge itself and are never exposed as
/// callable methods on [`Bridge`] (spec §6 "reserved export names").
const RESERVED_EXPORTS: &[&str] = &["alloc", "free", "memory", "call"];

/// The guest's symmetric `call(fn, args) -> IPL` dispatcher (spec §4.6),
/// taking a function IPL and an array IPL as two halves each.
type CallTypedFunc = TypedFunc<(u64, u64, u64, u64), (u64, u64)>;

/// The `Store<T>` payload: everything a host import needs that isn't
/// reachable through `Caller::get_export` alone.
///
/// `registry` is `Rc<RefCell<_>>` rather than a plain field because the
/// `js.call` import needs a live callback while simultaneously holding
/// `&mut Caller` to read/write the guest's linear memory; cloning the `Rc`
/// out of `caller.data()` up front sidesteps the aliasing that a bare
/// `&mut CallbackRegistry` borrowed from `caller.data_mut()` would create.
struct HostState {
    registry: Rc<RefCell<CallbackRegistry>>,
    max_array_len: u32,
}

/// A loaded guest module, instantiated and ready to be called into.
///
/// Mirrors `wasmtime::Instance` in shape (an `Engine`-derived `Store` plus
/// an `Instance` handle) but presents the guest's exports as [`Value`]-typed
/// calls instead of raw wasm parameters.
pub struct Bridge {
    store: Store<HostState>,
    instance: Instance,
    ops: GuestOps,
    call_fn: Option<CallTypedFunc>,
    registry: Rc<RefCell<CallbackRegistry>>,
    export_names: Vec<String>,
}

impl Bridge {
    /// Instantiates `bytes` as a wasm module, wiring up the `js.log` and
    /// `js.call` imports the guest expects (spec §4.6) and resolving the
    /// `alloc`/`free`/`memory` triple the bridge itself needs (spec §2.3).
    pub fn from_bytes(bytes: impl AsRef<[u8]>, config: &BridgeConfig) -> anyhow::Result<Self> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes).context("compiling guest module")?;
        Self::instantiate(&engine, &module, config)
    }

    /// As [`Bridge::from_bytes`], reading the module from `path` (spec §6
    /// "one accepting raw module bytes, one accepting a URL" — URL fetch is
    /// a host transport concern out of scope here; a local path stands in
    /// for it).
    pub fn from_file(path: impl AsRef<Path>, config: &BridgeConfig) -> anyhow::Result<Self> {
        let engine = Engine::default();
        let module = Module::from_file(&engine, path).context("compiling guest module")?;
        Self::instantiate(&engine, &module, config)
    }

    fn instantiate(engine: &Engine, module: &Module, config: &BridgeConfig) -> anyhow::Result<Self> {
        let registry = Rc::new(RefCell::new(CallbackRegistry::new()));
        let state = HostState {
            registry: Rc::clone(&registry),
            max_array_len: config.max_array_len_value(),
        };
        let mut store = Store::new(engine, state);

        let mut linker: Linker<HostState> = Linker::new(engine);
        linker.func_wrap("js", "log", host_log)?;
        linker.func_wrap("js", "call", host_call)?;

        let instance = linker
            .instantiate(&mut store, module)
            .context("instantiating guest module")?;

        let memory = instance
            .get_memory(&mut store, config.memory_export_name())
            .ok_or_else(|| anyhow!(BridgeError::MissingExport(config.memory_export_name().to_string())))?;
        let alloc_fn = instance
            .get_typed_func::<u32, u32>(&mut store, "alloc")
            .context("resolving guest `alloc` export")?;
        let free_fn = instance
            .get_typed_func::<(u32, u32), ()>(&mut store, "free")
            .context("resolving guest `free` export")?;
        let call_fn = instance
            .get_typed_func::<(u64, u64, u64, u64), (u64, u64)>(&mut store, "call")
            .ok();

        let export_names = module
            .exports()
            .map(|e| e.name().to_string())
            .filter(|name| !RESERVED_EXPORTS.contains(&name.as_str()))
            .collect();

        Ok(Bridge {
            store,
            instance,
            ops: GuestOps { memory, alloc_fn, free_fn },
            call_fn,
            registry,
            export_names,
        })
    }

    /// Names of the guest's callable exports, excluding the reserved
    /// `alloc`/`free`/`memory`/`call` quartet (spec §6).
    pub fn exports(&self) -> &[String] {
        &self.export_names
    }

    /// Number of host callbacks currently registered, i.e. encoded into a
    /// live `function` IPL value the guest still holds. A healthy call
    /// sequence returns this to zero once every outstanding call has
    /// completed and freed its arguments (spec §8 "memory hygiene" extended
    /// to the callback registry).
    pub fn pending_callbacks(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Whether any host callback is currently registered.
    pub fn has_pending_callbacks(&self) -> bool {
        !self.registry.borrow().is_empty()
    }

    /// Invokes the guest export `name` with `args`, implementing the call
    /// wrapper of spec §4.5: encode, flatten to halves, call, decode,
    /// then free every argument allocation and (if materialised) the
    /// return allocation.
    pub fn call(&mut self, name: &str, args: &[Value]) -> anyhow::Result<Value> {
        if RESERVED_EXPORTS.contains(&name) {
            return Err(BridgeError::MissingExport(name.to_string()).into());
        }
        let export = self
            .instance
            .get_export(&mut self.store, name)
            .ok_or_else(|| BridgeError::MissingExport(name.to_string()))?;
        let func = export
            .into_func()
            .ok_or_else(|| BridgeError::MissingExport(name.to_string()))?;

        // Most guest exports in practice take a handful of arguments, so a
        // few inline slots cover the common case without a heap allocation.
        let mut encoded: SmallVec<[IplValue; 4]> = SmallVec::with_capacity(args.len());
        for arg in args {
            match encode_value(arg, &self.ops, &mut self.store, &self.registry) {
                Ok(v) => encoded.push(v),
                Err(err) => {
                    for prior in encoded {
                        let _ = free_value(prior, &self.ops, &mut self.store, &self.registry);
                    }
                    return Err(err.into());
                }
            }
        }

        let mut wasm_args: SmallVec<[Val; 8]> = SmallVec::with_capacity(encoded.len() * 2);
        for value in &encoded {
            let (lo, hi) = value.to_halves();
            wasm_args.push(Val::I64(lo as i64));
            wasm_args.push(Val::I64(hi as i64));
        }
        let mut wasm_results: SmallVec<[Val; 2]> = smallvec![Val::I64(0); 2];
        let call_result = func.call(&mut self.store, &wasm_args, &mut wasm_results);

        // Arguments are owned by this call regardless of how the guest call
        // itself went (spec §4.5 "the wrapper deliberately frees arguments
        // after the call").
        for value in &encoded {
            let _ = free_value(*value, &self.ops, &mut self.store, &self.registry);
        }
        call_result.with_context(|| format!("calling guest export `{name}`"))?;

        let lo = as_i64(&wasm_results[0])? as u64;
        let hi = as_i64(&wasm_results[1])? as u64;
        let returned = IplValue::from_halves(lo, hi);
        if returned == IplValue::VOID {
            return Ok(Value::Void);
        }
        let max_array_len = self.store.data().max_array_len;
        let decoded = decode_value(returned, &self.ops, &self.store, &self.registry, max_array_len)?;
        free_value(returned, &self.ops, &mut self.store, &self.registry)?;
        Ok(decoded)
    }

    /// Invokes a decoded `function` value (spec §4.4 "return a callable
    /// proxy ... when invoked").
    ///
    /// A host-origin function is dispatched by looking its key up in the
    /// callback registry; a guest-origin function goes back through the
    /// guest's own exported `call(fn, args)` dispatcher (spec §4.6).
    pub fn invoke(&mut self, function: &Function, args: &[Value]) -> anyhow::Result<Value> {
        match function {
            Function::Host(callback) => callback(args),
            Function::Guest(ptr) => {
                let call_fn = self
                    .call_fn
                    .clone()
                    .ok_or_else(|| BridgeError::MissingExport("call".to_string()))?;
                let fn_value = IplValue::new(Tag::Function, u128::from(*ptr));
                let args_value = encode_value(&Value::Array(args.to_vec()), &self.ops, &mut self.store, &self.registry)?;

                let (fn_lo, fn_hi) = fn_value.to_halves();
                let (args_lo, args_hi) = args_value.to_halves();
                let call_result = call_fn.call(&mut self.store, (fn_lo, fn_hi, args_lo, args_hi));

                free_value(args_value, &self.ops, &mut self.store, &self.registry)?;
                let (lo, hi) = call_result?;
                let returned = IplValue::from_halves(lo, hi);
                let max_array_len = self.store.data().max_array_len;
                let decoded = decode_value(returned, &self.ops, &self.store, &self.registry, max_array_len)?;
                free_value(returned, &self.ops, &mut self.store, &self.registry)?;
                Ok(decoded)
            }
        }
    }
}

fn as_i64(val: &wasmtime::Val) -> anyhow::Result<i64> {
    match val {
        wasmtime::Val::I64(v) => Ok(*v),
        _ => Err(anyhow!("guest export did not return i64 halves")),
    }
}

/// The `js.log` import (spec §4.6): decode a single IPL value; strings go to
/// the log sink verbatim, everything else is best-effort stringified.
fn host_log(mut caller: wasmtime::Caller<'_, HostState>, lo: u64, hi: u64) -> anyhow::Result<()> {
    let ops = guest_ops(&mut caller)?;
    let registry = Rc::clone(&caller.data().registry);
    let max_array_len = caller.data().max_array_len;
    let value = IplValue::from_halves(lo, hi);
    let decoded = decode_value(value, &ops, &caller, &registry, max_array_len)?;
    match decoded {
        Value::String(s) => tracing::info!(target: "ipl_bridge::guest", "{s}"),
        other => tracing::info!(target: "ipl_bridge::guest", "{other:?}"),
    }
    Ok(())
}

/// The `js.call` import (spec §4.6): the guest asking the host to invoke a
/// callback it was previously handed. Requires `origin=1`; a guest-origin
/// function presented here is a caller error.
fn host_call(
    mut caller: wasmtime::Caller<'_, HostState>,
    fn_lo: u64,
    fn_hi: u64,
    args_lo: u64,
    args_hi: u64,
) -> anyhow::Result<(u64, u64)> {
    let ops = guest_ops(&mut caller)?;
    let registry = Rc::clone(&caller.data().registry);
    let max_array_len = caller.data().max_array_len;

    let fn_value = IplValue::from_halves(fn_lo, fn_hi);
    let detail = fn_value.detail();
    let origin_is_host = (detail >> 32) & 1 == 1;
    if !origin_is_host {
        return Err(BridgeError::WrongOrigin { expected: "host", actual: "guest" }.into());
    }
    let key = detail as u32;
    let callback = registry
        .borrow()
        .get(key)
        .ok_or(BridgeError::UnknownCallback(key))?;

    let args_value = IplValue::from_halves(args_lo, args_hi);
    let decoded_args = decode_value(args_value, &ops, &caller, &registry, max_array_len)?;
    let Value::Array(args) = decoded_args else {
        return Err(BridgeError::UnsupportedType("`call` args must decode to an array".into()).into());
    };

    let result = callback(&args)?;
    let encoded = encode_value(&result, &ops, &mut caller, &registry)?;
    Ok(encoded.to_halves())
}

fn guest_ops(caller: &mut wasmtime::Caller<'_, HostState>) -> anyhow::Result<GuestOps> {
    let memory = match caller.get_export("memory") {
        Some(wasmtime::Extern::Memory(m)) => m,
        _ => return Err(BridgeError::MissingExport("memory".to_string()).into()),
    };
    let alloc_fn = match caller.get_export("alloc") {
        Some(wasmtime::Extern::Func(f)) => f
            .typed::<u32, u32>(&caller)
            .context("guest `alloc` export has the wrong signature")?,
        _ => return Err(BridgeError::MissingExport("alloc".to_string()).into()),
    };
    let free_fn = match caller.get_export("free") {
        Some(wasmtime::Extern::Func(f)) => f
            .typed::<(u32, u32), ()>(&caller)
            .context("guest `free` export has the wrong signature")?,
        _ => return Err(BridgeError::MissingExport("free".to_string()).into()),
    };
    Ok(GuestOps { memory, alloc_fn, free_fn })
}
