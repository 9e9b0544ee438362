//! Policy Runtime - Wasmtime-based policy evaluation engine

use crate::error::{HostError, HostResult};
use shared::LogLevel;
use std::sync::Arc;
use wasmtime::{Caller, Config, Engine, Extern, Linker, Module, OptLevel, Store, Trap, TypedFunc};

/// Host state
pub struct HostState;

/// Anything able to answer the policy's two entry points.
///
/// Both calls take and return JSON bytes in the shapes of the `shared`
/// protocol types.
pub trait PolicyEvaluator: Send + Sync {
    fn validate(&self, payload: &[u8]) -> HostResult<Vec<u8>>;

    fn validate_settings(&self, settings: &[u8]) -> HostResult<Vec<u8>>;
}

/// Policy runtime managing Wasm module execution
pub struct WasmPolicy {
    engine: Arc<Engine>,
    module: Arc<Module>,
    linker: Arc<Linker<HostState>>,
    fuel_limit: u64,
}

impl WasmPolicy {
    /// Create a new policy runtime from Wasm bytes
    pub fn new(wasm_bytes: &[u8], fuel_limit: u64) -> HostResult<Self> {
        let engine = create_edge_engine()?;
        let module = Module::new(&engine, wasm_bytes).map_err(|e| {
            HostError::WasmLoadError(format!("Failed to compile module: {}", e))
        })?;

        let mut linker: Linker<HostState> = Linker::new(&engine);
        linker
            .func_wrap("host", "log", forward_guest_log)
            .map_err(|e| HostError::WasmLoadError(format!("Failed to register log: {}", e)))?;

        Ok(Self {
            engine: Arc::new(engine),
            module: Arc::new(module),
            linker: Arc::new(linker),
            fuel_limit,
        })
    }

    /// Run one guest export on `input` inside a fresh store
    fn call_guest(&self, export: &str, input: &[u8]) -> HostResult<Vec<u8>> {
        let mut store = Store::new(&self.engine, HostState);

        // Set fuel limit for DoS protection
        store.set_fuel(self.fuel_limit).map_err(|e| {
            HostError::PolicyExecutionError(format!("Failed to set fuel: {}", e))
        })?;

        let instance = self.linker.instantiate(&mut store, &self.module).map_err(|e| {
            HostError::PolicyExecutionError(format!("Failed to instantiate: {}", e))
        })?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| HostError::FunctionNotFound("memory".to_string()))?;

        let alloc: TypedFunc<i32, i32> = instance
            .get_typed_func(&mut store, "alloc")
            .map_err(|e| HostError::FunctionNotFound(format!("alloc: {}", e)))?;
        let dealloc: TypedFunc<(i32, i32), ()> = instance
            .get_typed_func(&mut store, "dealloc")
            .map_err(|e| HostError::FunctionNotFound(format!("dealloc: {}", e)))?;
        let entry: TypedFunc<(i32, i32), i64> = instance
            .get_typed_func(&mut store, export)
            .map_err(|e| HostError::FunctionNotFound(format!("{}: {}", export, e)))?;

        let len = i32::try_from(input.len())
            .map_err(|_| HostError::PolicyExecutionError("Request too large".to_string()))?;
        let capacity = len.max(1);

        let input_ptr = alloc
            .call(&mut store, capacity)
            .map_err(|e| execution_error(e, self.fuel_limit))?;
        if input_ptr <= 0 {
            return Err(HostError::PolicyExecutionError(
                "Guest failed to allocate input buffer".to_string(),
            ));
        }

        memory
            .write(&mut store, input_ptr as usize, input)
            .map_err(|_| HostError::MemoryOutOfBounds {
                offset: input_ptr as usize,
            })?;

        let packed = entry
            .call(&mut store, (input_ptr, len))
            .map_err(|e| execution_error(e, self.fuel_limit))?;

        dealloc
            .call(&mut store, (input_ptr, capacity))
            .map_err(|e| execution_error(e, self.fuel_limit))?;

        if packed == 0 {
            return Err(HostError::PolicyExecutionError(format!(
                "{} produced no response",
                export
            )));
        }

        let packed = packed as u64;
        let out_ptr = (packed >> 32) as usize;
        let out_len = (packed & 0xffff_ffff) as usize;

        let mut output = vec![0u8; out_len];
        memory
            .read(&store, out_ptr, &mut output)
            .map_err(|_| HostError::MemoryOutOfBounds { offset: out_ptr })?;

        dealloc
            .call(&mut store, (out_ptr as i32, out_len as i32))
            .map_err(|e| execution_error(e, self.fuel_limit))?;

        Ok(output)
    }
}

impl PolicyEvaluator for WasmPolicy {
    fn validate(&self, payload: &[u8]) -> HostResult<Vec<u8>> {
        self.call_guest("validate", payload)
    }

    fn validate_settings(&self, settings: &[u8]) -> HostResult<Vec<u8>> {
        self.call_guest("validate_settings", settings)
    }
}

/// `host.log(level, ptr, len)` import: re-emit guest lines through tracing
fn forward_guest_log(mut caller: Caller<'_, HostState>, level: i32, ptr: i32, len: i32) {
    let Some(Extern::Memory(mem)) = caller.get_export("memory") else {
        return;
    };
    let data = mem.data(&caller);
    let start = ptr as usize;
    let end = start.saturating_add(len as usize).min(data.len());
    if start >= end {
        return;
    }
    let Ok(msg) = std::str::from_utf8(&data[start..end]) else {
        return;
    };

    match LogLevel::from_i32(level).unwrap_or(LogLevel::Info) {
        LogLevel::Trace => tracing::trace!(target: "policy", "{}", msg),
        LogLevel::Debug => tracing::debug!(target: "policy", "{}", msg),
        LogLevel::Info => tracing::info!(target: "policy", "{}", msg),
        LogLevel::Warn => tracing::warn!(target: "policy", "{}", msg),
        LogLevel::Error => tracing::error!(target: "policy", "{}", msg),
    }
}

fn execution_error(e: wasmtime::Error, fuel_limit: u64) -> HostError {
    if let Some(Trap::OutOfFuel) = e.downcast_ref::<Trap>() {
        return HostError::FuelExhausted {
            consumed: fuel_limit,
        };
    }
    HostError::PolicyExecutionError(format!("Policy execution failed: {}", e))
}

/// Create an engine optimized for edge devices
fn create_edge_engine() -> HostResult<Engine> {
    let mut config = Config::new();

    // Resource limiting for DoS protection
    config.consume_fuel(true);
    config.epoch_interruption(false);

    // Memory optimization for edge
    config.max_wasm_stack(256 * 1024);
    config.memory_guaranteed_dense_image_size(0);

    config.wasm_simd(false);
    config.wasm_bulk_memory(true);
    config.wasm_multi_value(true);
    config.wasm_tail_call(false);
    config.wasm_relaxed_simd(false);

    config.cranelift_opt_level(OptLevel::SpeedAndSize);

    Engine::new(&config).map_err(|e| HostError::WasmLoadError(e.to_string()))
}
