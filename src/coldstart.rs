//! Cold-start measurement for compiled artifacts.
//!
//! Each iteration answers the production question "what does a fresh load
//! cost": re-read the artifact bytes, compile and instantiate them in one
//! timed window, then time the `_initialize` export in a second window.
//! Samples come back in execution order and are never aggregated here;
//! statistics belong to the caller.

use std::{fs, path::Path, time::Instant};

use log::{debug, trace};
use wasmi::{
    core::ValueType, FuncRef, Global, Linker, Memory, MemoryType, Mutability, Store, Table,
    TableType, Value,
};

use crate::{
    error::{Error, Result},
    memory::INITIAL_PAGES,
    runtime::Runtime,
};

/// Default number of measured iterations.
pub const DEFAULT_ITERATIONS: usize = 100;

/// Initializer export resolved and called in the second window.
pub const INIT_EXPORT: &str = "_initialize";

// Static-base import environment, distinct from the allocator environment
// in `instance`. Emscripten-style artifacts expect all four names; unused
// definitions are ignored at link time.
const ENV: &str = "env";
const MEMORY_BASE: &str = "memoryBase";
const TABLE_BASE: &str = "tableBase";
const MEMORY: &str = "memory";
const TABLE: &str = "table";

/// One cold-start measurement, all fields in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sample {
    /// Decode, validate and instantiate, as one window.
    pub instantiate_ms: f64,
    /// The `_initialize` call, including export resolution.
    pub init_ms: f64,
    /// Start of the first window to end of the second.
    pub total_ms: f64,
}

/// Measure one cold start of `wasm` against the static-base environment.
pub fn measure(rt: &Runtime, wasm: &[u8]) -> Result<Sample> {
    let mut store = Store::new(rt.engine(), ());
    let linker = static_base_linker(rt, &mut store)?;

    let begin = Instant::now();
    let module = wasmi::Module::new(rt.engine(), &mut &wasm[..]).map_err(Error::InvalidModule)?;
    let instance = linker
        .instantiate(&mut store, &module)
        .and_then(|pre| pre.start(&mut store))
        .map_err(Error::Instantiate)?;
    let instantiated = Instant::now();

    let init = instance
        .get_typed_func::<(), ()>(&store, INIT_EXPORT)
        .map_err(|_| Error::UndefinedExport(INIT_EXPORT.into()))?;
    init.call(&mut store, ()).map_err(|t| Error::Call(t.into()))?;
    let done = Instant::now();

    Ok(Sample {
        instantiate_ms: (instantiated - begin).as_secs_f64() * 1e3,
        init_ms: (done - instantiated).as_secs_f64() * 1e3,
        total_ms: (done - begin).as_secs_f64() * 1e3,
    })
}

/// Run [`DEFAULT_ITERATIONS`] cold starts of the artifact at `path`.
pub fn run(rt: &Runtime, path: impl AsRef<Path>) -> Result<Vec<Sample>> {
    run_iters(rt, path, DEFAULT_ITERATIONS)
}

/// Run `iterations` cold starts of the artifact at `path`.
///
/// The artifact is re-read from disk on every iteration, outside the timed
/// windows. The first failure aborts the run, so a missing or unreadable
/// artifact produces no samples at all.
pub fn run_iters(rt: &Runtime, path: impl AsRef<Path>, iterations: usize) -> Result<Vec<Sample>> {
    let path = path.as_ref();
    debug!(
        target: "qwasm::coldstart",
        "cold-start run: {} x {iterations}",
        path.display()
    );
    let mut samples = Vec::with_capacity(iterations);
    for i in 0..iterations {
        let wasm = fs::read(path).map_err(|e| Error::io(path, e))?;
        let sample = measure(rt, &wasm)?;
        trace!(
            target: "qwasm::coldstart",
            "iteration {i}: {:.3} ms total",
            sample.total_ms
        );
        samples.push(sample);
    }
    Ok(samples)
}

fn static_base_linker(rt: &Runtime, store: &mut Store<()>) -> Result<Linker<()>> {
    let memory = Memory::new(&mut *store, MemoryType::new(INITIAL_PAGES, None)?)?;
    let table = Table::new(
        &mut *store,
        TableType::new(ValueType::FuncRef, 0, None),
        Value::FuncRef(FuncRef::null()),
    )
    .map_err(|e| Error::Instantiate(e.into()))?;
    let memory_base = Global::new(&mut *store, Value::I32(0), Mutability::Const);
    let table_base = Global::new(&mut *store, Value::I32(0), Mutability::Const);

    let mut linker = Linker::new(rt.engine());
    linker
        .define(ENV, MEMORY_BASE, memory_base)
        .and_then(|l| l.define(ENV, TABLE_BASE, table_base))
        .and_then(|l| l.define(ENV, MEMORY, memory))
        .and_then(|l| l.define(ENV, TABLE, table))
        .map_err(|e| Error::Instantiate(e.into()))?;
    Ok(linker)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIVIAL: &str = r#"
        (module
          (func (export "_initialize")))
    "#;

    const EMSCRIPTEN_STYLE: &str = r#"
        (module
          (import "env" "memoryBase" (global i32))
          (import "env" "tableBase" (global i32))
          (import "env" "memory" (memory 256))
          (import "env" "table" (table 0 funcref))
          (func (export "_initialize")))
    "#;

    #[test]
    fn sample_windows_sum_to_total() {
        let rt = Runtime::new();
        let wasm = wat::parse_str(TRIVIAL).unwrap();
        let s = measure(&rt, &wasm).unwrap();
        assert!(s.instantiate_ms >= 0.0);
        assert!(s.init_ms >= 0.0);
        assert!((s.total_ms - (s.instantiate_ms + s.init_ms)).abs() < 1e-6);
    }

    #[test]
    fn static_base_environment_satisfies_imports() {
        let rt = Runtime::new();
        let wasm = wat::parse_str(EMSCRIPTEN_STYLE).unwrap();
        measure(&rt, &wasm).unwrap();
    }

    #[test]
    fn missing_initializer_is_undefined_export() {
        let rt = Runtime::new();
        let wasm = wat::parse_str("(module)").unwrap();
        let err = measure(&rt, &wasm).unwrap_err();
        assert!(matches!(err, Error::UndefinedExport(_)));
    }

    #[test]
    fn garbage_bytes_are_invalid() {
        let rt = Runtime::new();
        let err = measure(&rt, b"not wasm").unwrap_err();
        assert!(matches!(err, Error::InvalidModule(_)));
    }
}
