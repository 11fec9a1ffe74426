//! Live artifact instances behind the allocator environment.
//!
//! Each [`Instance`] owns its store, its linear memory and its bump arena;
//! nothing is shared between instances. The guest sees two imports under
//! `env`: `quantum_malloc`, backed by [`Arena::alloc`], and `memory`, the
//! arena's region. Guest-driven and host-driven allocations go through the
//! same arena, so both observe one high-water mark.

use log::{debug, trace};
use wasmi::{core::Trap, Caller, Extern, Func, Linker, Store, Value};

use crate::{
    error::{Error, Result},
    memory::{Arena, INITIAL_PAGES},
    runtime::Runtime,
};

/// Import module name for the allocator environment.
pub const ENV_MODULE: &str = "env";
/// Name of the injected allocation function.
pub const MALLOC_IMPORT: &str = "quantum_malloc";
/// Name of the injected linear memory.
pub const MEMORY_IMPORT: &str = "memory";

/// Mutable arena state carried by the store, so guest calls through the
/// `quantum_malloc` import and host calls through [`Instance::alloc`] see
/// the same allocator.
#[derive(Debug)]
struct HostState {
    top: u64,
}

/// A live instantiation of an artifact.
#[derive(Debug)]
pub struct Instance {
    store: Store<HostState>,
    instance: wasmi::Instance,
    memory: wasmi::Memory,
}

impl Instance {
    pub(crate) fn new(rt: &Runtime, module: &wasmi::Module) -> Result<Self> {
        let mut store = Store::new(rt.engine(), HostState { top: 0 });
        let arena = Arena::new(&mut store, INITIAL_PAGES)?;
        store.data_mut().top = arena.high_water_mark();
        let memory = arena.memory();

        let malloc = Func::wrap(
            &mut store,
            move |mut caller: Caller<'_, HostState>, size: u32| -> std::result::Result<u32, Trap> {
                let mut arena = Arena::from_parts(memory, caller.data().top);
                let ptr = arena
                    .alloc(&mut caller, size)
                    .map_err(|e| Trap::new(e.to_string()))?;
                caller.data_mut().top = arena.high_water_mark();
                Ok(ptr)
            },
        );

        let mut linker = Linker::<HostState>::new(rt.engine());
        linker
            .define(ENV_MODULE, MALLOC_IMPORT, malloc)
            .and_then(|l| l.define(ENV_MODULE, MEMORY_IMPORT, memory))
            .map_err(|e| Error::Instantiate(e.into()))?;

        let instance = linker
            .instantiate(&mut store, module)
            .and_then(|pre| pre.start(&mut store))
            .map_err(Error::Instantiate)?;
        debug!(target: "qwasm::instance", "instantiated artifact with allocator environment");
        Ok(Instance {
            store,
            instance,
            memory,
        })
    }

    /// Host-side entry to the instance allocator. Same contract as the
    /// guest's `quantum_malloc` import: returns the region length before
    /// growth, then grows by `size` rounded up to whole pages.
    pub fn alloc(&mut self, size: u32) -> Result<u32> {
        let mut arena = Arena::from_parts(self.memory, self.store.data().top);
        let ptr = arena.alloc(&mut self.store, size)?;
        self.store.data_mut().top = arena.high_water_mark();
        Ok(ptr)
    }

    /// Grow the linear memory by `pages` ahead of use. Returns the new
    /// capacity in bytes. Does not move the high-water mark.
    pub fn grow_memory(&mut self, pages: u32) -> Result<usize> {
        let mut arena = Arena::from_parts(self.memory, self.store.data().top);
        arena.grow(&mut self.store, pages)
    }

    /// Call an exported function by name.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Vec<Value>> {
        let func = self
            .instance
            .get_export(&self.store, name)
            .and_then(Extern::into_func)
            .ok_or_else(|| Error::UndefinedExport(name.into()))?;
        let mut results: Vec<Value> = func
            .ty(&self.store)
            .results()
            .iter()
            .map(|ty| Value::default(*ty))
            .collect();
        func.call(&mut self.store, args, &mut results)
            .map_err(Error::Call)?;
        trace!(target: "qwasm::instance", "call {name} -> {results:?}");
        Ok(results)
    }

    /// Current linear-memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.memory.data(&self.store).len()
    }

    /// Current linear-memory size in pages.
    pub fn memory_pages(&self) -> u32 {
        u32::from(self.memory.current_pages(&self.store))
    }

    /// End of the last allocation, in bytes from the region base.
    pub fn high_water_mark(&self) -> u64 {
        self.store.data().top
    }

    /// Read-only view of the linear memory. Growth may move the backing
    /// buffer, so re-borrow after any allocation or growth.
    pub fn memory_data(&self) -> &[u8] {
        self.memory.data(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::PAGE_SIZE;

    const TAKE: &str = r#"
        (module
          (import "env" "quantum_malloc" (func $malloc (param i32) (result i32)))
          (import "env" "memory" (memory 256))
          (func (export "take") (param i32) (result i32)
            local.get 0
            call $malloc))
    "#;

    fn wrapper(wat: &str) -> Instance {
        let rt = Runtime::new();
        let module = rt.compile(&wat::parse_str(wat).unwrap()).unwrap();
        rt.instantiate(&module).unwrap()
    }

    #[test]
    fn malloc_import_drives_the_stored_mark() {
        let mut inst = wrapper(TAKE);
        let base = inst.store.data().top;
        let ptr = inst.call("take", &[Value::I32(8)]).unwrap()[0].i32().unwrap() as u64;
        assert_eq!(ptr, base);
        assert_eq!(inst.store.data().top, base + 8);
    }

    #[test]
    fn host_and_guest_calls_share_the_stored_mark() {
        let mut inst = wrapper(TAKE);
        let base = inst.store.data().top;
        inst.alloc(3).unwrap();
        assert_eq!(inst.store.data().top, base + 3);

        let guest = inst.call("take", &[Value::I32(5)]).unwrap()[0].i32().unwrap() as u64;
        assert_eq!(guest, base + PAGE_SIZE as u64);
        assert_eq!(inst.store.data().top, guest + 5);
    }

    #[test]
    fn from_parts_restores_the_saved_mark() {
        let inst = wrapper(TAKE);
        let arena = Arena::from_parts(inst.memory, inst.store.data().top);
        assert_eq!(arena.high_water_mark(), inst.store.data().top);
        assert_eq!(arena.capacity(&inst.store), inst.memory_size());
    }
}
