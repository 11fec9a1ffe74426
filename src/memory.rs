use log::{debug, trace};
use wasmi::{core::Pages, AsContext, AsContextMut, Memory, MemoryType};

use crate::error::{Error, Result};

/// Wasm page size in bytes.
pub const PAGE_SIZE: usize = 65_536;

/// Initial linear-memory size handed to artifacts, in pages (16 MiB).
pub const INITIAL_PAGES: u32 = 256;

/// Grow-only bump arena over an engine-owned linear memory.
///
/// The arena never frees or reuses: every allocation with a non-zero size
/// grows the region and hands out the byte length the region had before the
/// growth. `top` is the high-water mark, the end of the last allocation.
/// The store context is passed to every operation; the arena itself is a
/// plain value and carries no ambient state.
#[derive(Debug, Clone, Copy)]
pub struct Arena {
    memory: Memory,
    top: u64,
}

impl Arena {
    /// Create the backing memory with `initial_pages` pages and no maximum.
    ///
    /// The initial region is reserved for the module's static data, so the
    /// high-water mark starts at the initial byte length.
    pub fn new(mut ctx: impl AsContextMut, initial_pages: u32) -> Result<Self> {
        let ty = MemoryType::new(initial_pages, None)?;
        let memory = Memory::new(&mut ctx, ty)?;
        let top = memory.data(&ctx).len() as u64;
        Ok(Arena { memory, top })
    }

    /// Reassemble an arena from its memory handle and saved high-water mark.
    pub(crate) fn from_parts(memory: Memory, top: u64) -> Self {
        Arena { memory, top }
    }

    /// Handle to the backing memory, for export or import definition.
    pub fn memory(&self) -> Memory {
        self.memory
    }

    /// Current size in bytes.
    pub fn capacity(&self, ctx: impl AsContext) -> usize {
        self.memory.data(&ctx).len()
    }

    /// Current size in pages.
    pub fn pages(&self, ctx: impl AsContext) -> u32 {
        u32::from(self.memory.current_pages(&ctx))
    }

    /// End of the last allocation, in bytes from the region base.
    pub fn high_water_mark(&self) -> u64 {
        self.top
    }

    /// Bump-allocate `size` bytes.
    ///
    /// Returns the region length before growth as the pointer, then grows
    /// by `size` rounded up to whole pages. `size == 0` issues no growth
    /// and returns the current length.
    pub fn alloc(&mut self, mut ctx: impl AsContextMut, size: u32) -> Result<u32> {
        let len = self.capacity(&ctx);
        let ptr = u32::try_from(len).map_err(|_| Error::AddressSpaceExhausted)?;
        let pages = size.div_ceil(PAGE_SIZE as u32);
        if pages > 0 {
            self.grow(&mut ctx, pages)?;
        }
        self.top = u64::from(ptr) + u64::from(size);
        trace!(target: "qwasm::memory", "alloc {size} B -> ptr {ptr:#x}");
        Ok(ptr)
    }

    /// Grow by `delta` pages. Returns the new capacity in bytes, or error.
    pub fn grow(&mut self, mut ctx: impl AsContextMut, delta: u32) -> Result<usize> {
        let pages = Pages::new(delta).ok_or(Error::AddressSpaceExhausted)?;
        self.memory.grow(&mut ctx, pages)?;
        let capacity = self.capacity(&ctx);
        debug!(target: "qwasm::memory", "grew linear memory by {delta} pages to {capacity} B");
        Ok(capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmi::{Engine, Store};

    fn store() -> Store<()> {
        Store::new(&Engine::default(), ())
    }

    #[test]
    fn initial_capacity() {
        let mut store = store();
        let a = Arena::new(&mut store, 2).unwrap();
        assert_eq!(a.capacity(&store), 2 * PAGE_SIZE);
        assert_eq!(a.pages(&store), 2);
        assert_eq!(a.high_water_mark(), (2 * PAGE_SIZE) as u64);
    }

    #[test]
    fn alloc_returns_pre_growth_length() {
        let mut store = store();
        let mut a = Arena::new(&mut store, 1).unwrap();
        let ptr = a.alloc(&mut store, 1).unwrap();
        assert_eq!(ptr as usize, PAGE_SIZE);
        assert_eq!(a.capacity(&store), 2 * PAGE_SIZE);
        assert_eq!(a.high_water_mark(), PAGE_SIZE as u64 + 1);
    }

    #[test]
    fn alloc_rounds_up_to_pages() {
        let mut store = store();
        let mut a = Arena::new(&mut store, 1).unwrap();
        let ptr = a.alloc(&mut store, 70_000).unwrap();
        assert_eq!(ptr as usize, PAGE_SIZE);
        assert_eq!(a.capacity(&store), 3 * PAGE_SIZE);
    }

    #[test]
    fn alloc_zero_does_not_grow() {
        let mut store = store();
        let mut a = Arena::new(&mut store, 1).unwrap();
        let ptr = a.alloc(&mut store, 0).unwrap();
        assert_eq!(ptr as usize, PAGE_SIZE);
        assert_eq!(a.capacity(&store), PAGE_SIZE);
    }

    #[test]
    fn successive_allocs_never_alias() {
        let mut store = store();
        let mut a = Arena::new(&mut store, 1).unwrap();
        let p1 = a.alloc(&mut store, 1).unwrap();
        let p2 = a.alloc(&mut store, 1).unwrap();
        assert_ne!(p1, p2);
        assert_eq!(p2 - p1, PAGE_SIZE as u32);
    }

    #[test]
    fn grow_returns_new_capacity() {
        let mut store = store();
        let mut a = Arena::new(&mut store, 1).unwrap();
        let capacity = a.grow(&mut store, 3).unwrap();
        assert_eq!(capacity, 4 * PAGE_SIZE);
        assert_eq!(a.pages(&store), 4);
    }

    #[test]
    fn grow_past_address_space_is_memory_error() {
        let mut store = store();
        let mut a = Arena::new(&mut store, 1).unwrap();
        let err = a.grow(&mut store, 65_536).unwrap_err();
        assert!(matches!(err, Error::Memory(_)));
        assert_eq!(a.pages(&store), 1);
    }
}
