use std::{fs, path::Path};

use log::debug;

use crate::{
    error::{Error, Result},
    instance::Instance,
};

/// Top-level runtime context. Owns the engine shared by benchmark runs and
/// wrapper instances.
pub struct Runtime {
    engine: wasmi::Engine,
}

impl Runtime {
    pub fn new() -> Self {
        Runtime {
            engine: wasmi::Engine::default(),
        }
    }

    pub fn engine(&self) -> &wasmi::Engine {
        &self.engine
    }

    /// Decode and validate a binary artifact.
    pub fn compile(&self, wasm: &[u8]) -> Result<wasmi::Module> {
        wasmi::Module::new(&self.engine, &mut &wasm[..]).map_err(Error::InvalidModule)
    }

    /// Read an artifact from disk and compile it.
    pub fn load_module(&self, path: impl AsRef<Path>) -> Result<wasmi::Module> {
        let path = path.as_ref();
        let wasm = fs::read(path).map_err(|e| Error::io(path, e))?;
        debug!(target: "qwasm::runtime", "read {} ({} B)", path.display(), wasm.len());
        self.compile(&wasm)
    }

    /// Instantiate a module behind the allocator environment.
    pub fn instantiate(&self, module: &wasmi::Module) -> Result<Instance> {
        Instance::new(self, module)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
