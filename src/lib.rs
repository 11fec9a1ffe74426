//! qwasm — cold-start measurement and embedding host for quantum toolchain
//! WASM artifacts.
//!
//! # Quick start
//!
//! ```rust
//! use qwasm::{Runtime, Value};
//!
//! let wasm = wat::parse_str(
//!     r#"
//!     (module
//!       (import "env" "quantum_malloc" (func $malloc (param i32) (result i32)))
//!       (import "env" "memory" (memory 256))
//!       (func (export "scratch") (param i32) (result i32)
//!         local.get 0
//!         call $malloc))
//!     "#,
//! )
//! .unwrap();
//!
//! let rt = Runtime::new();
//! let module = rt.compile(&wasm).unwrap();
//! let mut inst = rt.instantiate(&module).unwrap();
//!
//! // First allocation lands at the end of the initial 256-page region.
//! let result = inst.call("scratch", &[Value::I32(1024)]).unwrap();
//! assert_eq!(result[0].i32(), Some(16_777_216));
//! ```

pub mod coldstart;
pub mod error;
pub mod instance;
pub mod memory;
pub mod runtime;

pub use coldstart::{measure, run, run_iters, Sample, DEFAULT_ITERATIONS, INIT_EXPORT};
pub use error::{Error, Result};
pub use instance::Instance;
pub use memory::{Arena, INITIAL_PAGES, PAGE_SIZE};
pub use runtime::Runtime;
pub use wasmi::Value;
