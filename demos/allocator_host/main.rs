//! demos/allocator_host — demonstrates the allocator environment.
//!
//! Simulates a host application that:
//!   1. Builds an artifact whose guest code allocates through `quantum_malloc`.
//!   2. Instantiates it behind the allocator environment.
//!   3. Calls the export and reads the written bytes back from the host side.

use qwasm::{Runtime, Value};

fn build_artifact() -> Vec<u8> {
    wat::parse_str(
        r#"
        (module
          (import "env" "quantum_malloc" (func $malloc (param i32) (result i32)))
          (import "env" "memory" (memory 256))
          ;; Allocate `len` bytes and fill them with a counting pattern.
          (func (export "fill") (param $len i32) (result i32)
            (local $p i32)
            (local $i i32)
            local.get $len
            call $malloc
            local.set $p
            (block $done
              (loop $next
                local.get $i
                local.get $len
                i32.ge_u
                br_if $done
                (i32.store8
                  (i32.add (local.get $p) (local.get $i))
                  (local.get $i))
                local.get $i
                i32.const 1
                i32.add
                local.set $i
                br $next))
            local.get $p))
        "#,
    )
    .expect("invalid fixture")
}

fn main() {
    let artifact = build_artifact();
    println!("Artifact size: {} bytes", artifact.len());

    let rt = Runtime::new();
    let module = rt.compile(&artifact).expect("failed to load artifact");
    let mut inst = rt.instantiate(&module).expect("instantiation failed");

    let results = inst.call("fill", &[Value::I32(16)]).expect("call failed");
    let ptr = results[0].i32().expect("i32 result") as usize;

    println!("fill(16) -> ptr {ptr:#x}");
    println!(
        "memory: {} pages, high-water mark {} B",
        inst.memory_pages(),
        inst.high_water_mark()
    );
    println!("bytes at ptr: {:?}", &inst.memory_data()[ptr..ptr + 16]);
}
