//! demos/hello_coldstart — demonstrates measuring artifact cold starts.

use qwasm::{coldstart, Runtime};

fn main() {
    // ── Build artifact ────────────────────────────────────────────────────────
    // Emscripten-style imports against the static-base environment, plus the
    // `_initialize` export the second timing window calls.
    let artifact = wat::parse_str(
        r#"
        (module
          (import "env" "memoryBase" (global i32))
          (import "env" "memory" (memory 256))
          (func (export "_initialize")))
        "#,
    )
    .expect("invalid fixture");

    // ── Measure ───────────────────────────────────────────────────────────────
    let rt = Runtime::new();
    for i in 0..5 {
        let s = coldstart::measure(&rt, &artifact).expect("measurement failed");
        println!(
            "cold start {i}: {:.3} ms instantiate, {:.3} ms init, {:.3} ms total",
            s.instantiate_ms, s.init_ms, s.total_ms
        );
    }
}
