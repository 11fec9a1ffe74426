//! `qbench` — cold-start benchmark CLI for quantum WASM artifacts.
//!
//! Usage:
//!   qbench bench <artifact.wasm> [--iterations N] [--json]
//!   qbench inspect <artifact.wasm>
//!   qbench run <artifact.wasm> <export> [i32 args...]

use std::{env, process};

use anyhow::{bail, Context, Result};
use qwasm::{coldstart, Runtime, Value};

fn main() -> Result<()> {
    let mut builder = env_logger::Builder::from_env("QWASM_LOG");
    builder.format_timestamp(None);
    builder.init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
        process::exit(2);
    }

    match args[1].as_str() {
        "bench" => cmd_bench(&args[2..]),
        "inspect" => cmd_inspect(&args[2..]),
        "run" => cmd_run(&args[2..]),
        other => {
            eprintln!("Unknown command: {other}");
            usage();
            process::exit(2);
        }
    }
}

fn usage() {
    eprintln!("Usage: qbench <command> [args...]");
    eprintln!("Commands:");
    eprintln!("  bench <artifact.wasm> [--iterations N] [--json]");
    eprintln!("  inspect <artifact.wasm>");
    eprintln!("  run <artifact.wasm> <export> [i32 args...]");
}

fn cmd_bench(args: &[String]) -> Result<()> {
    let mut path: Option<&str> = None;
    let mut iterations = coldstart::DEFAULT_ITERATIONS;
    let mut json = false;

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--iterations" => {
                let n = it.next().context("--iterations needs a value")?;
                iterations = n
                    .parse()
                    .with_context(|| format!("bad iteration count {n:?}"))?;
            }
            "--json" => json = true,
            other if path.is_none() => path = Some(other),
            other => bail!("unexpected argument {other:?}"),
        }
    }
    let Some(path) = path else {
        usage();
        process::exit(2);
    };

    let rt = Runtime::new();
    let samples = coldstart::run_iters(&rt, path, iterations)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&samples)?);
        return Ok(());
    }

    println!("cold start: {path}, {} iterations", samples.len());
    println!(
        "{:>5}  {:>14}  {:>14}  {:>14}",
        "iter", "instantiate", "init", "total"
    );
    for (i, s) in samples.iter().enumerate() {
        println!(
            "{i:>5}  {:>11.3} ms  {:>11.3} ms  {:>11.3} ms",
            s.instantiate_ms, s.init_ms, s.total_ms
        );
    }
    summary("instantiate", samples.iter().map(|s| s.instantiate_ms));
    summary("init", samples.iter().map(|s| s.init_ms));
    summary("total", samples.iter().map(|s| s.total_ms));
    Ok(())
}

fn summary(label: &str, values: impl Iterator<Item = f64>) {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    println!("{label:>12}: mean {mean:.3} ms, min {min:.3} ms, max {max:.3} ms");
}

fn cmd_inspect(args: &[String]) -> Result<()> {
    let [path] = args else {
        usage();
        process::exit(2);
    };

    let rt = Runtime::new();
    let module = rt.load_module(path)?;

    println!("=== {path} ===");
    println!("imports:");
    for import in module.imports() {
        println!("  {}.{}: {:?}", import.module(), import.name(), import.ty());
    }
    println!("exports:");
    for export in module.exports() {
        println!("  {}: {:?}", export.name(), export.ty());
    }
    Ok(())
}

fn cmd_run(args: &[String]) -> Result<()> {
    if args.len() < 2 {
        usage();
        process::exit(2);
    }
    let path = &args[0];
    let export = &args[1];
    let call_args = args[2..]
        .iter()
        .map(|s| {
            let n = s
                .parse::<i32>()
                .with_context(|| format!("cannot parse {s:?} as i32"))?;
            Ok(Value::I32(n))
        })
        .collect::<Result<Vec<Value>>>()?;

    let rt = Runtime::new();
    let module = rt.load_module(path)?;
    let mut inst = rt.instantiate(&module)?;

    let results = inst.call(export, &call_args)?;
    if results.is_empty() {
        println!("(no return value)");
    } else {
        for v in results {
            println!("{v:?}");
        }
    }
    println!(
        "memory: {} pages, high-water mark {} B",
        inst.memory_pages(),
        inst.high_water_mark()
    );
    Ok(())
}
