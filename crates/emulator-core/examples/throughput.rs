//! Instruction throughput of the interpreter versus the translation cache.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --release -p pdp11-core --example throughput
//! ```
//!
//! Each workload is a tight loop that ends in `halt`. The loop counter is
//! reloaded and the program rerun until the measurement window closes.

#![allow(clippy::pedantic, clippy::nursery)]

use log as _;
use pdp11_core::{Machine, MachineConfig, StopReason, TranslationCache, TrapKind};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use std::time::{Duration, Instant};

const CODE_BASE: u16 = 0o1000;

#[derive(Debug, Clone, Copy)]
struct Workload {
    name: &'static str,
    code: &'static [u16],
}

const WORKLOADS: &[Workload] = &[
    Workload {
        name: "count",
        // mov #177777, r0; dec r0; bne .-2; halt
        code: &[0o012700, 0o177777, 0o005300, 0o001376, 0o000000],
    },
    Workload {
        name: "alu",
        // mov #77777, r0; add r0, r1; bic r2, r1; bis r0, r2; dec r0; bne .-10; halt
        code: &[
            0o012700, 0o077777, 0o060001, 0o040201, 0o050002, 0o005300, 0o001373, 0o000000,
        ],
    },
    Workload {
        name: "memory",
        // mov #77777, r0; mov #20000, r1; mov r0, (r1)+; mov -(r1), r2;
        // inc @#20000; dec r0; bne .-12; halt
        code: &[
            0o012700, 0o077777, 0o012701, 0o020000, 0o010021, 0o014102, 0o005237, 0o020000,
            0o005300, 0o001372, 0o000000,
        ],
    },
];

#[derive(Debug, Clone, Copy)]
struct BenchmarkResult {
    name: &'static str,
    interpreted: f64,
    cached: f64,
}

fn prepare(workload: &Workload) -> Machine {
    let mut machine = Machine::with_config(&MachineConfig::default());
    let image: Vec<u8> = workload
        .code
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect();
    if let Err(err) = machine.load_image(CODE_BASE, &image) {
        panic!("{}: {err}", workload.name);
    }
    machine.set_pc(CODE_BASE);
    machine
}

fn rearm(machine: &mut Machine) {
    machine.traps.clear();
    machine.set_pc(CODE_BASE);
}

fn measure(workload: &Workload, duration: Duration, cached: bool) -> f64 {
    let mut machine = prepare(workload);
    let mut cache = TranslationCache::for_machine(&machine);
    let mut total_instructions = 0u64;
    let start = Instant::now();

    while start.elapsed() < duration {
        let outcome = if cached {
            cache.run(&mut machine)
        } else {
            machine.run()
        };
        match outcome.stop {
            StopReason::Trap(report) if report.kind == TrapKind::IllegalInstruction => {}
            other => panic!("{} stopped unexpectedly: {other:?}", workload.name),
        }
        total_instructions += outcome.steps;
        rearm(&mut machine);
    }

    total_instructions as f64 / start.elapsed().as_secs_f64()
}

fn benchmark(workload: &Workload, duration: Duration) -> BenchmarkResult {
    BenchmarkResult {
        name: workload.name,
        interpreted: measure(workload, duration, false),
        cached: measure(workload, duration, true),
    }
}

fn format_number(n: f64) -> String {
    if n >= 1_000_000_000.0 {
        format!("{:.2}G", n / 1_000_000_000.0)
    } else if n >= 1_000_000.0 {
        format!("{:.2}M", n / 1_000_000.0)
    } else if n >= 1_000.0 {
        format!("{:.2}K", n / 1_000.0)
    } else {
        format!("{n:.2}")
    }
}

fn print_results(results: &[BenchmarkResult]) {
    println!("{:10} {:>14} {:>14} {:>8}", "workload", "interp/sec", "cached/sec", "speedup");
    for result in results {
        println!(
            "{:10} {:>14} {:>14} {:>7.2}x",
            result.name,
            format_number(result.interpreted),
            format_number(result.cached),
            result.cached / result.interpreted
        );
    }
}

fn main() {
    let warmup = Duration::from_millis(200);
    let window = Duration::from_secs(2);

    println!("Running warmup for {warmup:?}...");
    let _ = benchmark(&WORKLOADS[0], warmup);

    println!("Running each workload for {window:?} per path...\n");
    let results: Vec<BenchmarkResult> = WORKLOADS
        .iter()
        .map(|workload| benchmark(workload, window))
        .collect();
    print_results(&results);
}
