//! CLI entry point: loads a raw image, attaches the console and runs until a trap.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pdp11_core::{
    disassemble_one, Dl11, Machine, MachineConfig, RunOutcome, StopReason, TranslationCache,
    DL11_BASE, DL11_LEN,
};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

#[derive(Debug, Parser)]
#[command(name = "pdp11-run", version, about = "Run a raw PDP-11 image until it traps")]
struct Args {
    /// Raw little-endian image file
    image: PathBuf,
    /// Load address, octal or 0x-prefixed hex
    #[arg(short, long, default_value = "1000", value_parser = parse_address)]
    base: u16,
    /// Start address; defaults to the load address
    #[arg(short, long, value_parser = parse_address)]
    entry: Option<u16>,
    /// Run on the plain interpreter instead of the translation cache
    #[arg(long)]
    interpret: bool,
    /// Stop after this many instructions
    #[arg(long)]
    step_limit: Option<u64>,
    /// Text queued on the console receiver before the run
    #[arg(long)]
    input: Option<String>,
    /// Log every instruction (shown with -vvv)
    #[arg(long)]
    trace: bool,
    /// Raise log verbosity; repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_address(text: &str) -> Result<u16, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => u16::from_str_radix(text.strip_prefix("0o").unwrap_or(text), 8),
    };
    parsed.map_err(|err| format!("invalid address {text:?}: {err}"))
}

const fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn machine_for(args: &Args, image: &[u8]) -> Result<Machine> {
    let config = MachineConfig {
        step_limit: args.step_limit,
        tracing_enabled: args.trace,
        ..MachineConfig::default()
    };
    let mut machine = Machine::with_config(&config);
    machine
        .load_image(args.base, image)
        .with_context(|| format!("failed to load {}", args.image.display()))?;

    let input = args.input.as_deref().unwrap_or_default();
    let console = Dl11::new(io::stdout()).with_input(input.as_bytes());
    machine
        .attach(DL11_BASE, DL11_LEN, Box::new(console))
        .context("failed to attach console")?;
    machine.set_pc(args.entry.unwrap_or(args.base));
    Ok(machine)
}

fn report(machine: &Machine, outcome: &RunOutcome) -> ExitCode {
    eprintln!();
    match outcome.stop {
        StopReason::StepLimit => {
            eprintln!("stopped by step limit after {} instructions", outcome.steps);
            eprintln!("{}", machine.registers);
            ExitCode::from(2)
        }
        StopReason::Trap(report) => {
            eprintln!(
                "{} trap (vector {:03o}) at {:06o} after {} instructions",
                report.kind,
                report.vector(),
                report.pc,
                outcome.steps
            );
            if let Some(row) = disassemble_one(report.pc, &machine.memory) {
                eprintln!("  {:06o}: {row}", report.pc);
            }
            eprintln!("{}", machine.registers);
            // halt is the normal way out
            if report.opcode == Some(0) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let image = fs::read(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    let mut machine = machine_for(args, &image)?;
    log::info!(
        "running {} ({} bytes) from {:06o}",
        args.image.display(),
        image.len(),
        machine.registers.pc()
    );

    let outcome = if args.interpret {
        machine.run()
    } else {
        let mut cache = TranslationCache::for_machine(&machine);
        let outcome = cache.run(&mut machine);
        log::info!("translation cache: {:?}", cache.stats());
        outcome
    };
    Ok(report(&machine, &outcome))
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    TermLogger::init(
        level_for(args.verbose),
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("failed to install logger")?;
    run(&args)
}
