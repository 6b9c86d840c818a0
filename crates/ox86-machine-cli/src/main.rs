//! Native runner for `ox86_machine::Machine`: load a BIOS image, reset, and
//! single-step with full tracing available.
#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ox86_machine::{Machine, MachineConfig, RunExit};

#[derive(Debug, Parser)]
#[command(about = "Native runner for ox86_machine::Machine (BIOS boot debugging)")]
struct Args {
    /// BIOS ROM image, mapped so its last byte sits at the top of the first
    /// megabyte.
    #[arg(long)]
    bios: PathBuf,

    /// Guest RAM size in MiB.
    #[arg(long, default_value_t = 32)]
    ram: usize,

    /// Stop after executing at most N instructions.
    #[arg(long, default_value_t = 100_000)]
    max_insts: u64,

    /// Log filter, e.g. `trace` for per-instruction traces. Overrides
    /// RUST_LOG.
    #[arg(long)]
    log: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match &args.log {
        Some(spec) => EnvFilter::try_new(spec).context("invalid --log filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let ram_size_bytes = args
        .ram
        .checked_mul(1024 * 1024)
        .context("RAM size overflow")?;

    let mut machine = Machine::new(MachineConfig { ram_size_bytes });
    machine
        .load_bios_file(&args.bios)
        .with_context(|| format!("loading BIOS image {}", args.bios.display()))?;
    machine.reset()?;

    match machine.run(args.max_insts)? {
        RunExit::Halted => info!("guest halted"),
        RunExit::MaxInstructions => info!("instruction budget of {} exhausted", args.max_insts),
    }

    info!("{}", machine.cpu().registers());
    Ok(())
}
