//! Out-of-order timing model CLI.
//!
//! This binary drives the timing model without an instrumentation front end. It performs:
//! 1. **Configuration:** Loads a JSON configuration, or uses the built-in defaults.
//! 2. **Workload:** Feeds every core a synthetic loop of strided loads and stores.
//! 3. **Phases:** Runs one thread per core; threads meet at a barrier after each
//!    phase, where one of them advances the shared phase clock.
//! 4. **Report:** Prints the selected statistics sections.

use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ooosim_core::core::{BasicBlock, Uop, UopKind};
use ooosim_core::stats::STATS_SECTIONS;
use ooosim_core::{Config, Hierarchy, HierarchyBuilder, OooCore};

/// Integer ALU ports.
const ALU_PORTS: u8 = 0b0000_0111;

/// Branch port.
const BRANCH_PORTS: u8 = 0b0000_1000;

/// Load and store ports.
const MEM_PORTS: u8 = 0b0011_0000;

/// Address of the loop body; the exit block follows it.
const LOOP_PC: u64 = 0x40_0000;

/// Loop iterations between two runs of the exit block.
const TRIP_COUNT: u64 = 16;

#[derive(Parser, Debug)]
#[command(
    name = "ooosim",
    author,
    version,
    about = "Out-of-order core timing model",
    long_about = "Times a synthetic strided loop on one or more out-of-order cores sharing a cache and a memory channel.\n\nExamples:\n  ooosim --phases 200\n  ooosim --config model.json --cores 4 --sections core,memory\n  RUST_LOG=ooosim_core=debug ooosim --cores 2"
)]
struct Cli {
    /// JSON configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cores to simulate, one thread each.
    #[arg(short = 'n', long, default_value_t = 1)]
    cores: u32,

    /// Synchronization phases to run.
    #[arg(short, long, default_value_t = 100)]
    phases: u64,

    /// Bytes between consecutive loads of the stream.
    #[arg(long, default_value_t = 64)]
    stride: u64,

    /// Bytes each core touches before its stream wraps around.
    #[arg(long, default_value_t = 8 * 1024 * 1024)]
    footprint: u64,

    /// Statistics sections to print, comma separated; all when omitted.
    #[arg(short, long, value_delimiter = ',')]
    sections: Vec<String>,
}

/// Per-core synthetic loop.
///
/// The body loads two streams, combines them, stores the result, and ends in a
/// backward branch taken on all but every `TRIP_COUNT`-th iteration. The exit
/// block is a short run of independent ALU work.
struct LoopWorkload {
    body: Arc<BasicBlock>,
    exit: Arc<BasicBlock>,
    base: u64,
    stride: u64,
    footprint: u64,
    iter: u64,
    in_body: bool,
}

impl LoopWorkload {
    fn new(core_id: u32, stride: u64, footprint: u64) -> Self {
        let body = vec![
            Uop::new(UopKind::Load, MEM_PORTS).with_dests(1, 0),
            Uop::new(UopKind::Load, MEM_PORTS).with_dests(2, 0),
            Uop::new(UopKind::General, ALU_PORTS)
                .with_sources(1, 2)
                .with_dests(3, 0)
                .with_latency(3)
                .with_dec_cycle(1),
            Uop::new(UopKind::StoreAddr, MEM_PORTS).with_dec_cycle(1),
            Uop::new(UopKind::Store, MEM_PORTS)
                .with_sources(3, 0)
                .with_dec_cycle(1),
            Uop::new(UopKind::General, ALU_PORTS)
                .with_sources(4, 0)
                .with_dests(4, 0)
                .with_dec_cycle(2),
            Uop::new(UopKind::General, BRANCH_PORTS)
                .with_sources(4, 0)
                .with_dec_cycle(2),
        ];
        let exit = (0..8u16)
            .map(|i| {
                Uop::new(UopKind::General, ALU_PORTS)
                    .with_dests(5 + (i % 4) as u8, 0)
                    .with_dec_cycle(i / 4)
            })
            .collect();

        Self {
            body: Arc::new(BasicBlock::new(LOOP_PC, 24, 6, body)),
            exit: Arc::new(BasicBlock::new(LOOP_PC + 24, 32, 8, exit)),
            base: 0x1000_0000 * u64::from(core_id + 1),
            stride: stride.max(1),
            footprint: footprint.max(64),
            iter: 0,
            in_body: true,
        }
    }

    /// Hands the next block to `core` together with its accesses and branch outcome.
    fn step(&mut self, core: &mut OooCore) {
        if !self.in_body {
            core.advance(Arc::clone(&self.exit));
            self.in_body = true;
            return;
        }

        core.advance(Arc::clone(&self.body));
        let offset = (self.iter * self.stride) % self.footprint;
        core.record_load(self.base + offset, 8);
        core.record_load(self.base + self.footprint + offset, 8);
        core.record_store(self.base + 2 * self.footprint + offset, 8);

        self.iter += 1;
        let taken = self.iter % TRIP_COUNT != 0;
        let branch_pc = self.body.addr + self.body.bytes - 4;
        core.branch_outcome(branch_pc, taken, self.body.addr, self.exit.addr);
        self.in_body = taken;
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Some(unknown) = cli
        .sections
        .iter()
        .find(|s| !STATS_SECTIONS.contains(&s.as_str()))
    {
        return Err(format!(
            "unknown stats section `{unknown}` (expected one of: {})",
            STATS_SECTIONS.join(", ")
        )
        .into());
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let hierarchy = HierarchyBuilder::new(&config).cores(cli.cores).build()?;
    info!(
        cores = cli.cores,
        phases = cli.phases,
        phase_length = config.sim.phase_length,
        "starting run"
    );

    let cores = run(&hierarchy, &cli)?;
    hierarchy.flush_trace()?;

    let refs: Vec<&OooCore> = cores.iter().collect();
    hierarchy.stats(&refs).print_sections(&cli.sections);
    Ok(())
}

/// Runs every core on its own thread for `cli.phases` phases.
fn run(hierarchy: &Hierarchy, cli: &Cli) -> Result<Vec<OooCore>, Box<dyn Error>> {
    let cores = (0..cli.cores)
        .map(|id| hierarchy.build_core(id))
        .collect::<Result<Vec<_>, _>>()?;
    let barrier = Barrier::new(cores.len());

    thread::scope(|s| {
        let handles: Vec<_> = cores
            .into_iter()
            .map(|mut core| {
                let barrier = &barrier;
                let mut workload = LoopWorkload::new(core.core_id(), cli.stride, cli.footprint);
                s.spawn(move || {
                    for _ in 0..cli.phases {
                        while !core.needs_barrier() {
                            workload.step(&mut core);
                        }
                        if barrier.wait().is_leader() {
                            let _ = hierarchy.clock().advance_phase();
                        }
                        let _ = barrier.wait();
                        core.take_barrier();
                    }
                    core
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .map_err(|_| Box::<dyn Error>::from("core thread panicked"))
            })
            .collect()
    })
}
