//! Fluent builders for micro-ops, basic blocks, and cores under test.

use std::sync::Arc;

use ooosim_core::OooCore;
use ooosim_core::config::CoreConfig;
use ooosim_core::core::{BasicBlock, Uop, UopKind};
use ooosim_core::mem::{MemoryPort, PhaseClock};

use super::mocks::ScriptedPort;

/// Integer ports.
pub const ALU_PORTS: u8 = 0b0000_0111;

/// Load and store ports.
pub const MEM_PORTS: u8 = 0b0011_0000;

/// Single-cycle ALU micro-op with no operands.
pub const fn alu() -> Uop {
    Uop::new(UopKind::General, ALU_PORTS)
}

/// Load micro-op writing `rd`.
pub const fn load(rd: u8) -> Uop {
    Uop::new(UopKind::Load, MEM_PORTS).with_dests(rd, 0)
}

/// Store data micro-op reading `rs`.
pub const fn store(rs: u8) -> Uop {
    Uop::new(UopKind::Store, MEM_PORTS).with_sources(rs, 0)
}

/// Store address micro-op taking `lat` cycles.
pub const fn store_addr(lat: u16) -> Uop {
    Uop::new(UopKind::StoreAddr, MEM_PORTS).with_latency(lat)
}

/// Block at `addr` holding `uops`, one four-byte instruction per micro-op.
pub fn block(addr: u64, uops: Vec<Uop>) -> Arc<BasicBlock> {
    let n = uops.len();
    Arc::new(BasicBlock::new(addr, n as u64 * 4, n as u32, uops))
}

/// Block of `n` independent ALU micro-ops decoded four per cycle.
pub fn alu_block(addr: u64, n: u16) -> Arc<BasicBlock> {
    let uops = (0..n).map(|i| alu().with_dec_cycle(i / 4)).collect();
    block(addr, uops)
}

/// A core wired to scripted ports, with handles kept for inspection.
#[derive(Debug)]
pub struct CoreRig {
    /// Core under test.
    pub core: OooCore,
    /// Instruction port.
    pub l1i: Arc<ScriptedPort>,
    /// Data port.
    pub l1d: Arc<ScriptedPort>,
    /// Phase clock the core was built with.
    pub clock: Arc<PhaseClock>,
}

/// Builder for [`CoreRig`].
#[derive(Debug)]
pub struct CoreRigBuilder {
    config: CoreConfig,
    fetch_latency: u64,
    load_latency: u64,
    store_latency: u64,
    phase_length: u64,
}

impl Default for CoreRigBuilder {
    fn default() -> Self {
        Self {
            config: CoreConfig::default(),
            fetch_latency: 1,
            load_latency: 2,
            store_latency: 2,
            phase_length: 10_000,
        }
    }
}

impl CoreRigBuilder {
    /// Starts from the default core geometry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the core geometry.
    #[must_use]
    pub const fn config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Instruction fetch latency.
    #[must_use]
    pub const fn fetch_latency(mut self, latency: u64) -> Self {
        self.fetch_latency = latency;
        self
    }

    /// Data load and store latencies.
    #[must_use]
    pub const fn data_latencies(mut self, load: u64, store: u64) -> Self {
        self.load_latency = load;
        self.store_latency = store;
        self
    }

    /// Cycles per phase.
    #[must_use]
    pub const fn phase_length(mut self, cycles: u64) -> Self {
        self.phase_length = cycles;
        self
    }

    /// Builds the core.
    pub fn build(self) -> CoreRig {
        let l1i = Arc::new(ScriptedPort::new(self.fetch_latency));
        let l1d = Arc::new(ScriptedPort::with_latencies(
            self.load_latency,
            self.store_latency,
        ));
        let clock = Arc::new(PhaseClock::new(self.phase_length));
        let l1i_port: Arc<dyn MemoryPort> = l1i.clone();
        let l1d_port: Arc<dyn MemoryPort> = l1d.clone();
        let core = OooCore::builder("core-0")
            .core_config(&self.config)
            .l1i(l1i_port)
            .l1d(l1d_port)
            .clock(Arc::clone(&clock))
            .build()
            .unwrap_or_else(|err| panic!("invalid test core: {err}"));
        CoreRig {
            core,
            l1i,
            l1d,
            clock,
        }
    }
}
