//! Memory hierarchy construction.
//!
//! This module wires the memory-side collaborators from configuration. It performs:
//! 1. **Channel:** Selects a fixed-latency or queueing channel from `config.memory.controller`.
//! 2. **Shared Level:** Places the optional shared cache in front of the channel.
//! 3. **Prefetcher:** Places the optional prefetch engine in front of the shared level,
//!    on the data path only.
//! 4. **Core Ports:** Creates one instruction and one data filter cache per core.
//! 5. **Invalidation Edges:** Registers every holder with the level above it, so
//!    evictions travel back towards the cores.
//!
//! Requests flow core → (prefetcher) → (shared cache) → channel; invalidations flow
//! the reverse way along weak edges.

use std::sync::{Arc, Weak};
use std::time::Instant;

use tracing::debug;

use crate::common::{ConfigError, ReqFlags};
use crate::config::{Config, MemoryController, Prefetcher as PrefetcherType};
use crate::core::OooCore;
use crate::mem::{
    FilterCache, Invalidate, Md1Memory, MemObject, MemoryPort, PhaseClock, SimpleMemory,
    TimingCache,
};
use crate::prefetch::{AmpmPrefetcher, PrefetchEngine, StridePrefetcher};
use crate::stats::{ChannelStats, PrefetchStats, SimStats};
use crate::trace::TraceSink;

/// The memory channel at the bottom of the hierarchy.
#[derive(Debug, Clone)]
pub enum Channel {
    /// Fixed latency.
    Simple(Arc<SimpleMemory>),
    /// M/D/1 queueing latency.
    Md1(Arc<Md1Memory>),
}

impl Channel {
    fn mem_object(&self) -> Arc<dyn MemObject> {
        match self {
            Self::Simple(mem) => Arc::clone(mem) as Arc<dyn MemObject>,
            Self::Md1(mem) => Arc::clone(mem) as Arc<dyn MemObject>,
        }
    }

    /// Traffic counters of the channel.
    pub fn stats(&self) -> ChannelStats {
        match self {
            Self::Simple(mem) => mem.stats(),
            Self::Md1(mem) => mem.stats(),
        }
    }
}

/// The configured prefetch engine.
#[derive(Debug, Clone)]
enum PrefetchUnit {
    Stride(Arc<PrefetchEngine<StridePrefetcher>>),
    Ampm(Arc<PrefetchEngine<AmpmPrefetcher>>),
}

impl PrefetchUnit {
    fn mem_object(&self) -> Arc<dyn MemObject> {
        match self {
            Self::Stride(pf) => Arc::clone(pf) as Arc<dyn MemObject>,
            Self::Ampm(pf) => Arc::clone(pf) as Arc<dyn MemObject>,
        }
    }

    fn invalidation_edge(&self) -> Weak<dyn Invalidate> {
        match self {
            Self::Stride(pf) => invalidation_edge(pf),
            Self::Ampm(pf) => invalidation_edge(pf),
        }
    }

    fn attach_child(&self, child: Weak<dyn Invalidate>) {
        match self {
            Self::Stride(pf) => pf.attach_child(child),
            Self::Ampm(pf) => pf.attach_child(child),
        }
    }

    fn stats(&self) -> PrefetchStats {
        match self {
            Self::Stride(pf) => pf.stats(),
            Self::Ampm(pf) => pf.stats(),
        }
    }
}

fn invalidation_edge<T: Invalidate + 'static>(holder: &Arc<T>) -> Weak<dyn Invalidate> {
    Arc::downgrade(holder) as Weak<dyn Invalidate>
}

/// The two first-level ports of one core.
#[derive(Debug, Clone)]
pub struct CorePorts {
    /// Instruction cache.
    pub l1i: Arc<FilterCache>,
    /// Data cache.
    pub l1d: Arc<FilterCache>,
}

/// Builder for [`Hierarchy`].
#[derive(Debug)]
pub struct HierarchyBuilder {
    config: Config,
    cores: u32,
    trace_sink: Option<TraceSink>,
}

impl HierarchyBuilder {
    /// Starts from `config` with a single core.
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            cores: 1,
            trace_sink: None,
        }
    }

    /// Sets the number of cores.
    #[must_use]
    pub const fn cores(mut self, cores: u32) -> Self {
        self.cores = cores;
        self
    }

    /// Traces into `sink` instead of `config.sim.trace_path`.
    #[must_use]
    pub fn trace_sink(mut self, sink: TraceSink) -> Self {
        self.trace_sink = Some(sink);
        self
    }

    /// Validates the configuration and builds the hierarchy.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid, no core was
    /// requested, or the trace file cannot be created.
    pub fn build(self) -> Result<Hierarchy, ConfigError> {
        let config = self.config;
        config.validate()?;
        if self.cores == 0 {
            return Err(ConfigError::invalid("cores", "must be nonzero"));
        }

        let clock = Arc::new(PhaseClock::new(config.sim.phase_length));
        let channel = match config.memory.controller {
            MemoryController::Simple => {
                Channel::Simple(Arc::new(SimpleMemory::new("mem", config.memory.latency)))
            }
            MemoryController::Md1 => Channel::Md1(Arc::new(Md1Memory::new(
                "mem",
                &config.memory,
                config.sim.min_update_cycles,
                Arc::clone(&clock),
            ))),
        };
        let mem = channel.mem_object();

        let l2_config = &config.cache.l2;
        let l2 = if l2_config.enabled {
            Some(Arc::new(TimingCache::new("l2", l2_config, Arc::clone(&mem))?))
        } else {
            None
        };
        let shared: Arc<dyn MemObject> = match &l2 {
            Some(l2) => Arc::clone(l2) as Arc<dyn MemObject>,
            None => mem,
        };

        let prefetch = match l2_config.prefetcher {
            PrefetcherType::None => None,
            PrefetcherType::Stride => Some(PrefetchUnit::Stride(Arc::new(PrefetchEngine::new(
                "pf-stride",
                StridePrefetcher::new(),
                Arc::clone(&shared),
            )))),
            PrefetcherType::Ampm => Some(PrefetchUnit::Ampm(Arc::new(PrefetchEngine::new(
                "pf-ampm",
                AmpmPrefetcher::new(l2_config.ampm_pages, l2_config.prefetch_degree),
                Arc::clone(&shared),
            )))),
        };
        let data_parent = prefetch
            .as_ref()
            .map_or_else(|| Arc::clone(&shared), PrefetchUnit::mem_object);
        if let (Some(l2), Some(pf)) = (&l2, &prefetch) {
            l2.attach_child(pf.invalidation_edge());
        }

        let mut ports = Vec::with_capacity(self.cores as usize);
        for core_id in 0..self.cores {
            let l1i = Arc::new(
                FilterCache::new(
                    format!("l1i-{core_id}"),
                    core_id,
                    &config.cache.l1i,
                    Arc::clone(&shared),
                )?
                .with_flags(ReqFlags::IFETCH),
            );
            let l1d = Arc::new(FilterCache::new(
                format!("l1d-{core_id}"),
                core_id,
                &config.cache.l1d,
                Arc::clone(&data_parent),
            )?);

            if let Some(l2) = &l2 {
                l2.attach_child(invalidation_edge(&l1i));
            }
            match (&prefetch, &l2) {
                (Some(pf), _) => pf.attach_child(invalidation_edge(&l1d)),
                (None, Some(l2)) => l2.attach_child(invalidation_edge(&l1d)),
                (None, None) => {}
            }
            ports.push(CorePorts { l1i, l1d });
        }

        let trace_sink = match (self.trace_sink, &config.sim.trace_path) {
            (Some(sink), _) => Some(sink),
            (None, Some(path)) => Some(TraceSink::create(path)?),
            (None, None) => None,
        };

        debug!(
            cores = self.cores,
            l2 = l2.is_some(),
            prefetcher = ?l2_config.prefetcher,
            controller = ?config.memory.controller,
            "memory hierarchy built"
        );
        Ok(Hierarchy {
            start_time: Instant::now(),
            clock,
            channel,
            l2,
            prefetch,
            ports,
            trace_sink,
            config,
        })
    }
}

/// A built memory hierarchy shared by all cores.
#[derive(Debug)]
pub struct Hierarchy {
    config: Config,
    start_time: Instant,
    clock: Arc<PhaseClock>,
    channel: Channel,
    l2: Option<Arc<TimingCache>>,
    prefetch: Option<PrefetchUnit>,
    ports: Vec<CorePorts>,
    trace_sink: Option<TraceSink>,
}

impl Hierarchy {
    /// Configuration the hierarchy was built from.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Shared phase clock.
    pub const fn clock(&self) -> &Arc<PhaseClock> {
        &self.clock
    }

    /// Memory channel.
    pub const fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Shared cache, if enabled.
    pub const fn l2(&self) -> Option<&Arc<TimingCache>> {
        self.l2.as_ref()
    }

    /// Per-core first-level ports.
    pub fn ports(&self) -> &[CorePorts] {
        &self.ports
    }

    /// Builds core `core_id` on top of its ports.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the hierarchy has no ports for `core_id`
    /// or the core geometry is invalid.
    pub fn build_core(&self, core_id: u32) -> Result<OooCore, ConfigError> {
        let ports = self.ports.get(core_id as usize).ok_or_else(|| {
            ConfigError::invalid(
                "cores",
                format!("no ports for core {core_id} of {}", self.ports.len()),
            )
        })?;
        let l1i: Arc<dyn MemoryPort> = ports.l1i.clone();
        let l1d: Arc<dyn MemoryPort> = ports.l1d.clone();
        let mut builder = OooCore::builder(format!("core-{core_id}"))
            .core_id(core_id)
            .core_config(&self.config.core)
            .l1i(l1i)
            .l1d(l1d)
            .clock(Arc::clone(&self.clock))
            .trace_ifetch(self.config.sim.trace_ifetch);
        if let Some(sink) = &self.trace_sink {
            builder = builder.trace_sink(sink.clone());
        }
        builder.build()
    }

    /// Flushes the access trace, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the trace cannot be written.
    pub fn flush_trace(&self) -> Result<(), ConfigError> {
        if let Some(sink) = &self.trace_sink {
            sink.flush()?;
        }
        Ok(())
    }

    /// Collects statistics of `cores` and every level of the hierarchy.
    pub fn stats(&self, cores: &[&OooCore]) -> SimStats {
        let mut stats = SimStats::new(self.start_time);
        stats.cores = cores.iter().map(|core| core.stats()).collect();
        for ports in &self.ports {
            stats.caches.push(ports.l1i.stats());
            stats.caches.push(ports.l1d.stats());
        }
        if let Some(l2) = &self.l2 {
            stats.caches.push(l2.stats());
        }
        stats.prefetch = self.prefetch.as_ref().map(PrefetchUnit::stats);
        stats.channel = self.channel.stats();
        stats
    }
}
