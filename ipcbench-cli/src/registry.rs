//! Probe registry
//!
//! Maps symbolic probe names to a closed set of probe kinds. The dispatcher
//! dispatches by tagged variant; each kind carries its own configuration
//! slice (loop size for latency, payload/chunk/threads for bandwidth).

/// Latency probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyProbe {
    /// Sequentially consistent atomic flag flip between two threads.
    Atomic,
    /// Release/acquire atomic flag flip between two threads.
    AtomicRelAcq,
    /// Cross-process barrier round.
    Barrier,
    /// Condition-variable ping-pong between two threads.
    ConditionVariable,
    /// Named-semaphore ping-pong between two processes.
    Semaphore,
    /// statfs() syscall.
    Statfs,
    /// fstatfs() syscall.
    Fstatfs,
    /// getpid() syscall.
    Getpid,
}

impl LatencyProbe {
    /// Every latency probe, in reporting order.
    pub const ALL: [LatencyProbe; 8] = [
        LatencyProbe::Atomic,
        LatencyProbe::AtomicRelAcq,
        LatencyProbe::Barrier,
        LatencyProbe::ConditionVariable,
        LatencyProbe::Semaphore,
        LatencyProbe::Statfs,
        LatencyProbe::Fstatfs,
        LatencyProbe::Getpid,
    ];

    /// Canonical probe name.
    pub fn name(self) -> &'static str {
        match self {
            LatencyProbe::Atomic => "latency_atomic",
            LatencyProbe::AtomicRelAcq => "latency_atomic_rel_acq",
            LatencyProbe::Barrier => "latency_barrier",
            LatencyProbe::ConditionVariable => "latency_condition_variable",
            LatencyProbe::Semaphore => "latency_semaphore",
            LatencyProbe::Statfs => "latency_statfs",
            LatencyProbe::Fstatfs => "latency_fstatfs",
            LatencyProbe::Getpid => "latency_getpid",
        }
    }

    /// Inner-loop count used when `--loop-size` is not given. Barrier
    /// rounds and blocking ping-pongs are orders of magnitude slower than
    /// atomic flips or syscalls, so their defaults are smaller.
    pub fn default_loop_size(self) -> u64 {
        match self {
            LatencyProbe::Atomic | LatencyProbe::AtomicRelAcq => 1_000_000,
            LatencyProbe::Barrier => 1_000,
            LatencyProbe::ConditionVariable | LatencyProbe::Semaphore => 100_000,
            LatencyProbe::Statfs | LatencyProbe::Fstatfs | LatencyProbe::Getpid => 1_000_000,
        }
    }
}

/// Bandwidth probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandwidthProbe {
    /// Single-threaded in-process memcpy.
    Memcpy,
    /// Multi-threaded in-process memcpy.
    MemcpyMt,
    /// TCP over loopback.
    Tcp,
    /// Unix-domain stream socket.
    Uds,
    /// Anonymous pipe.
    Pipe,
    /// Named pipe (FIFO).
    Fifo,
    /// POSIX message queue.
    Mq,
    /// Memory-mapped file through the pipelined double buffer.
    Mmap,
    /// POSIX shared memory through the pipelined double buffer.
    Shm,
}

impl BandwidthProbe {
    /// Every bandwidth probe, in reporting order.
    pub const ALL: [BandwidthProbe; 9] = [
        BandwidthProbe::Memcpy,
        BandwidthProbe::MemcpyMt,
        BandwidthProbe::Tcp,
        BandwidthProbe::Uds,
        BandwidthProbe::Pipe,
        BandwidthProbe::Fifo,
        BandwidthProbe::Mq,
        BandwidthProbe::Mmap,
        BandwidthProbe::Shm,
    ];

    /// Canonical probe name.
    pub fn name(self) -> &'static str {
        match self {
            BandwidthProbe::Memcpy => "bandwidth_memcpy",
            BandwidthProbe::MemcpyMt => "bandwidth_memcpy_mt",
            BandwidthProbe::Tcp => "bandwidth_tcp",
            BandwidthProbe::Uds => "bandwidth_uds",
            BandwidthProbe::Pipe => "bandwidth_pipe",
            BandwidthProbe::Fifo => "bandwidth_fifo",
            BandwidthProbe::Mq => "bandwidth_mq",
            BandwidthProbe::Mmap => "bandwidth_mmap",
            BandwidthProbe::Shm => "bandwidth_shm",
        }
    }

    /// Whether the probe streams in chunks (false for the pure memcpy
    /// variants, which move the whole payload in one copy).
    pub fn uses_chunk(self) -> bool {
        !matches!(self, BandwidthProbe::Memcpy | BandwidthProbe::MemcpyMt)
    }
}

/// What the positional argument selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// One latency probe.
    Latency(LatencyProbe),
    /// One bandwidth probe.
    Bandwidth(BandwidthProbe),
    /// All latency probes.
    LatencyAll,
    /// All bandwidth probes.
    BandwidthAll,
    /// Everything.
    All,
}

impl Selection {
    /// Whether any bandwidth probe runs under this selection.
    pub fn includes_bandwidth(self) -> bool {
        !matches!(self, Selection::Latency(_) | Selection::LatencyAll)
    }

    /// Whether any chunk-streaming probe runs under this selection.
    pub fn includes_chunked(self) -> bool {
        match self {
            Selection::Bandwidth(p) => p.uses_chunk(),
            Selection::BandwidthAll | Selection::All => true,
            Selection::Latency(_) | Selection::LatencyAll => false,
        }
    }
}

/// Resolve a probe or aggregate name.
pub fn lookup(name: &str) -> Option<Selection> {
    match name {
        "all" => return Some(Selection::All),
        "latency_all" => return Some(Selection::LatencyAll),
        "bandwidth_all" => return Some(Selection::BandwidthAll),
        _ => {}
    }
    for probe in LatencyProbe::ALL {
        if probe.name() == name {
            return Some(Selection::Latency(probe));
        }
    }
    for probe in BandwidthProbe::ALL {
        if probe.name() == name {
            return Some(Selection::Bandwidth(probe));
        }
    }
    None
}

/// Every selectable name, for the unknown-probe error message.
pub fn known_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = LatencyProbe::ALL.iter().map(|p| p.name()).collect();
    names.push("latency_all");
    names.extend(BandwidthProbe::ALL.iter().map(|p| p.name()));
    names.push("bandwidth_all");
    names.push("all");
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_canonical_name_resolves() {
        for name in known_names() {
            assert!(lookup(name).is_some(), "{name} did not resolve");
        }
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        assert!(lookup("latency_sockets").is_none());
        assert!(lookup("").is_none());
        assert!(lookup("bandwidth").is_none());
    }

    #[test]
    fn aggregates_resolve_to_aggregates() {
        assert_eq!(lookup("all"), Some(Selection::All));
        assert_eq!(lookup("latency_all"), Some(Selection::LatencyAll));
        assert_eq!(lookup("bandwidth_all"), Some(Selection::BandwidthAll));
    }

    #[test]
    fn chunk_usage_excludes_memcpy() {
        assert!(!BandwidthProbe::Memcpy.uses_chunk());
        assert!(!BandwidthProbe::MemcpyMt.uses_chunk());
        assert!(BandwidthProbe::Pipe.uses_chunk());
        assert!(BandwidthProbe::Shm.uses_chunk());
    }

    #[test]
    fn latency_defaults_match_probe_cost() {
        assert_eq!(LatencyProbe::Atomic.default_loop_size(), 1_000_000);
        assert_eq!(LatencyProbe::Barrier.default_loop_size(), 1_000);
        assert_eq!(LatencyProbe::Semaphore.default_loop_size(), 100_000);
    }
}
