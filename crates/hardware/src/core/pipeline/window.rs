//! Issue window with per-cycle execution port occupancy.
//!
//! The window tracks, for every future cycle, which execution ports are taken and
//! how many micro-ops are scheduled to dispatch then. Its key properties:
//! 1. **Bounded Occupancy:** At most `capacity` micro-ops wait for dispatch at once;
//!    scheduling into a full window first advances the current cycle.
//! 2. **Port Selection:** A micro-op dispatches at the first cycle, no earlier than
//!    requested, with a free port in its mask; the lowest free port wins.
//! 3. **Non-pipelined Units:** Extra slots keep the chosen port busy on later cycles
//!    without occupying window entries.

use std::collections::BTreeMap;

/// Port usage of one cycle.
#[derive(Clone, Copy, Debug, Default)]
struct WinCycle {
    /// Busy ports, one bit per port.
    occ_units: u8,
    /// Micro-ops dispatching this cycle.
    count: u16,
}

/// Issue window keyed by absolute cycle.
#[derive(Clone, Debug)]
pub struct IssueWindow {
    cycles: BTreeMap<u64, WinCycle>,
    occupancy: usize,
    capacity: usize,
    last_port: u8,
}

impl IssueWindow {
    /// Creates an empty window holding at most `capacity` waiting micro-ops.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "issue window needs at least one entry");
        Self {
            cycles: BTreeMap::new(),
            occupancy: 0,
            capacity,
            last_port: 0,
        }
    }

    /// Micro-ops scheduled but not yet dispatched.
    #[inline]
    pub const fn occupancy(&self) -> usize {
        self.occupancy
    }

    /// Window size.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ports busy at `cycle`.
    pub fn busy_ports(&self, cycle: u64) -> u8 {
        self.cycles.get(&cycle).map_or(0, |wc| wc.occ_units)
    }

    /// Moves `cur_cycle` forward by one, dispatching everything scheduled at it.
    pub fn advance_pos(&mut self, cur_cycle: &mut u64) {
        if let Some(wc) = self.cycles.remove(cur_cycle) {
            self.occupancy -= wc.count as usize;
        }
        *cur_cycle += 1;
    }

    /// Advances `cur_cycle` to `target`.
    ///
    /// Cycles are stepped one at a time while micro-ops remain; once the window
    /// drains the rest of the distance is skipped at once.
    ///
    /// # Panics
    ///
    /// Panics if `target` is behind `cur_cycle`.
    pub fn long_advance(&mut self, cur_cycle: &mut u64, target: u64) {
        assert!(
            *cur_cycle <= target,
            "long advance moves backwards: cur {} target {target}",
            *cur_cycle
        );
        while self.occupancy > 0 && *cur_cycle < target {
            self.advance_pos(cur_cycle);
        }
        if self.occupancy == 0 {
            // Only port reservations of extra slots can remain; drop the stale ones.
            self.cycles = self.cycles.split_off(&target);
            *cur_cycle = target;
        }
    }

    /// Schedules a micro-op requesting dispatch at `sched_cycle`.
    ///
    /// On return `sched_cycle` holds the actual dispatch cycle, and `cur_cycle` may
    /// have advanced if the window was full.
    ///
    /// # Arguments
    ///
    /// * `cur_cycle` - Current issue cycle; advanced while the window is full.
    /// * `sched_cycle` - Requested dispatch cycle; raised to the granted one.
    /// * `port_mask` - Ports the micro-op may use.
    /// * `extra_slots` - Extra cycles the chosen port stays busy after dispatch.
    ///
    /// # Panics
    ///
    /// Panics if `port_mask` is empty.
    pub fn schedule(
        &mut self,
        cur_cycle: &mut u64,
        sched_cycle: &mut u64,
        port_mask: u8,
        extra_slots: u32,
    ) {
        assert!(port_mask != 0, "micro-op has no execution ports");
        while self.occupancy == self.capacity {
            self.advance_pos(cur_cycle);
        }

        let mut cycle = (*sched_cycle).max(*cur_cycle);
        loop {
            let wc = self.cycles.entry(cycle).or_default();
            let avail = !wc.occ_units & port_mask;
            if avail != 0 {
                let port = avail.trailing_zeros() as u8;
                wc.occ_units |= 1 << port;
                wc.count += 1;
                self.last_port = port;
                self.occupancy += 1;
                break;
            }
            cycle += 1;
        }
        *sched_cycle = cycle;

        let shadow_mask = 1u8 << self.last_port;
        let mut extra_cycle = cycle + 1;
        for _ in 0..extra_slots {
            extra_cycle = self.reserve_port(*cur_cycle, extra_cycle, shadow_mask) + 1;
        }
    }

    /// Marks `mask` busy from `from` until a cycle where it was free, returning that cycle.
    fn reserve_port(&mut self, cur_cycle: u64, from: u64, mask: u8) -> u64 {
        let mut cycle = from.max(cur_cycle);
        loop {
            let wc = self.cycles.entry(cycle).or_default();
            let avail = !wc.occ_units & mask;
            wc.occ_units |= mask;
            if avail != 0 {
                return cycle;
            }
            cycle += 1;
        }
    }
}
