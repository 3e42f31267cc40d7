//! Timing structures of the out-of-order backend.
//!
//! None of these structures hold instructions; each one only remembers the cycles
//! at which its entries free up, which is all the core needs to compute stalls.
//! It includes the following components:
//! 1. **Retire Trackers:** Reorder buffer, load queue and store queue with a retire width.
//! 2. **Cycle Queue:** The decoded micro-op queue between decode and issue.
//! 3. **Issue Window:** Per-cycle port occupancy bounded by the window size.
//! 4. **Scoreboard:** Ready cycle of every register.
//! 5. **Forwarding Table:** Completion cycle of recent stores by address.
//! 6. **Traits:** The allocation/retirement interface shared by the trackers.

/// Circular queue that records the cycle each entry left.
pub mod cycle_queue;

/// Store-to-load forwarding table.
pub mod forwarding;

/// Retire-width-limited circular tracker (ROB, load queue, store queue).
pub mod rob;

/// Register ready-cycle scoreboard.
pub mod scoreboard;

/// Tracker interface.
pub mod traits;

/// Issue window with per-cycle port occupancy.
pub mod window;

pub use cycle_queue::CycleQueue;
pub use forwarding::ForwardingTable;
pub use rob::ReorderBuffer;
pub use scoreboard::RegScoreboard;
pub use traits::ResourceTracker;
pub use window::IssueWindow;
