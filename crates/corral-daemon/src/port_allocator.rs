//! Port allocator (C4, §4.4): leases of `k` consecutive free TCP ports from a
//! bounded range.
//!
//! The lease map is a single `std::sync::Mutex`-guarded set -- allocation is rare
//! and latency-sensitive only insofar as it must not block the whole process, so a
//! plain mutex (not an async one) held only across the bind-probe loop is the
//! simplest correct thing, matching the "single exclusive critical section" shared-
//! resource policy in §5.

use std::collections::HashSet;
use std::net::{SocketAddr, TcpListener};
use std::sync::Mutex;

use corral_core::Config;
use tracing::debug;

/// Bind-probes `port` on loopback; a successful bind (closed immediately) means the
/// port is currently free at the OS level.
fn port_is_free(port: u16) -> bool {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpListener::bind(addr).is_ok()
}

/// Leases of consecutive TCP ports within `[range_start, range_end]` (inclusive).
pub struct PortAllocator {
    range_start: u16,
    range_end: u16,
    leased: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new(range_start: u16, range_end: u16) -> Self {
        Self {
            range_start,
            range_end,
            leased: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.port_range.start_port, config.port_range.end_port)
    }

    /// Finds the smallest starting port `p` such that `[p, p+count-1]` are all
    /// unleased and currently bindable, leases them as one atomic group, and
    /// returns them. Returns `None` (without leasing anything) if no such window
    /// exists, or if `count == 0`.
    pub fn allocate(&self, count: usize) -> Option<Vec<u16>> {
        if count == 0 {
            return None;
        }
        let count_u16 = u16::try_from(count).ok()?;
        if self.range_end < self.range_start {
            return None;
        }
        let span = self.range_end - self.range_start + 1;
        if count_u16 > span {
            return None;
        }
        let last_start = self.range_end - count_u16 + 1;

        let mut leased = self.leased.lock().expect("port allocator mutex poisoned");

        let mut candidate = self.range_start;
        while candidate <= last_start {
            let window: Vec<u16> = (candidate..candidate + count_u16).collect();
            let window_free = window.iter().all(|p| !leased.contains(p) && port_is_free(*p));

            if window_free {
                for p in &window {
                    leased.insert(*p);
                }
                debug!("allocated ports {:?}", window);
                return Some(window);
            }

            candidate += 1;
        }

        None
    }

    /// Releases a previously-allocated port set back to the pool. Releasing ports
    /// not currently leased (or an empty slice) is a no-op.
    pub fn release(&self, ports: &[u16]) {
        if ports.is_empty() {
            return;
        }
        let mut leased = self.leased.lock().expect("port allocator mutex poisoned");
        for p in ports {
            leased.remove(p);
        }
        debug!("released ports {:?}", ports);
    }

    /// Snapshot of every port currently leased by this allocator, sorted ascending.
    pub fn list_allocated(&self) -> Vec<u16> {
        let leased = self.leased.lock().expect("port allocator mutex poisoned");
        let mut ports: Vec<u16> = leased.iter().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// True iff this allocator currently leases `port`.
    pub fn is_in_use(&self, port: u16) -> bool {
        self.leased
            .lock()
            .expect("port allocator mutex poisoned")
            .contains(&port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn allocate_returns_consecutive_ports() {
        let alloc = PortAllocator::new(30000, 30010);
        let ports = alloc.allocate(3).expect("should allocate");
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[1], ports[0] + 1);
        assert_eq!(ports[2], ports[0] + 2);
    }

    #[test]
    fn allocate_zero_returns_none() {
        let alloc = PortAllocator::new(30000, 30010);
        assert!(alloc.allocate(0).is_none());
    }

    #[test]
    fn allocate_more_than_range_returns_none() {
        let alloc = PortAllocator::new(30000, 30001);
        assert!(alloc.allocate(5).is_none());
    }

    #[test]
    fn round_trip_allocate_release_allocate_yields_same_ports() {
        let alloc = PortAllocator::new(30100, 30110);
        let first = alloc.allocate(2).expect("first allocation");
        alloc.release(&first);
        let second = alloc.allocate(2).expect("second allocation");
        assert_eq!(first, second);
    }

    #[test]
    fn exhaustion_returns_none_once_all_ports_leased() {
        let alloc = PortAllocator::new(30200, 30201);
        let first = alloc.allocate(2).expect("first allocation");
        assert!(alloc.allocate(2).is_none());
        alloc.release(&first);
        assert!(alloc.allocate(2).is_some());
    }

    #[test]
    fn concurrent_allocations_are_disjoint() {
        let alloc = Arc::new(PortAllocator::new(30300, 30400));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let alloc = Arc::clone(&alloc);
            handles.push(std::thread::spawn(move || alloc.allocate(2)));
        }
        let mut seen = HashSet::new();
        for h in handles {
            if let Some(ports) = h.join().unwrap() {
                for p in ports {
                    assert!(seen.insert(p), "port {p} allocated twice");
                }
            }
        }
    }

    #[test]
    fn is_in_use_reflects_leased_set() {
        let alloc = PortAllocator::new(30500, 30510);
        let ports = alloc.allocate(2).unwrap();
        assert!(alloc.is_in_use(ports[0]));
        alloc.release(&ports);
        assert!(!alloc.is_in_use(ports[0]));
    }

    #[test]
    fn list_allocated_reflects_current_leases() {
        let alloc = PortAllocator::new(30600, 30610);
        let ports = alloc.allocate(2).unwrap();
        assert_eq!(alloc.list_allocated(), ports);
    }
}
