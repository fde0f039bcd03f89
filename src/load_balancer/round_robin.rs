//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{target::Target, LoadBalancer};

/// Round-robin selector.
///
/// The cursor points at the index the next scan starts from. A scan only
/// wins if the cursor is unchanged when it advances it past the selected
/// index, so concurrent callers each start from a different position.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_target(&self, targets: &[Arc<Target>]) -> Option<Arc<Target>> {
        let len = targets.len();
        if len == 0 {
            return None;
        }

        let mut start = self.cursor.load(Ordering::Acquire);
        loop {
            let index = (0..len)
                .map(|i| (start + i) % len)
                .find(|&idx| targets[idx].is_alive())?;

            match self.cursor.compare_exchange_weak(
                start,
                (index + 1) % len,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(targets[index].clone()),
                Err(current) => start = current,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn targets(n: u16) -> Vec<Arc<Target>> {
        (0..n)
            .map(|i| Arc::new(Target::parse(&format!("http://127.0.0.1:{}", 8081 + i), true).unwrap()))
            .collect()
    }

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let backends = targets(2);

        let s1 = lb.next_target(&backends).unwrap();
        assert_eq!(s1.key(), backends[0].key());

        let s2 = lb.next_target(&backends).unwrap();
        assert_eq!(s2.key(), backends[1].key());

        let s3 = lb.next_target(&backends).unwrap();
        assert_eq!(s3.key(), backends[0].key());
    }

    #[test]
    fn test_each_target_once_per_cycle() {
        let lb = RoundRobin::new();
        let backends = targets(5);

        for _ in 0..3 {
            let seen: HashSet<String> = (0..5)
                .map(|_| lb.next_target(&backends).unwrap().key().to_string())
                .collect();
            assert_eq!(seen.len(), 5);
        }
    }

    #[test]
    fn test_skips_dead_target() {
        let lb = RoundRobin::new();
        let backends = targets(3);
        backends[1].set_alive(false);

        let picked: Vec<String> = (0..6)
            .map(|_| lb.next_target(&backends).unwrap().key().to_string())
            .collect();
        let expected: Vec<String> = [0, 2, 0, 2, 0, 2]
            .iter()
            .map(|&i| backends[i].key().to_string())
            .collect();
        assert_eq!(picked, expected);
    }

    #[test]
    fn test_all_dead_or_empty() {
        let lb = RoundRobin::new();
        assert!(lb.next_target(&[]).is_none());

        let backends = targets(3);
        for b in &backends {
            b.set_alive(false);
        }
        assert!(lb.next_target(&backends).is_none());
    }

    #[test]
    fn test_cursor_survives_shrinking_pool() {
        let lb = RoundRobin::new();
        let backends = targets(4);
        for _ in 0..3 {
            lb.next_target(&backends);
        }
        let shrunk = &backends[..2];
        assert!(lb.next_target(shrunk).is_some());
    }

    #[test]
    fn test_concurrent_callers_spread_load() {
        let lb = Arc::new(RoundRobin::new());
        let backends = Arc::new(targets(4));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lb = lb.clone();
                let backends = backends.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| lb.next_target(&backends).unwrap().key().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts = std::collections::HashMap::new();
        for h in handles {
            for key in h.join().unwrap() {
                *counts.entry(key).or_insert(0usize) += 1;
            }
        }
        // Every successful advance moves the cursor past the winner, so the
        // 800 picks split evenly across the 4 targets.
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&c| c == 200));
    }
}
