//! I/O and search counters.
//!
//! Counters are plain atomics so that read-only queries can update them
//! through a shared reference. [`ProfileStats`] aggregates snapshots taken
//! over a series of operations (per query, per insertion, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! profile_counters {
    ($($name:ident),* $(,)?) => {
        /// Live counters of one tree handle.
        #[derive(Debug, Default)]
        pub struct Profile {
            $(pub(crate) $name: AtomicU64,)*
        }

        impl Profile {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn snapshot(&self) -> ProfileSnapshot {
                ProfileSnapshot {
                    $($name: self.$name.load(Ordering::Relaxed),)*
                }
            }

            pub fn reset(&self) {
                $(self.$name.store(0, Ordering::Relaxed);)*
            }
        }

        /// Counter values at one point in time.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct ProfileSnapshot {
            $(pub $name: u64,)*
        }

        impl ProfileSnapshot {
            /// Counter names and values, in declaration order.
            pub fn counters(&self) -> Vec<(&'static str, u64)> {
                vec![$((stringify!($name), self.$name),)*]
            }

            /// Difference of two snapshots, saturating at zero.
            pub fn since(&self, earlier: &ProfileSnapshot) -> ProfileSnapshot {
                ProfileSnapshot {
                    $($name: self.$name.saturating_sub(earlier.$name),)*
                }
            }
        }
    };
}

profile_counters!(
    super_block_reads,
    super_block_writes,
    node_block_reads,
    node_block_writes,
    leaf_block_reads,
    leaf_block_writes,
    node_splits,
    leaf_splits,
    visited_nodes,
    visited_leaves,
    compared_node_entries,
    compared_leaf_entries,
    equal_distances,
    farther_spheres,
    farther_rects,
);

impl Profile {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

impl fmt::Display for ProfileSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.counters() {
            writeln!(f, "{:<24} {}", name, value)?;
        }
        Ok(())
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Count, sum, minimum and maximum of one series of samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avg={:.3} min={} max={} (n={})",
            self.avg(),
            self.min,
            self.max,
            self.count
        )
    }
}

/// Per-counter summaries over a series of profile samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
    counters: Vec<(String, Summary)>,
}

impl ProfileStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one sample, typically `after.since(&before)` around a single operation.
    pub fn add_sample(&mut self, sample: &ProfileSnapshot) {
        let values = sample.counters();
        if self.counters.is_empty() {
            self.counters = values
                .iter()
                .map(|(name, _)| (name.to_string(), Summary::default()))
                .collect();
        }
        for ((_, summary), (_, value)) in self.counters.iter_mut().zip(values) {
            summary.add(value as f64);
        }
    }

    pub fn num_samples(&self) -> u64 {
        self.counters.first().map(|(_, s)| s.count).unwrap_or(0)
    }

    pub fn get(&self, name: &str) -> Option<&Summary> {
        self.counters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, summary)| summary)
    }
}

impl fmt::Display for ProfileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, summary) in &self.counters {
            writeln!(f, "{:<24} {}", name, summary)?;
        }
        Ok(())
    }
}
