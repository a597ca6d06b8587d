//! Metric allow-list: the only metric names the stream parser will record.

use std::collections::HashSet;

/// Memory, disk, swap and boot time, always collected.
pub const STANDARD_METRICS: &[&str] = &[
    "mem_free",
    "mem_cached",
    "mem_shared",
    "mem_buffers",
    "mem_total",
    "disk_free",
    "disk_total",
    "swap_free",
    "swap_total",
    "boottime",
];

/// Load and CPU breakdown, collected when CPU metrics are requested.
pub const CPU_METRICS: &[&str] = &[
    "load_one",
    "cpu_user",
    "cpu_nice",
    "cpu_system",
    "cpu_idle",
    "cpu_wio",
    "cpu_num",
];

/// Ordered, de-duplicated set of metric names the parser may store.
#[derive(Debug, Clone, Default)]
pub struct MetricAllowList {
    names: Vec<String>,
    lookup: HashSet<String>,
}

impl MetricAllowList {
    /// Standard metrics, then CPU metrics if `do_cpus`, then `extra`.
    pub fn new<S: AsRef<str>>(do_cpus: bool, extra: &[S]) -> Self {
        let mut list = Self::default();
        list.extend(STANDARD_METRICS.iter().copied());
        if do_cpus {
            list.extend(CPU_METRICS.iter().copied());
        }
        list.extend(extra.iter().map(|s| s.as_ref()));
        list
    }

    /// Allow-list containing exactly `names`, without the standard set.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut list = Self::default();
        list.extend(names.iter().map(|s| s.as_ref()));
        list
    }

    fn extend<'a>(&mut self, names: impl Iterator<Item = &'a str>) {
        for name in names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            if self.lookup.insert(name.to_string()) {
                self.names.push(name.to_string());
            }
        }
    }

    /// Whether `name` may be recorded.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains(name)
    }

    /// Names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
