//! Per-host records, the merged [`Snapshot`], and the group merge policy.
//!
//! A record's `group` is the index of the configured endpoint it was read
//! from. Merging is first-write-wins: once a host name is in the snapshot,
//! later groups reporting the same name are discarded whole.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Host name → record, as produced by parsing one endpoint's stream.
pub type HostMap = BTreeMap<String, HostRecord>;

/// Metrics reported by one host, with its report time and origin group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Unix seconds from the host's `REPORTED` attribute.
    #[serde(rename = "reported")]
    pub reported_at: i64,
    /// Allow-listed metric name → raw value string.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, String>,
    /// Index of the endpoint this record was sourced from.
    #[serde(rename = "gmond_group")]
    pub group: usize,
}

impl HostRecord {
    /// Fresh record with no metrics, tagged with group 0 until [`tag_group`] runs.
    pub fn new(reported_at: i64) -> Self {
        Self {
            reported_at,
            metrics: BTreeMap::new(),
            group: 0,
        }
    }

    /// Raw value of `metric`, if the host reported it.
    pub fn metric(&self, metric: &str) -> Option<&str> {
        self.metrics.get(metric).map(String::as_str)
    }

    /// Seconds since the host last reported, relative to `now` (negative if in the future).
    pub fn age_secs(&self, now: i64) -> i64 {
        now.saturating_sub(self.reported_at)
    }

    /// Whether the host has been silent for longer than `dead_timeout_secs`.
    pub fn is_dead(&self, now: i64, dead_timeout_secs: u64) -> bool {
        let timeout = i64::try_from(dead_timeout_secs).unwrap_or(i64::MAX);
        self.age_secs(now) > timeout
    }
}

/// Set `group` on every record in one endpoint's parse result.
pub fn tag_group(hosts: &mut HostMap, group: usize) {
    for record in hosts.values_mut() {
        record.group = group;
    }
}

/// Outcome of folding one endpoint's hosts into a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Hosts newly added to the snapshot.
    pub added: usize,
    /// Hosts discarded because an earlier group already reported them.
    pub dropped: usize,
}

/// Merged view of every host across all polled endpoints for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    hosts: HostMap,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one endpoint's tagged hosts into the snapshot.
    ///
    /// The first non-empty contribution is adopted outright. After that, only
    /// host names not already present are added; existing records are never
    /// touched, so the earliest-merged group wins every collision.
    pub fn merge(&mut self, incoming: HostMap) -> MergeStats {
        if self.hosts.is_empty() {
            let added = incoming.len();
            self.hosts = incoming;
            return MergeStats { added, dropped: 0 };
        }

        let mut stats = MergeStats::default();
        for (name, record) in incoming {
            match self.hosts.get(&name) {
                Some(existing) => {
                    log::debug!(
                        "host {name} from group {} already present from group {}, dropping",
                        record.group,
                        existing.group
                    );
                    stats.dropped += 1;
                }
                None => {
                    self.hosts.insert(name, record);
                    stats.added += 1;
                }
            }
        }
        stats
    }

    pub fn get(&self, host: &str) -> Option<&HostRecord> {
        self.hosts.get(host)
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains_key(host)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Hosts in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &HostRecord)> {
        self.hosts.iter()
    }

    /// Host names whose last report is older than `dead_timeout_secs`.
    pub fn dead_hosts(&self, now: i64, dead_timeout_secs: u64) -> Vec<&str> {
        self.hosts
            .iter()
            .filter(|(_, r)| r.is_dead(now, dead_timeout_secs))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Hosts sourced from `group`.
    pub fn hosts_in_group(&self, group: usize) -> impl Iterator<Item = (&String, &HostRecord)> {
        self.hosts.iter().filter(move |(_, r)| r.group == group)
    }

    pub fn into_hosts(self) -> HostMap {
        self.hosts
    }
}

impl From<HostMap> for Snapshot {
    fn from(hosts: HostMap) -> Self {
        Self { hosts }
    }
}

/// Current wall-clock time in unix seconds.
pub fn unix_secs_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
