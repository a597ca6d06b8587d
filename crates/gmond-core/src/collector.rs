//! Collection run: poll every configured gmond and merge into one snapshot.
//!
//! Architecture:
//! 1. Number endpoints by configured position (the group index)
//! 2. Fetch each payload, serially or on scoped threads
//! 3. Tokenize + parse each payload into a per-endpoint host map
//! 4. Tag every record with its endpoint's group
//! 5. Merge into the snapshot in configured order, first write wins
//!
//! Steps 2-3 may run concurrently; step 5 always runs on the calling thread
//! in endpoint order, so collisions resolve the same way regardless of
//! which daemon answers first.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::CollectorConfig;
use crate::error::{Error, Result};
use crate::metrics::MetricAllowList;
use crate::protocol::{ParseMode, StreamParser};
use crate::record::{HostMap, Snapshot, tag_group};
use crate::transport::{Endpoint, TcpTransport, Transport};

/// What happened to one endpoint during a run.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointReport {
    pub group: usize,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Hosts found in this endpoint's stream.
    pub hosts_parsed: usize,
    /// Hosts that made it into the snapshot (the rest collided with earlier groups).
    pub hosts_merged: usize,
    /// Transport failure, if the endpoint contributed nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_ms")]
    pub elapsed: Duration,
}

impl EndpointReport {
    pub fn reachable(&self) -> bool {
        self.error.is_none()
    }
}

fn serialize_ms<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Result of one run: the merged snapshot plus per-endpoint reports.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub snapshot: Snapshot,
    /// One entry per configured endpoint, in configured order.
    pub endpoints: Vec<EndpointReport>,
}

impl Collection {
    pub fn reachable_count(&self) -> usize {
        self.endpoints.iter().filter(|e| e.reachable()).count()
    }
}

struct Target {
    endpoint: Endpoint,
    url: Option<String>,
}

struct Fetched {
    hosts: Result<HostMap>,
    elapsed: Duration,
}

/// Polls gmond endpoints and merges their hosts.
pub struct Collector<T: Transport = TcpTransport> {
    transport: T,
    targets: Vec<Target>,
    allow: MetricAllowList,
    mode: ParseMode,
    quiet: bool,
    parallel: bool,
}

impl Collector<TcpTransport> {
    /// Collector over TCP with the config's timeouts.
    pub fn from_config(config: &CollectorConfig) -> Self {
        let transport = TcpTransport::new()
            .with_connect_timeout(config.connect_timeout())
            .with_read_timeout(config.read_timeout());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Collector<T> {
    /// Collector that fetches through `transport`.
    pub fn with_transport(config: &CollectorConfig, transport: T) -> Self {
        let targets = config
            .gmonds
            .iter()
            .enumerate()
            .map(|(group, g)| Target {
                endpoint: Endpoint::new(g.host.clone(), g.port, group),
                url: g.url.clone(),
            })
            .collect();
        Self {
            transport,
            targets,
            allow: config.allow_list(),
            mode: config.parse_mode(),
            quiet: config.quiet,
            parallel: config.parallel,
        }
    }

    /// Number of configured endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.targets.len()
    }

    pub fn allow_list(&self) -> &MetricAllowList {
        &self.allow
    }

    /// Run a collection and keep only the snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.run().snapshot
    }

    /// Poll every endpoint and merge the results.
    ///
    /// Never fails: unreachable endpoints are reported and skipped. With no
    /// endpoints, or none reachable, the snapshot is empty.
    pub fn run(&self) -> Collection {
        let fetched = if self.parallel && self.targets.len() > 1 {
            self.fetch_parallel()
        } else {
            self.targets
                .iter()
                .map(|t| self.fetch_one(&t.endpoint))
                .collect()
        };

        let mut collection = Collection::default();
        for (target, fetched) in self.targets.iter().zip(fetched) {
            let endpoint = &target.endpoint;
            let mut report = EndpointReport {
                group: endpoint.group,
                host: endpoint.host.clone(),
                port: endpoint.port,
                url: target.url.clone(),
                hosts_parsed: 0,
                hosts_merged: 0,
                error: None,
                elapsed: fetched.elapsed,
            };

            match fetched.hosts {
                Ok(mut hosts) => {
                    tag_group(&mut hosts, endpoint.group);
                    report.hosts_parsed = hosts.len();
                    let stats = collection.snapshot.merge(hosts);
                    report.hosts_merged = stats.added;
                    log::info!(
                        "group {} ({}): {} hosts, {} merged, {} already present",
                        endpoint.group,
                        endpoint.address(),
                        report.hosts_parsed,
                        stats.added,
                        stats.dropped
                    );
                }
                Err(e) => {
                    if self.quiet {
                        log::debug!("no data from {}: {e}", endpoint.address());
                    } else {
                        log::warn!("no data from {}: {e}", endpoint.address());
                    }
                    report.error = Some(e.to_string());
                }
            }
            collection.endpoints.push(report);
        }

        collection
    }

    fn fetch_one(&self, endpoint: &Endpoint) -> Fetched {
        let t0 = Instant::now();
        let parser = StreamParser::new(&self.allow, self.mode);
        let hosts = self
            .transport
            .fetch(endpoint)
            .map(|payload| parser.parse_payload(&payload));
        Fetched {
            hosts,
            elapsed: t0.elapsed(),
        }
    }

    /// Fetch and parse every endpoint on its own scoped thread.
    ///
    /// Results come back in configured order because handles are joined in
    /// spawn order.
    fn fetch_parallel(&self) -> Vec<Fetched> {
        std::thread::scope(|s| {
            let handles: Vec<_> = self
                .targets
                .iter()
                .map(|t| s.spawn(move || self.fetch_one(&t.endpoint)))
                .collect();

            handles
                .into_iter()
                .zip(&self.targets)
                .map(|(handle, t)| {
                    handle.join().unwrap_or_else(|_| Fetched {
                        hosts: Err(Error::WorkerPanicked(t.endpoint.address())),
                        elapsed: Duration::ZERO,
                    })
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GmondConfig;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory transport keyed by `host:port`; missing keys are refused.
    #[derive(Default)]
    struct FakeTransport {
        payloads: HashMap<String, String>,
        delays: HashMap<String, Duration>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn with(mut self, addr: &str, payload: &str) -> Self {
            self.payloads.insert(addr.to_string(), payload.to_string());
            self
        }

        fn delayed(mut self, addr: &str, delay: Duration) -> Self {
            self.delays.insert(addr.to_string(), delay);
            self
        }
    }

    impl Transport for FakeTransport {
        fn fetch(&self, endpoint: &Endpoint) -> Result<String> {
            let addr = endpoint.address();
            self.calls.lock().unwrap().push(addr.clone());
            if let Some(delay) = self.delays.get(&addr) {
                std::thread::sleep(*delay);
            }
            self.payloads.get(&addr).cloned().ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                ))
            })
        }
    }

    fn config(gmonds: &[&str]) -> CollectorConfig {
        CollectorConfig {
            gmonds: gmonds.iter().map(|g| g.parse::<GmondConfig>().unwrap()).collect(),
            ..Default::default()
        }
    }

    // -----------------------------------------------------------------------
    // Orchestration
    // -----------------------------------------------------------------------

    #[test]
    fn test_zero_endpoints_empty_snapshot() {
        let collector = Collector::with_transport(&config(&[]), FakeTransport::default());
        let run = collector.run();
        assert!(run.snapshot.is_empty());
        assert!(run.endpoints.is_empty());
    }

    #[test]
    fn test_all_unreachable_empty_snapshot() {
        let collector = Collector::with_transport(&config(&["a:1", "b:2"]), FakeTransport::default());
        let run = collector.run();
        assert!(run.snapshot.is_empty());
        assert_eq!(run.endpoints.len(), 2);
        assert_eq!(run.reachable_count(), 0);
        assert!(run.endpoints.iter().all(|e| e.error.is_some()));
    }

    #[test]
    fn test_unreachable_endpoint_skipped() {
        let transport = FakeTransport::default().with("b:2", r#"<HOST NAME="h2" REPORTED="5" />"#);
        let run = Collector::with_transport(&config(&["a:1", "b:2"]), transport).run();

        assert_eq!(run.snapshot.len(), 1);
        let h2 = run.snapshot.get("h2").unwrap();
        assert_eq!(h2.group, 1);
        assert!(!run.endpoints[0].reachable());
        assert_eq!(run.endpoints[1].hosts_merged, 1);
    }

    #[test]
    fn test_collision_first_configured_wins() {
        let transport = FakeTransport::default()
            .with("a:1", r#"<HOST NAME="a" REPORTED="100" />"#)
            .with("b:2", r#"<HOST NAME="a" REPORTED="200" /> <HOST NAME="b" REPORTED="200" />"#);
        let run = Collector::with_transport(&config(&["a:1", "b:2"]), transport).run();

        let a = run.snapshot.get("a").unwrap();
        assert_eq!(a.reported_at, 100);
        assert_eq!(a.group, 0);
        assert_eq!(run.endpoints[1].hosts_parsed, 2);
        assert_eq!(run.endpoints[1].hosts_merged, 1);
    }

    #[test]
    fn test_group_is_configured_index_not_success_count() {
        let transport = FakeTransport::default().with("c:3", r#"<HOST NAME="c" REPORTED="1" />"#);
        let run = Collector::with_transport(&config(&["a:1", "b:2", "c:3"]), transport).run();
        assert_eq!(run.snapshot.get("c").unwrap().group, 2);
    }

    #[test]
    fn test_endpoints_polled_in_configured_order() {
        let transport = FakeTransport::default();
        let collector = Collector::with_transport(&config(&["z:1", "a:2", "m:3"]), transport);
        collector.run();
        let calls = collector.transport.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["z:1", "a:2", "m:3"]);
    }

    #[test]
    fn test_time_only_and_allow_list_from_config() {
        let payload = r#"<HOST NAME="a" REPORTED="1" /> <METRIC NAME="cpu_idle" VAL="90" />"#;
        let mut cfg = config(&["a:1"]);

        let run = Collector::with_transport(&cfg, FakeTransport::default().with("a:1", payload)).run();
        assert!(run.snapshot.get("a").unwrap().metrics.is_empty());

        cfg.do_cpus = true;
        let run = Collector::with_transport(&cfg, FakeTransport::default().with("a:1", payload)).run();
        assert_eq!(run.snapshot.get("a").unwrap().metric("cpu_idle"), Some("90"));

        cfg.report_time_only = true;
        let run = Collector::with_transport(&cfg, FakeTransport::default().with("a:1", payload)).run();
        assert!(run.snapshot.get("a").unwrap().metrics.is_empty());
    }

    // -----------------------------------------------------------------------
    // Parallel fetch
    // -----------------------------------------------------------------------

    #[test]
    fn test_parallel_merge_order_independent_of_completion() {
        let transport = FakeTransport::default()
            .with("slow:1", r#"<HOST NAME="a" REPORTED="100" />"#)
            .with("fast:2", r#"<HOST NAME="a" REPORTED="200" />"#)
            .delayed("slow:1", Duration::from_millis(150));
        let mut cfg = config(&["slow:1", "fast:2"]);
        cfg.parallel = true;

        let run = Collector::with_transport(&cfg, transport).run();
        let a = run.snapshot.get("a").unwrap();
        assert_eq!(a.reported_at, 100);
        assert_eq!(a.group, 0);
        assert_eq!(run.endpoints[0].host, "slow");
        assert_eq!(run.endpoints[1].host, "fast");
    }

    #[test]
    fn test_report_serializes_elapsed_ms() {
        let transport = FakeTransport::default().with("a:1", "");
        let run = Collector::with_transport(&config(&["a:1=http://a/"]), transport).run();
        let json = serde_json::to_value(&run.endpoints[0]).unwrap();
        assert_eq!(json["url"], "http://a/");
        assert!(json["elapsed_ms"].is_u64());
        assert!(json.get("error").is_none());
    }
}
