//! # gmond-core
//!
//! **One snapshot of every host, from however many gmond daemons you run.**
//!
//! `gmond-core` polls ganglia `gmond` daemons over plain TCP, tokenizes the
//! tag-structured stream each one dumps on connect, and merges the per-host
//! results into a single [`Snapshot`] tagged with the group each host came from.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gmond_core::{Collector, CollectorConfig, GmondConfig};
//!
//! let mut config = CollectorConfig::default();
//! config.gmonds.push(GmondConfig::new("head-node", 8649));
//! config.do_cpus = true;
//!
//! let snapshot = Collector::from_config(&config).snapshot();
//! for (host, record) in snapshot.iter() {
//!     println!("{host}: reported {} via group {}", record.reported_at, record.group);
//! }
//! ```
//!
//! ## Architecture
//!
//! Endpoints → Transport (raw bytes) → Tokenizer → Stream Parser → tag → Merge
//!
//! - **Transport**: [`TcpTransport`] connects, drains the socket until the
//!   daemon closes it, and hands back the payload as text.
//! - **Tokenizer / Stream Parser**: [`protocol`] splits the payload on
//!   whitespace and runs a small marker-driven scan over `<HOST` and
//!   `<METRIC` tokens, keeping only metrics in the [`MetricAllowList`].
//! - **Merge**: [`Snapshot::merge`] is first-write-wins across groups, in
//!   configured endpoint order.
//!
//! Unreachable daemons are not errors: they contribute nothing to the
//! snapshot and are reported in the per-endpoint [`EndpointReport`].

pub mod collector;
pub mod config;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod record;
pub mod transport;

pub use collector::{Collection, Collector, EndpointReport};
pub use config::{CollectorConfig, DEFAULT_DEAD_TIMEOUT_SECS, DEFAULT_GMOND_PORT, GmondConfig};
pub use error::{Error, Result};
pub use metrics::{CPU_METRICS, MetricAllowList, STANDARD_METRICS};
pub use protocol::{ParseMode, StreamParser, quoted_value, tokenize};
pub use record::{HostMap, HostRecord, MergeStats, Snapshot, tag_group, unix_secs_now};
pub use transport::{Endpoint, TcpTransport, Transport};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
