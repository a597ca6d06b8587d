//! Collector configuration: which gmonds to poll and what to keep.
//!
//! Stored as JSON. Every field except `gmonds` has a default:
//!
//! ```json
//! {
//!   "gmonds": [
//!     {"host": "head-a", "port": 8649, "url": "http://head-a/ganglia/"},
//!     {"host": "head-b", "port": 8649}
//!   ],
//!   "extra_metrics": ["gpu0_util"],
//!   "do_cpus": true,
//!   "dead_timeout_secs": 120
//! }
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics::MetricAllowList;
use crate::protocol::ParseMode;

/// Port gmond listens on for XML dumps unless told otherwise.
pub const DEFAULT_GMOND_PORT: u16 = 8649;

/// Seconds of silence after which a host is considered dead.
pub const DEFAULT_DEAD_TIMEOUT_SECS: u64 = 120;

/// One configured gmond: address plus the display URL of its group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GmondConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Where a presentation layer should link hosts from this group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_GMOND_PORT
}

impl GmondConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Parses `host[:port][=url]`.
impl FromStr for GmondConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, url) = match s.split_once('=') {
            Some((addr, url)) => (addr.trim(), Some(url.trim())),
            None => (s.trim(), None),
        };
        let (host, port) = match addr.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::Config(format!("bad port in gmond '{s}'")))?;
                (host, port)
            }
            None => (addr, DEFAULT_GMOND_PORT),
        };
        if host.is_empty() {
            return Err(Error::Config(format!("missing host in gmond '{s}'")));
        }
        let mut gmond = GmondConfig::new(host, port);
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            gmond.url = Some(url.to_string());
        }
        Ok(gmond)
    }
}

/// Everything a collection run needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Endpoints in poll and merge-priority order.
    pub gmonds: Vec<GmondConfig>,
    /// Metric names kept in addition to the standard set.
    pub extra_metrics: Vec<String>,
    /// Also keep load and CPU breakdown metrics.
    pub do_cpus: bool,
    /// Only record each host's report time.
    pub report_time_only: bool,
    /// Log unreachable gmonds at debug instead of warn.
    pub quiet: bool,
    /// Staleness threshold for presentation layers; the collector never drops hosts.
    pub dead_timeout_secs: u64,
    /// Per-connection connect timeout. Absent means block like gmond clients do.
    pub connect_timeout_ms: Option<u64>,
    /// Per-read timeout while draining a gmond.
    pub read_timeout_ms: Option<u64>,
    /// Fetch endpoints concurrently. Merge order is unaffected.
    pub parallel: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            gmonds: Vec::new(),
            extra_metrics: Vec::new(),
            do_cpus: false,
            report_time_only: false,
            quiet: false,
            dead_timeout_secs: DEFAULT_DEAD_TIMEOUT_SECS,
            connect_timeout_ms: None,
            read_timeout_ms: None,
            parallel: false,
        }
    }
}

impl CollectorConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject endpoints that can never be polled.
    pub fn validate(&self) -> Result<()> {
        for (i, gmond) in self.gmonds.iter().enumerate() {
            if gmond.host.trim().is_empty() {
                return Err(Error::Config(format!("gmonds[{i}] has an empty host")));
            }
            if gmond.port == 0 {
                return Err(Error::Config(format!(
                    "gmonds[{i}] ({}) has port 0",
                    gmond.host
                )));
            }
        }
        Ok(())
    }

    pub fn allow_list(&self) -> MetricAllowList {
        MetricAllowList::new(self.do_cpus, self.extra_metrics.as_slice())
    }

    pub fn parse_mode(&self) -> ParseMode {
        if self.report_time_only {
            ParseMode::TimeOnly
        } else {
            ParseMode::Full
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Display URL for hosts tagged with `group`.
    pub fn group_url(&self, group: usize) -> Option<&str> {
        self.gmonds.get(group).and_then(|g| g.url.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // -----------------------------------------------------------------------
    // GmondConfig parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_host_only_uses_default_port() {
        let g: GmondConfig = "head".parse().unwrap();
        assert_eq!(g, GmondConfig::new("head", DEFAULT_GMOND_PORT));
    }

    #[test]
    fn test_parse_host_port_url() {
        let g: GmondConfig = "head:8650=http://head/ganglia/".parse().unwrap();
        assert_eq!(g.host, "head");
        assert_eq!(g.port, 8650);
        assert_eq!(g.url.as_deref(), Some("http://head/ganglia/"));
    }

    #[test]
    fn test_parse_rejects_bad_port_and_empty_host() {
        assert!("head:http".parse::<GmondConfig>().is_err());
        assert!(":8649".parse::<GmondConfig>().is_err());
        assert!("head:70000".parse::<GmondConfig>().is_err());
    }

    // -----------------------------------------------------------------------
    // CollectorConfig
    // -----------------------------------------------------------------------

    #[test]
    fn test_defaults_from_minimal_json() {
        let c = CollectorConfig::from_json_str(r#"{"gmonds": [{"host": "a"}]}"#).unwrap();
        assert_eq!(c.gmonds[0].port, DEFAULT_GMOND_PORT);
        assert_eq!(c.dead_timeout_secs, DEFAULT_DEAD_TIMEOUT_SECS);
        assert!(!c.do_cpus);
        assert!(!c.parallel);
        assert_eq!(c.parse_mode(), ParseMode::Full);
        assert!(c.connect_timeout().is_none());
    }

    #[test]
    fn test_validate_rejects_port_zero() {
        let err = CollectorConfig::from_json_str(r#"{"gmonds": [{"host": "a", "port": 0}]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        let err = CollectorConfig::from_json_str("{gmonds").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_allow_list_and_mode() {
        let c = CollectorConfig {
            do_cpus: true,
            report_time_only: true,
            extra_metrics: vec!["gpu0_util".into()],
            ..Default::default()
        };
        let allow = c.allow_list();
        assert!(allow.contains("cpu_idle"));
        assert!(allow.contains("gpu0_util"));
        assert_eq!(c.parse_mode(), ParseMode::TimeOnly);
    }

    #[test]
    fn test_group_url() {
        let c = CollectorConfig {
            gmonds: vec![
                GmondConfig::new("a", 1).with_url("http://a/"),
                GmondConfig::new("b", 2),
            ],
            ..Default::default()
        };
        assert_eq!(c.group_url(0), Some("http://a/"));
        assert_eq!(c.group_url(1), None);
        assert_eq!(c.group_url(9), None);
    }

    #[test]
    fn test_load_roundtrip_from_file() {
        let c = CollectorConfig {
            gmonds: vec![GmondConfig::new("a", 8649)],
            connect_timeout_ms: Some(500),
            ..Default::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(c.to_json_pretty().unwrap().as_bytes()).unwrap();

        let loaded = CollectorConfig::load(file.path()).unwrap();
        assert_eq!(loaded, c);
        assert_eq!(loaded.connect_timeout(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CollectorConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
