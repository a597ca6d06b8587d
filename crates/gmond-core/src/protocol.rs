//! Tokenizer and stream parser for the gmond XML dump.
//!
//! This is not an XML parser. gmond writes one tag per line with attributes
//! separated by single spaces, so the stream is split on whitespace and
//! scanned for the `<HOST` and `<METRIC` markers. Attribute values are
//! assumed to contain no whitespace; a value that does will desynchronise
//! the scan for the rest of that host.
//!
//! # Token layout
//!
//! ```text
//! <HOST NAME="n01" IP="10.0.0.1" [TAGS="..."] REPORTED="1700000000" ...>
//! <METRIC NAME="mem_free" VAL="5120" TYPE="float" ...>
//! ```
//!
//! Every `<METRIC` belongs to the most recent `<HOST`.

use std::borrow::Cow;

use crate::metrics::MetricAllowList;
use crate::record::{HostMap, HostRecord};

const HOST_MARKER: &str = "<HOST";
const METRIC_MARKER: &str = "<METRIC";
const REPORTED_ATTR: &str = "REPORTED";
/// gmond >= 3.2 inserts `TAGS` between `IP` and `REPORTED`.
const TAGS_ATTR: &str = "TAGS";

/// What the parser extracts from a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Report time plus every allow-listed metric.
    #[default]
    Full,
    /// Report time only; `<METRIC` tokens are ignored.
    TimeOnly,
}

/// Replace literal `\n` escape sequences with spaces.
///
/// Some gmond front-ends hand over the dump with newlines escaped, which
/// would otherwise glue the last attribute of one tag to the next marker.
pub fn normalize(raw: &str) -> Cow<'_, str> {
    if raw.contains("\\n") {
        Cow::Owned(raw.replace("\\n", " "))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Split a raw payload into whitespace-delimited tokens.
pub fn tokenize(raw: &str) -> Vec<String> {
    normalize(raw)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Text between the first and second `"` of a `KEY="VALUE"` token.
///
/// A token with a single quote yields everything after it.
pub fn quoted_value(token: &str) -> Option<&str> {
    token.split('"').nth(1)
}

/// Outcome of reading a host header starting at a `<HOST` marker.
#[derive(Debug, PartialEq, Eq)]
enum HostHeader<'t> {
    /// Header read; `last` is the index of the `REPORTED` token.
    Host {
        name: &'t str,
        reported_at: i64,
        last: usize,
    },
    /// Header present but unusable; resume after `last`.
    Skipped { last: usize },
    /// Stream ends inside the header.
    Truncated,
}

/// Scan state between tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    SeekMarker,
    ConsumeHostHeader,
}

/// Marker-driven parser over a token slice.
///
/// Token stepping is fixed:
/// - `<HOST` at `i`: name at `i+1`; `REPORTED` at `i+2` when the header has
///   no `IP`, otherwise at `i+3`, or `i+4` if `TAGS` sits at `i+3`.
///   Scanning resumes two past the `REPORTED` token.
/// - `<METRIC` at `i`: name at `i+1`; if allow-listed, value at `i+2` and
///   scanning resumes at `i+4`, otherwise at `i+3`.
/// - Any other token: advance by one.
pub struct StreamParser<'a> {
    allow: &'a MetricAllowList,
    mode: ParseMode,
}

impl<'a> StreamParser<'a> {
    pub fn new(allow: &'a MetricAllowList, mode: ParseMode) -> Self {
        Self { allow, mode }
    }

    /// Tokenize and parse a raw payload.
    pub fn parse_payload(&self, raw: &str) -> HostMap {
        let tokens = tokenize(raw);
        self.parse(&tokens)
    }

    /// Parse a token sequence into per-host records.
    ///
    /// Never fails. A stream cut mid-tag returns what was accumulated.
    pub fn parse<S: AsRef<str>>(&self, tokens: &[S]) -> HostMap {
        let mut hosts = HostMap::new();
        let mut current: Option<String> = None;
        let mut state = ScanState::SeekMarker;
        let mut i = 0;

        while i < tokens.len() {
            match state {
                ScanState::SeekMarker => match tokens[i].as_ref() {
                    HOST_MARKER => {
                        state = ScanState::ConsumeHostHeader;
                        continue;
                    }
                    METRIC_MARKER if self.mode == ParseMode::Full => {
                        match self.read_metric(tokens, i) {
                            Some((last, entry)) => {
                                if let (Some((name, value)), Some(host)) = (entry, &current) {
                                    if let Some(record) = hosts.get_mut(host) {
                                        record.metrics.insert(name.to_string(), value.to_string());
                                    }
                                }
                                i = last + 1;
                            }
                            None => break,
                        }
                    }
                    _ => {}
                },
                ScanState::ConsumeHostHeader => {
                    state = ScanState::SeekMarker;
                    match read_host_header(tokens, i) {
                        HostHeader::Host {
                            name,
                            reported_at,
                            last,
                        } => {
                            hosts.insert(name.to_string(), HostRecord::new(reported_at));
                            current = Some(name.to_string());
                            i = last + 1;
                        }
                        HostHeader::Skipped { last } => {
                            log::debug!("skipping unreadable host header at token {i}");
                            current = None;
                            i = last + 1;
                        }
                        HostHeader::Truncated => break,
                    }
                }
            }
            i += 1;
        }

        hosts
    }

    /// Read a metric tag at `marker`.
    ///
    /// Returns the index of the last consumed token and the `(name, value)`
    /// pair if the name is allow-listed. `None` means the stream ended.
    fn read_metric<'t, S: AsRef<str>>(
        &self,
        tokens: &'t [S],
        marker: usize,
    ) -> Option<(usize, Option<(&'t str, &'t str)>)> {
        let name_tok = tokens.get(marker + 1)?.as_ref();
        let Some(name) = quoted_value(name_tok).filter(|n| self.allow.contains(n)) else {
            return Some((marker + 1, None));
        };
        let value_tok = tokens.get(marker + 2)?.as_ref();
        let value = quoted_value(value_tok).unwrap_or_default();
        Some((marker + 2, Some((name, value))))
    }
}

fn read_host_header<S: AsRef<str>>(tokens: &[S], marker: usize) -> HostHeader<'_> {
    let Some(name_tok) = tokens.get(marker + 1).map(|t| t.as_ref()) else {
        return HostHeader::Truncated;
    };
    let Some(name) = quoted_value(name_tok) else {
        return HostHeader::Skipped { last: marker };
    };

    let Some(pos) = reported_index(tokens, marker) else {
        return HostHeader::Truncated;
    };
    let reported = tokens[pos].as_ref();
    match quoted_value(reported).and_then(|v| v.parse::<i64>().ok()) {
        Some(reported_at) => HostHeader::Host {
            name,
            reported_at,
            last: pos,
        },
        None => HostHeader::Skipped { last: pos },
    }
}

/// Index of the `REPORTED` token for the header at `marker`, if in bounds.
fn reported_index<S: AsRef<str>>(tokens: &[S], marker: usize) -> Option<usize> {
    let compact = tokens.get(marker + 2)?.as_ref();
    if compact.starts_with(REPORTED_ATTR) {
        return Some(marker + 2);
    }
    let pos = marker + 3;
    if tokens.get(pos)?.as_ref().starts_with(TAGS_ATTR) {
        tokens.get(pos + 1)?;
        return Some(pos + 1);
    }
    Some(pos)
}
