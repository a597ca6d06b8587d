//! `gmond-collect collect`: one collection run, printed as a table or JSON.

use std::path::Path;

use gmond_core::{Collection, Collector, CollectorConfig, unix_secs_now};

pub struct CollectCommandConfig<'a> {
    pub config_path: Option<&'a str>,
    pub gmonds: &'a [String],
    pub do_cpus: bool,
    pub report_time_only: bool,
    pub extra_metrics: &'a [String],
    pub quiet: bool,
    pub timeout_ms: Option<u64>,
    pub parallel: bool,
    pub dead_timeout_secs: Option<u64>,
    pub json: bool,
    pub output_path: Option<&'a str>,
}

/// Config file (or defaults) with command-line flags layered on top.
///
/// Boolean flags can only switch options on; they never clear a file setting.
pub fn build_config(cmd: &CollectCommandConfig<'_>) -> gmond_core::Result<CollectorConfig> {
    let mut config = match cmd.config_path {
        Some(path) => CollectorConfig::load(Path::new(path))?,
        None => CollectorConfig::default(),
    };

    for arg in cmd.gmonds {
        config.gmonds.push(arg.parse()?);
    }
    config.extra_metrics.extend(cmd.extra_metrics.iter().cloned());
    config.do_cpus |= cmd.do_cpus;
    config.report_time_only |= cmd.report_time_only;
    config.quiet |= cmd.quiet;
    config.parallel |= cmd.parallel;
    if let Some(ms) = cmd.timeout_ms {
        config.connect_timeout_ms = Some(ms);
        config.read_timeout_ms = Some(ms);
    }
    if let Some(secs) = cmd.dead_timeout_secs {
        config.dead_timeout_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

pub fn run(cmd: CollectCommandConfig<'_>) {
    let config = match build_config(&cmd) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };
    if config.gmonds.is_empty() {
        eprintln!("Error: no gmonds configured (use --config or --gmond host:port)");
        std::process::exit(2);
    }

    let collection = Collector::from_config(&config).run();
    let report = json_report(&collection, &config);

    if let Some(path) = cmd.output_path {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => match std::fs::write(path, json) {
                Ok(()) => log::info!("wrote snapshot to {path}"),
                Err(e) => eprintln!("Failed to write {path}: {e}"),
            },
            Err(e) => eprintln!("Failed to serialise snapshot: {e}"),
        }
    }

    if cmd.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialise snapshot: {e}");
                std::process::exit(1);
            }
        }
    } else {
        print_table(&collection, &config);
    }
}

fn json_report(collection: &Collection, config: &CollectorConfig) -> serde_json::Value {
    let now = unix_secs_now();
    serde_json::json!({
        "collected_at": now,
        "dead_timeout_secs": config.dead_timeout_secs,
        "hosts": collection.snapshot,
        "dead_hosts": collection.snapshot.dead_hosts(now, config.dead_timeout_secs),
        "gmonds": collection.endpoints,
    })
}

fn print_table(collection: &Collection, config: &CollectorConfig) {
    let now = unix_secs_now();
    let snapshot = &collection.snapshot;

    println!("\n{}", "=".repeat(68));
    println!("GMOND SNAPSHOT");
    println!("{}", "=".repeat(68));
    println!(
        "Hosts: {} | gmonds reachable: {}/{}",
        snapshot.len(),
        collection.reachable_count(),
        collection.endpoints.len()
    );

    println!(
        "\n{:<28} {:>5} {:>12} {:>7} {:>7}  {}",
        "Host", "Group", "Reported", "Age", "Metrics", ""
    );
    println!("{}", "-".repeat(68));
    for (name, record) in snapshot.iter() {
        let dead = if record.is_dead(now, config.dead_timeout_secs) {
            "DEAD"
        } else {
            ""
        };
        println!(
            "{:<28} {:>5} {:>12} {:>7} {:>7}  {}",
            name,
            record.group,
            record.reported_at,
            super::format_age(record.age_secs(now)),
            record.metrics.len(),
            dead
        );
    }

    println!("\n{:<5} {:<30} {:>6} {:>6} {:>8}  {}", "Group", "gmond", "Parsed", "Merged", "Time", "Status");
    println!("{}", "-".repeat(68));
    for e in &collection.endpoints {
        let status = match &e.error {
            Some(err) => format!("no data: {err}"),
            None => e.url.clone().unwrap_or_else(|| "ok".to_string()),
        };
        println!(
            "{:<5} {:<30} {:>6} {:>6} {:>7.3}s  {}",
            e.group,
            format!("{}:{}", e.host, e.port),
            e.hosts_parsed,
            e.hosts_merged,
            e.elapsed.as_secs_f64(),
            status
        );
    }
}
