//! CLI for gmond-core: poll gmond daemons, print one merged host snapshot.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gmond-collect")]
#[command(about = "gmond-collect: poll ganglia gmond daemons and merge their hosts")]
#[command(version = gmond_core::VERSION)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll every gmond once and print the merged snapshot
    Collect {
        /// JSON config file with gmonds and options
        #[arg(long)]
        config: Option<String>,

        /// gmond to poll as host[:port][=url]; repeatable, appended after config gmonds
        #[arg(long = "gmond")]
        gmonds: Vec<String>,

        /// Also keep load and CPU breakdown metrics
        #[arg(long)]
        cpus: bool,

        /// Only record each host's report time
        #[arg(long)]
        time_only: bool,

        /// Extra metric name to keep; repeatable
        #[arg(long = "extra-metric")]
        extra_metrics: Vec<String>,

        /// Log unreachable gmonds at debug level only
        #[arg(long)]
        quiet: bool,

        /// Per-connection connect and read timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Fetch gmonds concurrently (merge order is unchanged)
        #[arg(long)]
        parallel: bool,

        /// Seconds of silence before a host is marked DEAD
        #[arg(long)]
        dead_timeout: Option<u64>,

        /// Print the snapshot and endpoint reports as JSON
        #[arg(long)]
        json: bool,

        /// Write the JSON snapshot to a file as well
        #[arg(long)]
        output: Option<String>,
    },

    /// List the metric names the parser will keep
    Metrics {
        /// Include load and CPU breakdown metrics
        #[arg(long)]
        cpus: bool,

        /// Extra metric name; repeatable
        #[arg(long = "extra-metric")]
        extra_metrics: Vec<String>,
    },

    /// Print a config file template, optionally seeded with gmonds
    InitConfig {
        /// gmond as host[:port][=url]; repeatable
        #[arg(long = "gmond")]
        gmonds: Vec<String>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Collect {
            config,
            gmonds,
            cpus,
            time_only,
            extra_metrics,
            quiet,
            timeout_ms,
            parallel,
            dead_timeout,
            json,
            output,
        } => commands::collect::run(commands::collect::CollectCommandConfig {
            config_path: config.as_deref(),
            gmonds: &gmonds,
            do_cpus: cpus,
            report_time_only: time_only,
            extra_metrics: &extra_metrics,
            quiet,
            timeout_ms,
            parallel,
            dead_timeout_secs: dead_timeout,
            json,
            output_path: output.as_deref(),
        }),
        Commands::Metrics {
            cpus,
            extra_metrics,
        } => commands::metrics::run(cpus, &extra_metrics),
        Commands::InitConfig { gmonds } => commands::init_config::run(&gmonds),
    }
}
