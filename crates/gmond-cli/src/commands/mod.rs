pub mod collect;
pub mod init_config;
pub mod metrics;

use gmond_core::GmondConfig;

/// Parse `host[:port][=url]` arguments, exiting with a message on the first bad one.
pub fn parse_gmonds(args: &[String]) -> Vec<GmondConfig> {
    args.iter()
        .map(|arg| match arg.parse::<GmondConfig>() {
            Ok(g) => g,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(2);
            }
        })
        .collect()
}

/// Humanise a non-negative age in seconds.
pub fn format_age(secs: i64) -> String {
    if secs < 0 {
        return "future".to_string();
    }
    match secs {
        0..=119 => format!("{secs}s"),
        120..=7199 => format!("{}m", secs / 60),
        7200..=172_799 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}
