use gmond_core::{CollectorConfig, GmondConfig};

pub fn run(gmonds: &[String]) {
    let mut config = CollectorConfig {
        gmonds: super::parse_gmonds(gmonds),
        ..Default::default()
    };
    if config.gmonds.is_empty() {
        config.gmonds.push(GmondConfig::new("localhost", gmond_core::DEFAULT_GMOND_PORT));
    }
    match config.to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
