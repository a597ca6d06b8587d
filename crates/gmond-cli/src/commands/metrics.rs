use gmond_core::{CPU_METRICS, MetricAllowList, STANDARD_METRICS};

pub fn run(do_cpus: bool, extra_metrics: &[String]) {
    let allow = MetricAllowList::new(do_cpus, extra_metrics);
    println!("{} metrics kept:", allow.len());
    for name in allow.names() {
        let kind = if STANDARD_METRICS.contains(&name.as_str()) {
            "standard"
        } else if CPU_METRICS.contains(&name.as_str()) {
            "cpu"
        } else {
            "extra"
        };
        println!("  {name:<20} {kind}");
    }
}
