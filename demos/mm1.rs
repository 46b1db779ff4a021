//! A single-server M/M/1 queue, run to steady state and reported as a CSV of
//! per-stage statistics. `--csv-file` writes queueing/serving history if the
//! line was built with history enabled; otherwise only the summary prints.
use desim::domain::TandemLine;
use desim::Sandbox;
use std::{env, fs::File, io::Write};

fn parse_arg<T: std::str::FromStr>(name: &str, default: T) -> T {
    let mut args = env::args().skip(1);
    while let Some(k) = args.next() {
        if k == name {
            if let Some(v) = args.next() {
                if let Ok(parsed) = v.parse::<T>() {
                    return parsed;
                }
            }
        }
    }
    default
}

fn parse_arg_str(name: &str) -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(k) = args.next() {
        if k == name {
            if let Some(v) = args.next() {
                return Some(v);
            }
        }
    }
    None
}

fn main() {
    env_logger::init();

    let seed: u64 = parse_arg("--seed", 1u64);
    let arrival_mean: f64 = parse_arg("--arrival-mean", 1.0 / 4.0);
    let service_mean: f64 = parse_arg("--service-mean", 1.0 / 5.0);
    let queue_capacity: usize = parse_arg("--queue-capacity", 10_000usize);
    let warm_up: f64 = parse_arg("--warm-up", 1_000.0f64);
    let horizon: f64 = parse_arg("--horizon", 20_000.0f64);
    let csv_file: Option<String> = parse_arg_str("--csv-file");

    let root = Sandbox::new_root("mm1", seed);
    let line = TandemLine::build(&root, arrival_mean, &[service_mean], queue_capacity)
        .expect("valid M/M/1 configuration");
    line.generator.start().expect("generator starts from Off");

    println!(
        "M/M/1: arrival_mean={arrival_mean}, service_mean={service_mean}, warm_up={warm_up}, horizon={horizon}"
    );
    root.warm_up(warm_up).expect("warm-up horizon is non-negative");
    root.run_for(horizon).expect("horizon is non-negative");

    let queueing = line.queueing_hour_counter(0);
    let serving = line.serving_hour_counter(0);
    let avg_in_system = queueing.average_duration() + serving.average_duration();

    println!(
        "arrivals={} avg_n_queueing={:.4} avg_n_serving={:.4} avg_hours_in_system={:.4}",
        line.generator.count(),
        queueing.average_count(),
        serving.average_count(),
        avg_in_system,
    );

    if let Some(path) = csv_file.as_deref() {
        let mut f = File::create(path).expect("csv path is writable");
        writeln!(f, "bin_lower,hours,probability,cumulative_probability").unwrap();
        for bin in queueing.histogram(1.0) {
            writeln!(
                f,
                "{},{:.6},{:.6},{:.6}",
                bin.lower_bound, bin.hours, bin.probability, bin.cumulative_probability
            )
            .unwrap();
        }
    }
}
