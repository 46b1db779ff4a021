//! A multi-stage tandem queueing line (`--stages N`), each stage a bounded
//! queue feeding a single server, the last stage's departures leaving the
//! system. Prints per-stage averages; `--csv-file` dumps them as CSV.
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
    let stages: usize = parse_arg("--stages", 3usize);
    let arrival_mean: f64 = parse_arg("--arrival-mean", 1.0);
    let service_mean: f64 = parse_arg("--service-mean", 0.5);
    let queue_capacity: usize = parse_arg("--queue-capacity", 1_000usize);
    let warm_up: f64 = parse_arg("--warm-up", 200.0f64);
    let horizon: f64 = parse_arg("--horizon", 5_000.0f64);
    let csv_file: Option<String> = parse_arg_str("--csv-file");

    let service_means: Vec<f64> = vec![service_mean; stages.max(1)];
    let root = Sandbox::new_root("tandem", seed);
    let line = TandemLine::build(&root, arrival_mean, &service_means, queue_capacity)
        .expect("valid tandem configuration");
    line.generator.start().expect("generator starts from Off");

    println!(
        "tandem: stages={stages}, arrival_mean={arrival_mean}, service_mean={service_mean}, warm_up={warm_up}, horizon={horizon}"
    );
    root.warm_up(warm_up).expect("warm-up horizon is non-negative");
    root.run_for(horizon).expect("horizon is non-negative");

    for (i, _) in line.stages.iter().enumerate() {
        let queueing = line.queueing_hour_counter(i);
        let serving = line.serving_hour_counter(i);
        println!(
            "stage {i}: avg_n_queueing={:.4} avg_n_serving={:.4}",
            queueing.average_count(),
            serving.average_count(),
        );
    }
    println!("arrivals={}", line.generator.count());

    if let Some(path) = csv_file.as_deref() {
        let mut f = File::create(path).expect("csv path is writable");
        writeln!(f, "stage,avg_n_queueing,avg_n_serving").unwrap();
        for (i, _) in line.stages.iter().enumerate() {
            writeln!(
                f,
                "{i},{:.6},{:.6}",
                line.queueing_hour_counter(i).average_count(),
                line.serving_hour_counter(i).average_count(),
            )
            .unwrap();
        }
    }
}
