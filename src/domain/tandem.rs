//! A multi-stage tandem queueing line: `Generator -> (Queue -> Server)+`,
//! wired up via the same `on_*` observer hooks a user model would use.
//!
//! This is the vehicle for the M/M/1 and tandem-queue smoke scenarios; it is
//! also a worked example of hierarchical composition, since each stage gets
//! its own child sandbox.

use std::rc::Rc;

use rand_pcg::Pcg64;

use crate::error::SimError;
use crate::event::Timestamp;
use crate::hour_counter::HourCounter;
use crate::sandbox::Sandbox;

use super::generator::Generator;
use super::queue::Queue;
use super::server::Server;

/// One queue-then-server stage of a tandem line.
#[derive(Clone)]
pub struct Stage {
    pub queue: Queue<u64>,
    pub server: Server<u64>,
}

/// A generator feeding one or more queue/server stages in series, each stage
/// living in its own child sandbox of a shared root.
pub struct TandemLine {
    pub generator: Generator,
    pub stages: Vec<Stage>,
}

impl TandemLine {
    /// Builds a line of `arrival_mean`-gapped arrivals feeding `service_means.len()`
    /// single-server stages in series, each with unbounded queueing capacity.
    pub fn build(
        root: &Sandbox,
        arrival_mean: Timestamp,
        service_means: &[Timestamp],
        queue_capacity: usize,
    ) -> Result<TandemLine, SimError> {
        let generator_sandbox = root.add_child("generator", 1);
        let generator = Generator::new(generator_sandbox, move |rng: &mut Pcg64| {
            crate::samplers::exponential(rng, arrival_mean)
        });

        let mut stages = Vec::with_capacity(service_means.len());
        let mut next_id: u64 = 0;
        for (i, mean) in service_means.iter().copied().enumerate() {
            let queue_sandbox = root.add_child(format!("queue-{i}"), 10 + i as u64);
            let server_sandbox = root.add_child(format!("server-{i}"), 20 + i as u64);
            let queue = Queue::<u64>::new(queue_sandbox, queue_capacity)?;
            let server = Server::<u64>::new(server_sandbox, 1, move |rng: &mut Pcg64, _load| {
                crate::samplers::exponential(rng, mean)
            })?;

            let server_for_enqueue = server.clone();
            queue.on_enqueued(Rc::new(move |load| {
                let _ = server_for_enqueue.rqst_start(load);
            }));

            let server_for_depart = server.clone();
            server.on_ready_to_depart(Rc::new(move |load| {
                let _ = server_for_depart.depart(&load);
            }));

            stages.push(Stage { queue, server });
            let _ = next_id; // reserved for future load tagging
            next_id += 1;
        }

        // Wire each stage's server completion into the next stage's queue,
        // and the generator's arrivals into the first stage's queue.
        for i in (0..stages.len().saturating_sub(1)).rev() {
            let next_queue = stages[i + 1].queue.clone();
            stages[i].server.on_ready_to_depart(Rc::new(move |load| {
                let _ = next_queue.rqst_enqueue(load);
            }));
        }
        if let Some(first) = stages.first() {
            let first_queue = first.queue.clone();
            let load_counter = Rc::new(std::cell::Cell::new(0u64));
            generator.on_arrive(Rc::new(move || {
                let id = load_counter.get();
                load_counter.set(id + 1);
                let _ = first_queue.rqst_enqueue(id);
            }));
        }

        Ok(TandemLine { generator, stages })
    }

    pub fn queueing_hour_counter(&self, stage: usize) -> &HourCounter {
        self.stages[stage].queue.queueing_hour_counter()
    }

    pub fn serving_hour_counter(&self, stage: usize) -> &HourCounter {
        self.stages[stage].server.serving_hour_counter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_d_mm1_smoke() {
        for seed in [1u64, 2, 3] {
            let root = Sandbox::new_root("mm1", seed);
            let line = TandemLine::build(&root, 1.0 / 4.0, &[1.0 / 5.0], 10_000).unwrap();
            line.generator.start().unwrap();

            root.warm_up(1000.0).unwrap();
            root.run_for(20_000.0).unwrap();

            let avg_n_queueing = line.queueing_hour_counter(0).average_count();
            let avg_n_serving = line.serving_hour_counter(0).average_count();
            let avg_hours_in_system = line.queueing_hour_counter(0).average_duration()
                + line.serving_hour_counter(0).average_duration();

            assert!(avg_n_queueing.is_finite() && avg_n_queueing >= 0.0);
            assert!((0.0..=1.0).contains(&avg_n_serving));
            assert!(avg_hours_in_system > 0.0);
        }
    }

    #[test]
    fn two_stage_tandem_builds_and_runs() {
        let root = Sandbox::new_root("tandem", 11);
        let line = TandemLine::build(&root, 1.0, &[0.3, 0.3], 100).unwrap();
        line.generator.start().unwrap();
        root.run_for(500.0).unwrap();
        assert_eq!(line.stages.len(), 2);
        assert!(line.generator.count() > 0);
    }
}
