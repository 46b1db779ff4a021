//! Black-box end-to-end scenarios against the public API only.

use desim::domain::{Generator, PatternGenerator, PatternGeneratorConfig, SeasonalFactors, TandemLine};
use desim::{Sandbox, SimError};

#[test]
fn scenario_a_hour_counter_arithmetic() {
    let root = Sandbox::new_root("root", 1);
    let hc = root.add_hour_counter(false);

    root.run_for(1.0).unwrap();
    hc.observe_count(1.0).unwrap();
    root.run_for(1.0).unwrap();
    hc.pause().unwrap();
    root.run_for(1.0).unwrap();
    hc.observe_count(2.0).unwrap();
    root.run_for(1.0).unwrap();
    hc.resume();
    root.run_for(1.0).unwrap();
    hc.observe_count(0.0).unwrap();
    root.run_for(5.0).unwrap();
    hc.observe_count(0.0).unwrap();

    assert!((hc.average_count() - 0.375).abs() < 1e-9);
    assert_eq!(hc.total_increment(), 1.0);
    assert_eq!(hc.total_decrement(), 2.0);
}

#[test]
fn scenario_b_clock_advance() {
    let root = Sandbox::new_root("root", 1);
    root.run_for(2.0).unwrap();
    assert_eq!(root.clock_time(), 2.0);
}

#[test]
fn scenario_c_warm_up_propagation() {
    let a = Sandbox::new_root("A", 1);
    let b = a.add_child("B", 2);
    let c = a.add_child("C", 3);
    let d = b.add_child("D", 4);

    let hits = std::rc::Rc::new(std::cell::Cell::new(0u32));
    for sbx in [&a, &b, &c, &d] {
        let hits = hits.clone();
        sbx.set_warmed_up_handler(move || hits.set(hits.get() + 1));
    }

    a.warm_up(1.0).unwrap();
    assert_eq!(a.clock_time(), 1.0);
    assert_eq!(hits.get(), 4);
}

#[test]
fn scenario_d_mm1_smoke_across_seeds() {
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
fn scenario_e_pattern_generator_rate_recovery() {
    let root = Sandbox::new_root("root", 7);
    let pg = PatternGenerator::new(
        root.clone(),
        PatternGeneratorConfig {
            mean_hourly_rate: 1.0,
            factors: SeasonalFactors::default(),
            epoch: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        },
    )
    .unwrap();
    pg.start().unwrap();
    root.run_count(1000).unwrap();
    let duration = root.clock_time();
    assert!(((duration - 1000.0).abs() / 1000.0) <= 0.05);
}

#[test]
fn scenario_f_generator_on_off() {
    let root = Sandbox::new_root("root", 1);
    let generator = Generator::new(root.clone(), |rng| desim::samplers::exponential(rng, 1.0));

    generator.start().unwrap();
    root.run_count(5).unwrap();
    assert!(generator.is_on());
    assert_eq!(generator.count(), 5);

    generator.end();
    assert!(!generator.is_on());
    let count_at_end = generator.count();
    root.run_for(72.0).unwrap();
    assert_eq!(generator.count(), count_at_end);

    generator.start().unwrap();
    root.run_count(5).unwrap();
    assert_eq!(generator.count(), 10);
}

#[test]
fn reentrant_run_is_rejected_from_the_public_api() {
    let root = Sandbox::new_root("root", 1);
    let inner_root = root.clone();
    let captured: std::rc::Rc<std::cell::RefCell<Option<SimError>>> =
        std::rc::Rc::new(std::cell::RefCell::new(None));
    let captured_in_action = captured.clone();
    root.schedule(
        move || {
            *captured_in_action.borrow_mut() = inner_root.run().err();
        },
        0.0,
        None,
    )
    .unwrap();
    root.run_until(0.0).unwrap();
    let err = captured.borrow_mut().take().expect("nested run should have failed");
    assert!(matches!(err, SimError::RootReentrancy { .. }));
}
