use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mapfm_client::prelude::*;
use tracing::{Level, Metadata};
use tracing_subscriber::{
    fmt,
    layer::{Context, Filter, SubscriberExt},
    Layer, Registry,
};

struct WarningsOnly;
impl<S> Filter<S> for WarningsOnly {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        meta.level() <= &Level::WARN
    }
}

fn init_debug_logger() {
    let format = fmt::format()
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_thread_names(true)
        .with_target(false);

    let reg = Registry::default().with(
        fmt::layer()
            .event_format(format)
            .with_filter(WarningsOnly),
    );

    let _ = tracing::subscriber::set_global_default(reg);
}

fn corridor(id: u64, length: u32) -> Problem {
    Problem::new(
        vec![vec![0; length as usize]],
        length,
        1,
        vec![MarkedLocation::new(0, 0, 0)],
        vec![MarkedLocation::new(0, length - 1, 0)],
    )
    .with_id(id)
}

fn walk(problem: &Problem) -> anyhow::Result<Vec<Vec<(u32, u32)>>> {
    Ok(vec![(0..problem.width).map(|x| (x, 0)).collect()])
}

fn config(cores: Cores) -> Configuration {
    Configuration::new().with_verbose(false).with_cores(cores)
}

#[test]
fn order_is_kept_whatever_the_cores() {
    init_debug_logger();
    // later problems finish first
    let solver = |problem: &Problem| {
        thread::sleep(Duration::from_millis(5 * (20 - problem.id.unwrap_or(0))));
        walk(problem)
    };
    let problems = (1..=12).map(|i| corridor(i, 2 + i as u32)).collect::<Vec<_>>();

    for cores in [Cores::Single, Cores::Exactly(4), Cores::All] {
        let results = TestBench::new(config(cores))
            .run(solver, problems.clone())
            .unwrap();
        let ids = results.iter().map(|r| r.problem.id).collect::<Vec<_>>();
        assert_eq!(ids, (1..=12).map(Some).collect::<Vec<_>>(), "{cores}");
        for result in &results {
            let solution = result.solution.as_ref().unwrap();
            assert!(solution.matches(&result.problem));
            assert_eq!(solution.paths[0].route.len(), result.problem.width as usize);
        }
    }
}

#[test]
fn slow_problem_is_abandoned() {
    init_debug_logger();
    let solver = |problem: &Problem| {
        if problem.id == Some(2) {
            thread::sleep(Duration::from_millis(500));
        }
        walk(problem)
    };
    let problems = vec![corridor(1, 3), corridor(2, 3), corridor(3, 3)];
    let bench = TestBench::new(
        config(Cores::Single).with_timeout(Some(Duration::from_millis(100))),
    );

    let start = Instant::now();
    let results = bench.run(solver, problems).unwrap();
    let total = start.elapsed();

    assert_eq!(results.len(), 3);
    assert!(results[0].solution.is_some());
    assert_eq!(results[1].solution, None);
    assert!(results[1].elapsed >= Duration::from_millis(100));
    assert!(results[1].elapsed < Duration::from_millis(450));
    assert!(results[2].solution.is_some());
    // the abandoned call does not hold the batch
    assert!(total < Duration::from_millis(450));
}

#[test]
fn slow_problem_is_abandoned_by_parallel_workers() {
    init_debug_logger();
    let solver = |problem: &Problem| {
        if problem.id == Some(2) {
            thread::sleep(Duration::from_millis(500));
        }
        walk(problem)
    };
    let problems = (1..=4).map(|i| corridor(i, 3)).collect();
    let bench = TestBench::new(
        config(Cores::Exactly(2)).with_timeout(Some(Duration::from_millis(100))),
    );

    let start = Instant::now();
    let results = bench.run(solver, problems).unwrap();
    let total = start.elapsed();

    let ids = results.iter().map(|r| r.problem.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3), Some(4)]);
    assert_eq!(results[1].solution, None);
    assert!(results[1].elapsed >= Duration::from_millis(100));
    assert!(results[1].elapsed < Duration::from_millis(450));
    for index in [0, 2, 3] {
        assert!(results[index].solution.is_some(), "problem #{index}");
        assert!(results[index].elapsed < Duration::from_millis(450));
    }
    assert!(total < Duration::from_millis(450));
}

#[test]
fn failures_are_isolated_with_timeout() {
    let solver = |problem: &Problem| -> anyhow::Result<Vec<Vec<(u32, u32)>>> {
        match problem.id {
            Some(2) => anyhow::bail!("no route"),
            Some(4) => panic!("solver bug"),
            _ => walk(problem),
        }
    };
    let problems = (1..=5).map(|i| corridor(i, 3)).collect();
    let results = TestBench::new(
        config(Cores::Exactly(2)).with_timeout(Some(Duration::from_secs(2))),
    )
    .run(solver, problems)
    .unwrap();

    let solved = results
        .iter()
        .map(|r| r.solution.is_some())
        .collect::<Vec<_>>();
    assert_eq!(solved, vec![true, false, true, false, true]);
}

#[test]
fn first_error_stops_parallel_bench() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let solver = move |problem: &Problem| {
        counter.fetch_add(1, Ordering::SeqCst);
        if problem.id == Some(1) {
            anyhow::bail!("invalid input");
        }
        thread::sleep(Duration::from_millis(20));
        walk(problem)
    };
    let problems = (1..=50).map(|i| corridor(i, 3)).collect();
    let err = TestBench::new(config(Cores::Exactly(2)))
        .run(solver, problems)
        .unwrap_err();

    assert!(format!("{err:#}").contains("invalid input"));
    assert!(calls.load(Ordering::SeqCst) < 50);
}

#[test]
fn solver_is_shared_between_benches() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let solver = Arc::new(move |problem: &Problem| {
        counter.fetch_add(1, Ordering::SeqCst);
        walk(problem)
    });
    let bench = TestBench::new(config(Cores::Exactly(3)));
    for _ in 0..3 {
        let problems = (1..=4).map(|i| corridor(i, 2)).collect();
        bench.run_shared(Arc::clone(&solver), problems).unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 12);
}

#[cfg(unix)]
#[test]
fn external_process_solver() {
    // answers with the start of every agent
    let script = r#"read problem; echo '{"paths": [{"route": [{"x": 0, "y": 0}]}]}'"#;
    let solver = ProcessSolver::new("sh").with_args(["-c", script]);
    let problems = vec![corridor(1, 2), corridor(2, 4)];
    let results = TestBench::new(
        config(Cores::Exactly(2)).with_timeout(Some(Duration::from_secs(5))),
    )
    .run(solver, problems)
    .unwrap();
    for result in results {
        assert_eq!(
            result.solution,
            Some(Solution::from(vec![vec![(0, 0)]]))
        );
    }
}
