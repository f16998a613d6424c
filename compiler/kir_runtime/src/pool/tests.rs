use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::test_helpers::{share, Recorder};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn every_id_runs_exactly_once(n in 0usize..200, threads in 1usize..5) {
        let pool = PoolContext::new(threads).unwrap();
        let (recorder, kernel) = share(Recorder::new(n));
        prop_assert!(pool.compute(n, &kernel).is_ok());
        prop_assert!(recorder.hits.to_vec().iter().all(|hits| *hits == 1));
    }
}

/// Records the name of the thread each item ran on.
struct ThreadNames(Mutex<Vec<String>>);

impl Kernel for ThreadNames {
    fn process_work_item(&self, _: &WorkItem) -> Result<(), KernelFault> {
        let name = thread::current().name().unwrap_or_default().to_owned();
        self.0.lock().push(name);
        Ok(())
    }
}

#[test]
fn workers_are_named() {
    let pool = PoolContext::new(2).unwrap();
    let (names, kernel) = share(ThreadNames(Mutex::new(Vec::new())));
    pool.compute(10, &kernel).unwrap();
    let names = names.0.lock();
    assert_eq!(names.len(), 10);
    assert!(names.iter().all(|name| name.starts_with("kir-cpu#")));
}

#[test]
fn pool_is_reused_across_calls() {
    let pool = PoolContext::new(3).unwrap();
    for n in [1, 7, 64] {
        let (recorder, kernel) = share(Recorder::new(n));
        pool.compute(n, &kernel).unwrap();
        assert_eq!(recorder.hits.to_vec(), vec![1; n]);
    }
    assert_eq!(pool.threads(), 3);
}

#[test]
fn faults_and_panics_are_aggregated() {
    let pool = PoolContext::new(2).unwrap();
    let (_, kernel) = share(Recorder::failing(6, &[4, 0]));
    let Err(Error::Execution(failure)) = pool.compute(6, &kernel) else {
        panic!("expected an execution failure");
    };
    assert_eq!(failure.work_items().collect::<Vec<_>>(), vec![0, 4]);

    let (_, kernel) = share(Recorder::panicking(3, 1));
    let Err(Error::Execution(failure)) = pool.compute(3, &kernel) else {
        panic!("expected an execution failure");
    };
    assert_eq!(failure.faults[0].fault.message(), "boom at 1");
}

#[test]
fn compute_after_close_fails() {
    let pool = PoolContext::new(1).unwrap();
    pool.close().unwrap();
    pool.close().unwrap();
    assert!(pool.is_closed());
    let (recorder, kernel) = share(Recorder::new(2));
    assert_eq!(pool.compute(2, &kernel), Err(Error::Closed));
    assert_eq!(recorder.hits.to_vec(), vec![0, 0]);
}

/// Blocks its first item until released, so later items stay queued.
struct Gate {
    started: AtomicUsize,
    release: Mutex<bool>,
    opened: Condvar,
}

impl Kernel for Gate {
    fn process_work_item(&self, _: &WorkItem) -> Result<(), KernelFault> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let mut release = self.release.lock();
        while !*release {
            self.opened.wait(&mut release);
        }
        Ok(())
    }
}

#[test]
fn close_abandons_queued_items() {
    let pool = Arc::new(PoolContext::new(1).unwrap());
    let (gate, kernel) = share(Gate {
        started: AtomicUsize::new(0),
        release: Mutex::new(false),
        opened: Condvar::new(),
    });

    let runner = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.compute(4, &kernel))
    };
    while gate.started.load(Ordering::SeqCst) == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    pool.close().unwrap();
    *gate.release.lock() = true;
    gate.opened.notify_all();

    let Err(Error::Execution(failure)) = runner.join().unwrap() else {
        panic!("expected abandoned work-items");
    };
    assert_eq!(failure.work_items().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(failure
        .faults
        .iter()
        .all(|fault| fault.fault.message() == ABANDONED));
    assert_eq!(gate.started.load(Ordering::SeqCst), 1);
}
