//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use spark_reconciler::noop::NoopHost;
use spark_reconciler::{
    create_root, create_root_with_scheduler, ManualClock, Root, Scheduler, SchedulerConfig,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A root on a fresh noop host, scheduled on the system clock.
pub fn setup() -> (NoopHost, Root<NoopHost>) {
    init_logger();
    let host = NoopHost::new();
    let container = host.create_container();
    let root = create_root(host.clone(), container);
    (host, root)
}

/// A root whose scheduler reads time from a manual clock.
pub fn setup_manual() -> (NoopHost, Root<NoopHost>, ManualClock) {
    init_logger();
    let clock = ManualClock::new();
    let scheduler = Rc::new(Scheduler::new(
        SchedulerConfig::default(),
        Rc::new(clock.clone()),
    ));
    let host = NoopHost::new();
    let container = host.create_container();
    let root = create_root_with_scheduler(host.clone(), container, scheduler);
    (host, root, clock)
}

// =============================================================================
// Event log
// =============================================================================

thread_local! {
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Record an event from a component or effect.
pub fn log(entry: impl Into<String>) {
    let entry = entry.into();
    LOG.with(|log| log.borrow_mut().push(entry));
}

/// Return and clear the recorded events.
pub fn take_log() -> Vec<String> {
    LOG.with(|log| log.take())
}
