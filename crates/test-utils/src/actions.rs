use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reactor::errors::BuildError;
use reactor::exec::{BuildAction, BuildContext, BuildFuture};
use reactor::types::BuildUnit;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Finished(String),
}

#[derive(Default)]
struct Inner {
    events: Mutex<Vec<Event>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    halting: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl Inner {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// A scripted build action that:
/// - records `Started` / `Finished` events in the order they happen
/// - tracks the highest number of actions running at once
/// - fails, panics, halts the run, sleeps or waits on a gate for chosen units.
#[derive(Clone, Default)]
pub struct RecordingAction {
    inner: Arc<Inner>,
}

impl RecordingAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, unit: &str) -> Self {
        self.inner.failing.lock().unwrap().insert(unit.to_string());
        self
    }

    pub fn panic(self, unit: &str) -> Self {
        self.inner.panicking.lock().unwrap().insert(unit.to_string());
        self
    }

    /// The unit halts the run from inside its own action.
    pub fn halt_on(self, unit: &str) -> Self {
        self.inner.halting.lock().unwrap().insert(unit.to_string());
        self
    }

    pub fn delay(self, unit: &str, delay: Duration) -> Self {
        self.inner
            .delays
            .lock()
            .unwrap()
            .insert(unit.to_string(), delay);
        self
    }

    /// The unit blocks until [`RecordingAction::release`] is called for it.
    pub fn gate(self, unit: &str) -> Self {
        self.inner
            .gates
            .lock()
            .unwrap()
            .insert(unit.to_string(), Arc::new(Notify::new()));
        self
    }

    pub fn release(&self, unit: &str) {
        if let Some(gate) = self.inner.gates.lock().unwrap().get(unit) {
            gate.notify_one();
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.events.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(name) => Some(name),
                Event::Finished(_) => None,
            })
            .collect()
    }

    pub fn start_count(&self, unit: &str) -> usize {
        self.started().iter().filter(|name| *name == unit).count()
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.max_running.load(Ordering::SeqCst)
    }

    /// Whether `first` finished before `second` started. `false` if either
    /// event is missing.
    pub fn finished_before_started(&self, first: &str, second: &str) -> bool {
        let events = self.events();
        let finished = events
            .iter()
            .position(|e| *e == Event::Finished(first.to_string()));
        let started = events
            .iter()
            .position(|e| *e == Event::Started(second.to_string()));
        matches!((finished, started), (Some(f), Some(s)) if f < s)
    }

    /// Wait until `unit` has started.
    pub async fn wait_started(&self, unit: &str) {
        while self.start_count(unit) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl BuildAction for RecordingAction {
    fn build(&self, unit: BuildUnit, ctx: BuildContext) -> BuildFuture {
        let inner = Arc::clone(&self.inner);

        Box::pin(async move {
            let name = unit.name().to_string();
            inner.record(Event::Started(name.clone()));
            let now = inner.running.fetch_add(1, Ordering::SeqCst) + 1;
            inner.max_running.fetch_max(now, Ordering::SeqCst);

            ctx.output().line(&format!("building {name}"));

            let delay = inner.delays.lock().unwrap().get(&name).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let gate = inner.gates.lock().unwrap().get(&name).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            if inner.halting.lock().unwrap().contains(&name) {
                ctx.halt_handle().halt();
            }
            let fails = inner.failing.lock().unwrap().contains(&name);
            let panics = inner.panicking.lock().unwrap().contains(&name);

            inner.running.fetch_sub(1, Ordering::SeqCst);
            inner.record(Event::Finished(name.clone()));

            if panics {
                panic!("scripted panic in {name}");
            }
            if fails {
                return Err(BuildError::msg(format!("scripted failure in {name}")));
            }
            Ok(())
        })
    }
}
