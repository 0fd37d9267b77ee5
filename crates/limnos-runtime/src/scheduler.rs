//! Simulation scheduler
//!
//! Drives [`Engine::tick`] on a tokio interval and hands results to callbacks.
//!
//! Lock order is delivery, then engine. The delivery lock is reentrant and held for
//! a whole tick, so `stop()` from another thread waits for an in-flight tick to
//! finish, and `stop()` from inside a callback re-enters and takes effect before
//! the next callback.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use limnos_core::{
    Anomaly, Buoy, BuoyId, BuoyMetadata, ConfigError, InputError, Insight, SimulationConfig,
    Timestamp,
};

use crate::{Engine, EngineStats, TickFault, TickOutcome};

/// Scheduler errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("No tokio runtime available to drive the scheduler")]
    NoRuntime,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Receives the full buoy set once per tick
pub type UpdateCallback = Arc<dyn Fn(&[Buoy]) + Send + Sync>;
/// Receives each insight as it is delivered
pub type InsightCallback = Arc<dyn Fn(&Insight) + Send + Sync>;
/// Receives each fault recorded during a tick
pub type FaultCallback = Arc<dyn Fn(&TickFault) + Send + Sync>;

#[derive(Clone)]
struct Callbacks {
    on_update: UpdateCallback,
    on_insight: InsightCallback,
}

struct Running {
    task: JoinHandle<()>,
    callbacks: Callbacks,
    interval: Duration,
}

struct Shared {
    engine: Mutex<Engine>,
    /// Generation allowed to deliver; `None` while stopped
    delivery: ReentrantMutex<Cell<Option<u64>>>,
    fault_sink: Mutex<Option<FaultCallback>>,
}

struct Inner {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
    generations: AtomicU64,
}

/// Periodic driver for an [`Engine`]. Cheap to clone; clones share one engine.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler over a fresh engine
    pub fn new(config: SimulationConfig) -> Result<Self, SchedulerError> {
        Ok(Self::with_engine(Engine::new(config)?))
    }

    /// Create a scheduler over an existing engine
    pub fn with_engine(engine: Engine) -> Self {
        Scheduler {
            inner: Arc::new(Inner {
                shared: Arc::new(Shared {
                    engine: Mutex::new(engine),
                    delivery: ReentrantMutex::new(Cell::new(None)),
                    fault_sink: Mutex::new(None),
                }),
                running: Mutex::new(None),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Load `buoys` and start ticking at the configured interval.
    /// A running ticker is cancelled first; only one is ever active.
    pub fn start<U, I>(
        &self,
        buoys: impl IntoIterator<Item = Buoy>,
        on_update: U,
        on_insight: I,
    ) -> Result<(), SchedulerError>
    where
        U: Fn(&[Buoy]) + Send + Sync + 'static,
        I: Fn(&Insight) + Send + Sync + 'static,
    {
        let callbacks = Callbacks {
            on_update: Arc::new(on_update),
            on_insight: Arc::new(on_insight),
        };
        let handle = runtime()?;
        let delivery = self.inner.shared.delivery.lock();
        let interval = {
            let mut engine = self.inner.shared.engine.lock();
            engine.load(buoys);
            engine.config().tick_interval
        };
        self.spawn(handle, &delivery, callbacks, interval);
        Ok(())
    }

    fn spawn(
        &self,
        handle: Handle,
        delivery: &Cell<Option<u64>>,
        callbacks: Callbacks,
        interval: Duration,
    ) {
        let mut running = self.inner.running.lock();
        if let Some(previous) = running.take() {
            previous.task.abort();
        }

        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
        delivery.set(Some(generation));

        let shared = Arc::clone(&self.inner.shared);
        let task_callbacks = callbacks.clone();
        let origin = (Utc::now(), Instant::now());
        let first = origin.1 + interval;
        let task = handle.spawn(async move {
            let mut ticker = interval_at(first, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let now = wall_clock(origin);
                if !run_tick(&shared, generation, &task_callbacks, now) {
                    break;
                }
            }
        });

        *running = Some(Running {
            task,
            callbacks,
            interval,
        });
        info!(generation, ?interval, "scheduler started");
    }

    /// Stop ticking. Idempotent. No callback fires after this returns.
    pub fn stop(&self) {
        let delivery = self.inner.shared.delivery.lock();
        let was_running = delivery.replace(None).is_some();
        if let Some(running) = self.inner.running.lock().take() {
            running.task.abort();
        }
        drop(delivery);
        if was_running {
            info!("scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.lock().is_some()
    }

    /// Install a sink for per-tick faults, replacing any previous one
    pub fn set_fault_sink<F>(&self, sink: F)
    where
        F: Fn(&TickFault) + Send + Sync + 'static,
    {
        let sink: FaultCallback = Arc::new(sink);
        *self.inner.shared.fault_sink.lock() = Some(sink);
    }

    pub fn clear_fault_sink(&self) {
        *self.inner.shared.fault_sink.lock() = None;
    }

    pub fn upsert_buoy(&self, buoy: Buoy) -> Option<Buoy> {
        self.inner.shared.engine.lock().upsert_buoy(buoy)
    }

    pub fn update_buoy(&self, id: BuoyId, metadata: BuoyMetadata) -> Result<(), InputError> {
        self.inner.shared.engine.lock().update_buoy(id, metadata)
    }

    pub fn remove_buoy(&self, id: BuoyId) -> Option<Buoy> {
        self.inner.shared.engine.lock().remove_buoy(id)
    }

    /// Apply a new configuration between ticks. A changed tick interval
    /// restarts the ticker with the same callbacks.
    pub fn reconfigure(&self, config: SimulationConfig) -> Result<(), SchedulerError> {
        let delivery = self.inner.shared.delivery.lock();
        let interval = config.tick_interval;
        let restart = self
            .inner
            .running
            .lock()
            .as_ref()
            .filter(|r| r.interval != interval)
            .map(|r| r.callbacks.clone());
        let handle = match restart {
            Some(_) => Some(runtime()?),
            None => None,
        };

        self.inner.shared.engine.lock().reconfigure(config)?;
        if let (Some(handle), Some(callbacks)) = (handle, restart) {
            self.spawn(handle, &delivery, callbacks, interval);
        }
        Ok(())
    }

    /// Run one tick immediately at `now`, deliver it like a scheduled tick and
    /// return its outcome. Update and insight callbacks fire only while running;
    /// the fault sink always sees the tick's faults.
    pub fn tick_now(&self, now: Timestamp) -> TickOutcome {
        let delivery = self.inner.shared.delivery.lock();
        let outcome = self.inner.shared.engine.lock().tick(now);
        let sink = self.inner.shared.fault_sink.lock().clone();
        let callbacks = self.inner.running.lock().as_ref().map(|r| r.callbacks.clone());

        match (delivery.get(), callbacks) {
            (Some(generation), Some(callbacks)) => {
                deliver(&delivery, generation, sink, &callbacks, &outcome);
            }
            _ => {
                if let Some(sink) = sink {
                    outcome.faults.iter().for_each(|fault| sink(fault));
                }
            }
        }
        outcome
    }

    /// Current buoy set, in id order
    pub fn buoys(&self) -> Vec<Buoy> {
        self.inner.shared.engine.lock().snapshot()
    }

    pub fn stats(&self) -> EngineStats {
        self.inner.shared.engine.lock().stats().clone()
    }

    pub fn recent_anomalies(&self, n: usize) -> Vec<Anomaly> {
        self.inner.shared.engine.lock().recent_anomalies(n)
    }

    pub fn recent_insights(&self, n: usize) -> Vec<Insight> {
        self.inner.shared.engine.lock().recent_insights(n)
    }

    /// Run `f` against the engine between ticks
    pub fn with_engine_mut<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        f(&mut self.inner.shared.engine.lock())
    }
}

/// Wall-clock time that advances with tokio's clock, so paused test time and
/// tick timestamps agree
fn wall_clock(origin: (Timestamp, Instant)) -> Timestamp {
    let elapsed = Instant::now().saturating_duration_since(origin.1);
    chrono::Duration::from_std(elapsed)
        .ok()
        .and_then(|d| origin.0.checked_add_signed(d))
        .unwrap_or(origin.0)
}

fn runtime() -> Result<Handle, SchedulerError> {
    Handle::try_current().map_err(|_| SchedulerError::NoRuntime)
}

/// Run and deliver one tick; false once `generation` has been retired
fn run_tick(shared: &Shared, generation: u64, callbacks: &Callbacks, now: Timestamp) -> bool {
    let delivery = shared.delivery.lock();
    if delivery.get() != Some(generation) {
        return false;
    }

    let outcome = shared.engine.lock().tick(now);
    let sink = shared.fault_sink.lock().clone();
    deliver(&delivery, generation, sink, callbacks, &outcome)
}

/// Hand `outcome` to the sink and callbacks, checking before each call that
/// `generation` still owns delivery; false once it has been retired
fn deliver(
    delivery: &Cell<Option<u64>>,
    generation: u64,
    sink: Option<FaultCallback>,
    callbacks: &Callbacks,
    outcome: &TickOutcome,
) -> bool {
    let current = || delivery.get() == Some(generation);
    if let Some(sink) = sink {
        for fault in &outcome.faults {
            if !current() {
                return false;
            }
            sink(fault);
        }
    }

    if !current() {
        return false;
    }
    (callbacks.on_update)(&outcome.buoys);

    for insight in &outcome.insights {
        if !current() {
            return false;
        }
        (callbacks.on_insight)(insight);
    }
    current()
}
