//! Fixed-size worker thread pools polling the shared queues.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use strata_core::{Error, Result};
use tracing::{debug, error, info, warn};

use crate::generation::TerrainSource;
use crate::queue::Duty;
use crate::tasks;
use crate::world::World;

/// Longest uninterrupted sleep, so a stop request is noticed promptly.
const NAP_SLICE: Duration = Duration::from_millis(10);

/// Worker pool sizes and polling cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub generate_workers: usize,
    pub remesh_workers: usize,
    pub unload_workers: usize,
    /// Sleep when the queue is empty.
    pub idle_sleep: Duration,
    /// Sleep after each processed item.
    pub busy_sleep: Duration,
    /// Sleep after a failed or panicking item.
    pub error_backoff: Duration,
    /// How long shutdown waits for each pool before detaching its threads.
    pub join_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            generate_workers: 4,
            remesh_workers: 4,
            unload_workers: 2,
            idle_sleep: Duration::from_millis(250),
            busy_sleep: Duration::from_millis(25),
            error_backoff: Duration::from_millis(1000),
            join_timeout: Duration::from_secs(2),
        }
    }
}

impl WorkerConfig {
    /// Same pool sizes with every sleep shortened, for tests and benchmarks.
    #[must_use]
    pub fn responsive(mut self) -> Self {
        self.idle_sleep = Duration::from_millis(1);
        self.busy_sleep = Duration::ZERO;
        self.error_backoff = Duration::from_millis(5);
        self
    }

    #[must_use]
    pub fn with_workers(mut self, generate: usize, remesh: usize, unload: usize) -> Self {
        self.generate_workers = generate;
        self.remesh_workers = remesh;
        self.unload_workers = unload;
        self
    }

    /// Threads in the pool serving `duty`.
    pub fn workers_for(&self, duty: Duty) -> usize {
        match duty {
            Duty::Generate => self.generate_workers,
            Duty::Remesh => self.remesh_workers,
            Duty::Unload => self.unload_workers,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for duty in Duty::ALL {
            if self.workers_for(duty) == 0 {
                return Err(Error::InvalidConfig(format!(
                    "{duty} pool needs at least one worker"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
struct Cadence {
    idle: Duration,
    busy: Duration,
    backoff: Duration,
}

/// Threads serving one duty.
pub struct WorkerPool {
    duty: Duty,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    join_timeout: Duration,
}

impl WorkerPool {
    /// Spawn the pool for `duty` with the size given by `config`.
    pub fn spawn(
        duty: Duty,
        config: &WorkerConfig,
        world: Arc<World>,
        terrain: Arc<dyn TerrainSource>,
    ) -> Result<Self> {
        let count = config.workers_for(duty);
        let cadence = Cadence {
            idle: config.idle_sleep,
            busy: config.busy_sleep,
            backoff: config.error_backoff,
        };
        let mut pool = Self {
            duty,
            running: Arc::new(AtomicBool::new(true)),
            threads: Vec::with_capacity(count),
            join_timeout: config.join_timeout,
        };

        for i in 0..count {
            let running = Arc::clone(&pool.running);
            let world = Arc::clone(&world);
            let terrain = Arc::clone(&terrain);
            let thread = thread::Builder::new()
                .name(format!("{duty}-worker-{i}"))
                .spawn(move || Self::worker_loop(duty, &running, &world, terrain.as_ref(), cadence))?;
            pool.threads.push(thread);
        }

        info!(duty = %duty, workers = count, "Worker pool started");
        Ok(pool)
    }

    /// Poll loop run by each worker thread.
    fn worker_loop(
        duty: Duty,
        running: &AtomicBool,
        world: &World,
        terrain: &dyn TerrainSource,
        cadence: Cadence,
    ) {
        while running.load(Ordering::Acquire) {
            let Some(item) = world.queues().pop(duty) else {
                nap(running, cadence.idle);
                continue;
            };

            let label = item.to_string();
            let result = panic::catch_unwind(AssertUnwindSafe(|| tasks::execute(world, terrain, item)));
            match result {
                Ok(Ok(_)) => nap(running, cadence.busy),
                Ok(Err(err)) => {
                    error!(duty = %duty, item = %label, error = %err, "Work item failed");
                    nap(running, cadence.backoff);
                }
                Err(payload) => {
                    let err = Error::WorkerPanic(panic_message(payload.as_ref()));
                    error!(duty = %duty, item = %label, error = %err, "Work item panicked");
                    nap(running, cadence.backoff);
                }
            }
        }
        debug!(duty = %duty, "Worker exiting");
    }

    pub fn duty(&self) -> Duty {
        self.duty
    }

    /// Number of threads still attached to the pool.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask every worker to stop after its current item, then join with a deadline.
    ///
    /// Workers still busy at the deadline are detached.
    pub fn shutdown(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.running.store(false, Ordering::Release);

        let deadline = Instant::now() + self.join_timeout;
        let mut detached = 0;
        for thread in self.threads.drain(..) {
            while !thread.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            if thread.is_finished() {
                if thread.join().is_err() {
                    warn!(duty = %self.duty, "Worker thread terminated by panic");
                }
            } else {
                detached += 1;
            }
        }

        if detached > 0 {
            warn!(duty = %self.duty, detached, timeout = ?self.join_timeout, "Detached workers that did not stop in time");
        } else {
            debug!(duty = %self.duty, "Worker pool stopped");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sleep up to `duration`, waking early once `running` is cleared.
fn nap(running: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    loop {
        let now = Instant::now();
        if now >= deadline || !running.load(Ordering::Acquire) {
            return;
        }
        thread::sleep((deadline - now).min(NAP_SLICE));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
