//! Background threads driving a [`World`].
//!
//! - `vx-residency`: saves one aged dirty chunk, runs one residency step
//!   around the focus, frees one chunk whose grace period is over.
//! - `vx-updates`: flushes the update and repaint queues.
//! - `vx-tick`: ticks resident chunks and entities.
//!
//! Every loop does a bounded amount of work and sleeps. Shutdown clears the
//! shared run flag and joins; the current iteration always finishes first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::error::WorldError;
use crate::world::World;

pub struct WorldWorkers {
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorldWorkers {
    pub fn start(world: Arc<World>) -> Result<Self, WorldError> {
        let running = Arc::new(AtomicBool::new(true));
        let mut workers = Self {
            running: running.clone(),
            handles: Vec::with_capacity(3),
        };

        let interval = world.config().worker_interval();
        let tick_interval = world.config().tick_interval();
        let budget = world.config().update_budget;

        workers.spawn("vx-residency", &world, interval, |world| {
            if let Err(e) = world.save_next_chunk() {
                error!("chunk save failed: {e}");
            }
            world.evict_and_load_around(world.focus().chunk_pos());
            if let Err(e) = world.dequeue_unloaded_chunk() {
                error!("chunk unload failed: {e}");
            }
        })?;

        workers.spawn("vx-updates", &world, interval, move |world| {
            world.flush_updates(budget);
        })?;

        let mut last_tick = Instant::now();
        workers.spawn("vx-tick", &world, tick_interval, move |world| {
            let now = Instant::now();
            world.tick_everything(now - last_tick);
            last_tick = now;
        })?;

        info!("world workers started");
        Ok(workers)
    }

    fn spawn(
        &mut self,
        name: &str,
        world: &Arc<World>,
        interval: Duration,
        mut step: impl FnMut(&World) + Send + 'static,
    ) -> Result<(), WorldError> {
        let running = self.running.clone();
        let world = world.clone();
        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            while running.load(Ordering::Acquire) {
                step(&world);
                thread::sleep(interval);
            }
        });
        match spawned {
            Ok(handle) => {
                self.handles.push(handle);
                Ok(())
            }
            Err(e) => {
                self.stop();
                Err(e.into())
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop all loops and wait for them to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        let handles = std::mem::take(&mut self.handles);
        if handles.is_empty() {
            return;
        }
        for handle in handles {
            if handle.join().is_err() {
                error!("a world worker panicked");
            }
        }
        info!("world workers stopped");
    }
}

impl Drop for WorldWorkers {
    fn drop(&mut self) {
        self.stop();
    }
}
