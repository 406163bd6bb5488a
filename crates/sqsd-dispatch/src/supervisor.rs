//! Worker pool lifecycle: start-once, shutdown signal, wait-for-drain.

use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use sqsd_core::{Clock, RealClock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{client::Dispatcher, config::QueueConfig, queue::QueueClient, worker::Worker};

/// Delay before a panicked worker loop is restarted.
const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Owns the worker pool: starts it exactly once, signals shutdown, and
/// waits for every worker to drain.
///
/// A worker loop never terminates on transient errors; only shutdown ends
/// it. A panic inside a worker is contained: the supervision task logs it
/// and restarts the loop after [`RESTART_DELAY`] unless shutdown has been
/// requested.
pub struct Supervisor {
    queue: Arc<dyn QueueClient>,
    dispatcher: Arc<Dispatcher>,
    config: QueueConfig,
    shutdown: CancellationToken,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    started: bool,
    handles: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Creates a supervisor over a queue and dispatcher. No workers run
    /// until [`start`](Self::start) is called.
    pub fn new(queue: Arc<dyn QueueClient>, dispatcher: Dispatcher, config: QueueConfig) -> Self {
        Self {
            queue,
            dispatcher: Arc::new(dispatcher),
            config,
            shutdown: CancellationToken::new(),
            clock: Arc::new(RealClock),
            state: Mutex::new(State::default()),
        }
    }

    /// Launches `count` workers the first time it is called; later calls
    /// are logged no-ops. A count of zero falls back to the number of
    /// available CPUs.
    pub fn start(&self, count: usize) {
        let mut state = self.state.lock().expect("supervisor state mutex poisoned");

        if state.started {
            warn!("supervisor already started, ignoring start request");
            return;
        }
        state.started = true;

        let count = if count == 0 {
            thread::available_parallelism().map(usize::from).unwrap_or(1)
        } else {
            count
        };

        info!(worker_count = count, "starting workers");

        for worker_id in 0..count {
            let handle = self.spawn_supervised(worker_id);
            state.handles.push(handle);
        }
    }

    /// Signals every worker to stop after its current iteration. Does not
    /// block and may be called more than once.
    pub fn shutdown(&self) {
        info!("shutting down workers");
        self.shutdown.cancel();
    }

    /// Waits until every started worker has exited. Returns immediately if
    /// the supervisor was never started or has already been drained.
    pub async fn wait(&self) {
        let handles = {
            let mut state = self.state.lock().expect("supervisor state mutex poisoned");
            std::mem::take(&mut state.handles)
        };

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker supervision task panicked");
            }
        }
    }

    /// Number of workers currently owned by the supervisor.
    pub fn worker_count(&self) -> usize {
        self.state.lock().expect("supervisor state mutex poisoned").handles.len()
    }

    /// Spawns one supervised worker task. The inner worker runs in its own
    /// task so a panic is caught as a `JoinError` instead of taking the
    /// supervision loop down with it.
    fn spawn_supervised(&self, worker_id: usize) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let dispatcher = Arc::clone(&self.dispatcher);
        let config = self.config.clone();
        let shutdown = self.shutdown.clone();
        let clock = Arc::clone(&self.clock);

        tokio::spawn(async move {
            loop {
                let worker = Worker::new(
                    worker_id,
                    Arc::clone(&queue),
                    Arc::clone(&dispatcher),
                    config.clone(),
                    shutdown.clone(),
                    Arc::clone(&clock),
                );

                match tokio::spawn(async move { worker.run().await }).await {
                    Ok(()) => break,
                    Err(e) => {
                        error!(worker_id, error = %e, "worker crashed");
                    }
                }

                if shutdown.is_cancelled() {
                    break;
                }

                info!(worker_id, "restarting worker");
                tokio::select! {
                    () = clock.sleep(RESTART_DELAY) => {}
                    () = shutdown.cancelled() => break,
                }
            }
        })
    }
}
