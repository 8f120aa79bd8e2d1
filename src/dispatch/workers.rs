//! Worker threads for fire-and-forget dispatch
//!
//! `raise_async` and the async request bus hand their subscriber chain to a
//! worker and return immediately. There is no cancellation and no timeout.

use std::sync::Arc;

use crate::config::WorkerConfig;

/// Where off-thread subscriber chains run
#[derive(Clone, Default)]
pub enum Workers {
    /// rayon's global pool
    #[default]
    Global,
    /// A dedicated pool, shared by every bus of one context
    Pool(Arc<rayon::ThreadPool>),
}

impl Workers {
    /// Build a dedicated pool from configuration
    pub fn from_config(config: &WorkerConfig) -> Result<Self, rayon::ThreadPoolBuildError> {
        let thread_name = config.thread_name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(move |index| format!("{}-{}", thread_name, index))
            .build()?;

        tracing::debug!(
            target: "catalog_dispatch::workers",
            "Worker pool ready with {} threads",
            pool.current_num_threads()
        );

        Ok(Self::Pool(Arc::new(pool)))
    }

    /// Run `job` on a worker thread without waiting for it
    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        match self {
            Workers::Global => rayon::spawn(job),
            Workers::Pool(pool) => pool.spawn(job),
        }
    }
}

impl std::fmt::Debug for Workers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Workers::Global => write!(f, "Workers::Global"),
            Workers::Pool(pool) => write!(f, "Workers::Pool({} threads)", pool.current_num_threads()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::time::Duration;

    #[test]
    fn test_spawn_runs_off_calling_thread() {
        let (tx, rx) = bounded(1);
        let caller = std::thread::current().id();

        Workers::Global.spawn(move || {
            let _ = tx.send(std::thread::current().id());
        });

        let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn test_dedicated_pool_names_threads() {
        let config = WorkerConfig {
            threads: 2,
            thread_name: "dispatch-test".to_string(),
        };
        let workers = Workers::from_config(&config).unwrap();
        let (tx, rx) = bounded(1);

        workers.spawn(move || {
            let _ = tx.send(std::thread::current().name().map(str::to_string));
        });

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(name.starts_with("dispatch-test-"));
    }
}
