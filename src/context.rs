//! The execution context: the handle every dataset is evaluated against.
//!
//! A context is acquired explicitly, passed to whatever builds a pipeline and
//! shut down explicitly once the job is done. It owns the thread pool that
//! runs pipeline stages and the runtime that drives object store I/O.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::storage::{Location, ObjectStoreConfig, Storage};
use crate::utils::{self, split_even};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct ContextConfig {
    /// Name used for thread names and log lines.
    pub app_name: String,
    /// Worker threads for stage execution. `None` uses one per CPU.
    pub parallelism: Option<usize>,
    /// Partition count for shuffles when a stage does not ask for one.
    pub default_partitions: Option<usize>,
    pub object_store: ObjectStoreConfig,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            app_name: "wclite".to_string(),
            parallelism: None,
            default_partitions: None,
            object_store: ObjectStoreConfig::default(),
        }
    }
}

impl ContextConfig {
    /// A purely local configuration with a fixed number of threads.
    pub fn local(parallelism: usize) -> Self {
        Self {
            parallelism: Some(parallelism),
            ..Self::default()
        }
    }
}

struct Inner {
    app_name: String,
    pool: rayon::ThreadPool,
    runtime: Mutex<Option<Runtime>>,
    storage: Storage,
    default_partitions: Option<usize>,
    active: AtomicBool,
}

/// Shared handle to an acquired execution context. Cloning is cheap.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    pub fn acquire(config: ContextConfig) -> Result<Self> {
        if config.parallelism == Some(0) {
            return Err(Error::ContextUnavailable(
                "parallelism must be at least 1".into(),
            ));
        }

        let name = config.app_name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallelism.unwrap_or(0))
            .thread_name(move |i| format!("{}-worker-{}", name, i))
            .build()
            .map_err(|e| Error::ContextUnavailable(format!("thread pool: {}", e)))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name(format!("{}-io", config.app_name))
            .enable_all()
            .build()
            .map_err(|e| Error::ContextUnavailable(format!("io runtime: {}", e)))?;

        info!(
            app = %config.app_name,
            threads = pool.current_num_threads(),
            "execution context acquired"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                app_name: config.app_name,
                pool,
                runtime: Mutex::new(Some(runtime)),
                storage: Storage::new(config.object_store),
                default_partitions: config.default_partitions,
                active: AtomicBool::new(true),
            }),
        })
    }

    /// Release the context. Datasets that still refer to it fail with
    /// [`Error::ContextUnavailable`] when evaluated.
    pub fn shutdown(self) {
        self.inner.active.store(false, Ordering::SeqCst);
        let runtime = match self.inner.runtime.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(runtime) = runtime {
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
        }
        info!(app = %self.inner.app_name, "execution context shut down");
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Number of threads stages run on.
    pub fn parallelism(&self) -> usize {
        self.inner.pool.current_num_threads()
    }

    /// Partition count used when neither the caller nor the parent dataset
    /// decides one.
    pub fn default_partitions(&self) -> usize {
        self.inner
            .default_partitions
            .unwrap_or_else(|| self.parallelism())
            .max(1)
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::ContextUnavailable(format!(
                "context `{}` has been shut down",
                self.inner.app_name
            )))
        }
    }

    pub(crate) fn io_handle(&self) -> Result<Handle> {
        self.ensure_active()?;
        let guard = self
            .inner
            .runtime
            .lock()
            .map_err(|_| Error::ContextUnavailable("io runtime lock poisoned".into()))?;
        guard
            .as_ref()
            .map(|rt| rt.handle().clone())
            .ok_or_else(|| Error::ContextUnavailable("io runtime has been released".into()))
    }

    pub(crate) fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    /// Run one stage of a job on the pool. A panic inside the stage becomes
    /// [`Error::TaskFailed`].
    pub(crate) fn run_stage<R, F>(&self, stage: &'static str, f: F) -> Result<R>
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.ensure_active()?;
        let started = Instant::now();
        let outcome = self
            .inner
            .pool
            .install(|| panic::catch_unwind(AssertUnwindSafe(f)));
        match outcome {
            Ok(out) => {
                debug!(stage, elapsed = ?started.elapsed(), "stage finished");
                Ok(out)
            }
            Err(payload) => Err(Error::TaskFailed {
                stage,
                message: panic_message(payload),
            }),
        }
    }

    /// A dataset of the lines of every file at `uri`.
    ///
    /// Lines end at `\n` (a preceding `\r` is dropped). The lines are spread
    /// over at least `min_partitions` partitions, default `min(parallelism, 2)`.
    pub fn text_file(&self, uri: &str, min_partitions: Option<usize>) -> Result<Dataset<String>> {
        let location: Location = uri.parse()?;
        let min_partitions = min_partitions.unwrap_or_else(|| self.parallelism().min(2));
        let source = uri.to_owned();

        Ok(Dataset::source(self.clone(), "text_file", move |ctx| {
            let rt = ctx.io_handle()?;
            let files = ctx.storage().read(&rt, &location)?;
            let n_files = files.len();
            let mut lines = Vec::new();
            for file in files {
                let text = utils::string_from_bytes(file.data)
                    .map_err(|e| Error::unreadable(&file.name, e))?;
                lines.extend(text.lines().map(str::to_owned));
            }
            debug!(source = %source, files = n_files, lines = lines.len(), "read input");
            Ok(split_even(lines, min_partitions.max(n_files)))
        }))
    }

    /// A dataset over an in-memory collection, split into `partitions`
    /// (default [`Context::default_partitions`]).
    pub fn parallelize<T>(&self, items: Vec<T>, partitions: Option<usize>) -> Dataset<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let partitions = partitions.unwrap_or_else(|| self.default_partitions());
        let items = Arc::new(items);
        Dataset::source(self.clone(), "parallelize", move |_| {
            Ok(split_even(items.as_ref().clone(), partitions))
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_owned()
    }
}
