use crate::libs::error::MiError;

/// Worker pool shared by the pair, identity and chunk stages.
///
/// Every parallel section of the pipeline goes through [`WorkerPool::install`],
/// so the number of threads is fixed once per pipeline instead of per call site.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    jobs: usize,
}

/// All cores but one, never less than one.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

impl WorkerPool {
    /// `None` selects [`default_jobs`].
    pub fn new(jobs: Option<usize>) -> Result<Self, MiError> {
        let jobs = jobs.unwrap_or_else(default_jobs);
        if jobs == 0 {
            return Err(MiError::InvalidParams(
                "number of jobs must be positive".to_string(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| MiError::InvalidParams(format!("cannot build thread pool: {}", e)))?;

        Ok(WorkerPool { pool, jobs })
    }

    /// A single-threaded pool, handy for tests and deterministic runs.
    pub fn serial() -> Result<Self, MiError> {
        Self::new(Some(1))
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Runs `op` inside the pool; rayon iterators used by `op` stay in it.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}
