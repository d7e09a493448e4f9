//! Bounded fan-out/join over a rayon pool
//!
//! Each unit runs as one task. A task that fails trips a stage-local
//! cancellation so tasks that have not started yet are skipped; tasks already
//! running finish normally. The join returns results in unit order, or every
//! failure attributed to its unit.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{EspressoError, EspressoResult, UnitFailure};
use crate::signal::Cancellation;

pub struct WorkerPool {
    pool: ThreadPool,
}

enum Outcome<R> {
    Done(R),
    Failed(UnitFailure),
    Skipped,
}

impl WorkerPool {
    /// Pool of `jobs` threads, or one per available CPU.
    pub fn new(jobs: Option<usize>) -> EspressoResult<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("espresso-worker-{}", i));
        if let Some(jobs) = jobs {
            builder = builder.num_threads(jobs.max(1));
        }
        Ok(Self { pool: builder.build()? })
    }

    pub fn jobs(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `task` for every unit and wait for all of them.
    ///
    /// `label` names a unit in error reports. Returns `Cancelled` if
    /// `cancellation` was tripped from outside and nothing failed.
    pub fn fan_out<T, R, L, F>(
        &self,
        stage: &'static str,
        units: &[T],
        cancellation: &Cancellation,
        label: L,
        task: F,
    ) -> EspressoResult<Vec<R>>
    where
        T: Sync,
        R: Send,
        L: Fn(&T) -> String + Sync,
        F: Fn(&T) -> EspressoResult<R> + Sync,
    {
        let stage_cancel = Cancellation::new();

        let outcomes: Vec<Outcome<R>> = self.pool.install(|| {
            units
                .par_iter()
                .map(|unit| {
                    if cancellation.is_cancelled() || stage_cancel.is_cancelled() {
                        return Outcome::Skipped;
                    }
                    match task(unit) {
                        Ok(result) => Outcome::Done(result),
                        Err(error) => {
                            stage_cancel.cancel();
                            let unit = label(unit);
                            tracing::debug!(stage, unit = %unit, "task failed");
                            Outcome::Failed(UnitFailure { unit, error })
                        }
                    }
                })
                .collect()
        });

        let mut results = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        let mut skipped = 0usize;
        for outcome in outcomes {
            match outcome {
                Outcome::Done(result) => results.push(result),
                Outcome::Failed(failure) => failures.push(failure),
                Outcome::Skipped => skipped += 1,
            }
        }

        if !failures.is_empty() {
            if skipped > 0 {
                tracing::debug!(stage, skipped, "tasks skipped after failure");
            }
            return Err(EspressoError::Stage { stage, failures });
        }
        if skipped > 0 {
            return Err(EspressoError::Cancelled);
        }
        Ok(results)
    }
}
