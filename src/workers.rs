use crate::error::{ Error, Result };


/// Injected execution context for bulk parallel operations.
///
/// Wraps a work-stealing [rayon::ThreadPool] whose degree defaults to
/// the hardware core count. Graph scans, snapshot decay and parallel
/// connected components all run through an explicit `Workers` value
/// instead of process-wide pool state, so tests can substitute a
/// single-threaded context.

#[derive(Debug)]
pub struct Workers {
  pool: rayon::ThreadPool,
}

impl Workers {
  /// Pool sized to the available hardware cores.

  pub fn hardware() -> Result<Self> {
    Self::with_threads(0)
  }

  /// Pool with an explicit degree; `0` means the rayon default
  /// (one worker per core).

  pub fn with_threads(threads: usize) -> Result<Self> {
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(threads)
      .build()
      .map_err(|e| Error::Pool(e.to_string()) )?;
    Ok(Self { pool })
  }

  /// Deterministic single-worker context for tests.

  pub fn serial() -> Result<Self> {
    Self::with_threads(1)
  }

  pub fn threads(&self) -> usize {
    self.pool.current_num_threads()
  }

  /// Run `f` inside the pool; rayon parallel iterators used within
  /// are serviced by this pool's workers.

  pub fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
    self.pool.install(f)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rayon::prelude::*;

  #[test]
  fn bounded_degree() {
    let workers = Workers::with_threads(2).unwrap();
    assert_eq!(workers.threads(), 2);
  }

  #[test]
  fn install_runs_in_pool() {
    let workers = Workers::serial().unwrap();
    let sum: usize = workers.install(|| (0..100usize).into_par_iter().sum() );
    assert_eq!(sum, 4950);
  }
}
