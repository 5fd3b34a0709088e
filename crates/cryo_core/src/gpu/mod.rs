//! GPU slot pool.
//!
//! GPU-bound jobs lease one device id for the duration of a single tool
//! run. A device is never leased to two jobs at once; leases return to the
//! pool on drop, so a failed or panicking job cannot leak its device.

mod detect;

use std::collections::{HashSet, VecDeque};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

pub use detect::{detect_gpus, parse_gpu_list};

/// Errors from GPU discovery and pool construction.
#[derive(Error, Debug)]
pub enum GpuError {
    /// No device ids were given or found.
    #[error("No GPUs available")]
    NoGpus,

    /// The same device id was listed twice.
    #[error("GPU id {0} listed more than once")]
    Duplicate(u32),

    /// A GPU list could not be parsed.
    #[error("Invalid GPU list '{0}': expected comma-separated ids")]
    InvalidList(String),

    /// The device query tool could not be run or failed.
    #[error("GPU query failed: {0}")]
    QueryFailed(String),
}

/// Result type for GPU operations.
pub type GpuResult<T> = Result<T, GpuError>;

/// Fixed set of GPU ids shared by concurrent jobs.
#[derive(Debug)]
pub struct GpuPool {
    ids: Vec<u32>,
    free: Mutex<VecDeque<u32>>,
    released: Condvar,
}

impl GpuPool {
    /// Create a pool over the given device ids.
    pub fn new(ids: Vec<u32>) -> GpuResult<Self> {
        if ids.is_empty() {
            return Err(GpuError::NoGpus);
        }
        let mut seen = HashSet::new();
        for id in &ids {
            if !seen.insert(*id) {
                return Err(GpuError::Duplicate(*id));
            }
        }

        Ok(Self {
            free: Mutex::new(ids.iter().copied().collect()),
            ids,
            released: Condvar::new(),
        })
    }

    /// Block until a device is free and lease it.
    pub fn acquire(&self) -> GpuLease<'_> {
        let mut free = self.free.lock();
        loop {
            if let Some(id) = free.pop_front() {
                tracing::trace!("Leased GPU {}", id);
                return GpuLease { pool: self, id };
            }
            self.released.wait(&mut free);
        }
    }

    /// Lease a device if one is free right now.
    pub fn try_acquire(&self) -> Option<GpuLease<'_>> {
        let id = self.free.lock().pop_front()?;
        Some(GpuLease { pool: self, id })
    }

    /// Number of devices currently free.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Total number of devices.
    pub fn capacity(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    fn release(&self, id: u32) {
        self.free.lock().push_back(id);
        tracing::trace!("Released GPU {}", id);
        self.released.notify_one();
    }
}

/// Exclusive use of one GPU. Returned to the pool on drop.
#[derive(Debug)]
pub struct GpuLease<'a> {
    pool: &'a GpuPool,
    id: u32,
}

impl GpuLease<'_> {
    /// Device id to pass to the tool.
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Drop for GpuLease<'_> {
    fn drop(&mut self) {
        self.pool.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn rejects_empty_and_duplicate_ids() {
        assert!(matches!(GpuPool::new(vec![]), Err(GpuError::NoGpus)));
        assert!(matches!(GpuPool::new(vec![0, 1, 0]), Err(GpuError::Duplicate(0))));
    }

    #[test]
    fn lease_returns_on_drop() {
        let pool = GpuPool::new(vec![3]).unwrap();
        {
            let lease = pool.acquire();
            assert_eq!(lease.id(), 3);
            assert_eq!(pool.available(), 0);
            assert!(pool.try_acquire().is_none());
        }
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn never_leases_a_device_twice() {
        let pool = GpuPool::new(vec![0, 1]).unwrap();
        let holders = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let in_use = Mutex::new(HashSet::new());

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..5 {
                        let lease = pool.acquire();
                        assert!(in_use.lock().insert(lease.id()));
                        let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(1));
                        holders.fetch_sub(1, Ordering::SeqCst);
                        in_use.lock().remove(&lease.id());
                    }
                });
            }
        });

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn lease_released_when_holder_panics() {
        let pool = GpuPool::new(vec![0]).unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _lease = pool.acquire();
            panic!("tool crashed");
        }));
        assert!(result.is_err());
        assert_eq!(pool.available(), 1);
    }
}
