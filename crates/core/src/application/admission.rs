// Admission Control
// Caps the number of prediction subprocesses alive at once

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::{AppError, Result};

pub struct AdmissionControl {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionControl {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Take a slot without waiting
    ///
    /// The slot is released when the permit is dropped.
    pub fn try_admit(&self) -> Result<OwnedSemaphorePermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => AppError::Busy(format!(
                    "all {} prediction slots in use",
                    self.capacity
                )),
                TryAcquireError::Closed => AppError::Internal("admission closed".to_string()),
            })
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_capacity() {
        let admission = AdmissionControl::new(2);
        let a = admission.try_admit().unwrap();
        let _b = admission.try_admit().unwrap();
        assert_eq!(admission.in_flight(), 2);
        assert!(matches!(admission.try_admit(), Err(AppError::Busy(_))));

        drop(a);
        assert_eq!(admission.in_flight(), 1);
        assert!(admission.try_admit().is_ok());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let admission = AdmissionControl::new(0);
        assert_eq!(admission.capacity(), 1);
        assert!(admission.try_admit().is_ok());
    }
}
