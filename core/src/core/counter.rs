use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicUsize, Ordering::Relaxed},
        Arc,
    },
    time::{Duration, Instant},
};

use crate::{asserted_short_name, fmt_num, prelude::*};

/// Failure of a bounded counter operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CounterError {
    #[error("failed to acquire counter lock within {timeout:?}")]
    AcquireTimeout { timeout: Duration },
}

#[derive(Debug)]
enum CounterCell {
    /// racy on purpose: the read-modify-write is split into a Relaxed load and a Relaxed
    /// store so that concurrent increments can lose updates, the final value is only ever
    /// less than or equal to the number of increments issued
    Unguarded(AtomicUsize),
    Guarded(spin::Mutex<usize>),
}

/// Shared counter whose single increment operation is gated by a [SyncPolicy] fixed at
/// construction time. The counter itself is the only mutable state and is never exposed
/// outside of this struct.
#[derive(Debug)]
pub struct ConcurrentCounter {
    policy: SyncPolicy,
    cell: CounterCell,
}
impl ConcurrentCounter {
    pub fn new(policy: SyncPolicy) -> Self {
        let cell = match policy {
            SyncPolicy::None => CounterCell::Unguarded(AtomicUsize::new(0)),
            SyncPolicy::Mutex => CounterCell::Guarded(spin::Mutex::new(0)),
        };
        Self { policy, cell }
    }
    pub fn new_ref(policy: SyncPolicy) -> Arc<Self> {
        Arc::new(Self::new(policy))
    }
    #[inline(always)]
    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }
    /// Performs exactly one read-modify-write of the counter. Under [SyncPolicy::Mutex] the
    /// increment is the entire critical section and the guard is released on all exit paths,
    /// including unwind. Under [SyncPolicy::None] no protection is applied.
    #[inline(always)]
    pub fn increment_once(&self) {
        match &self.cell {
            CounterCell::Unguarded(count) => {
                let current = count.load(Relaxed);
                count.store(current + 1, Relaxed);
            }
            CounterCell::Guarded(count) => {
                *count.lock() += 1;
            }
        }
    }
    /// Like [Self::increment_once] but bounds lock acquisition by retrying [spin::Mutex::try_lock]
    /// until `timeout` elapses. Under [SyncPolicy::None] it cannot fail.
    pub fn try_increment_once(&self, timeout: Duration) -> Result<(), CounterError> {
        match &self.cell {
            CounterCell::Unguarded(count) => {
                let current = count.load(Relaxed);
                count.store(current + 1, Relaxed);
                Ok(())
            }
            CounterCell::Guarded(count) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(mut guard) = count.try_lock() {
                        *guard += 1;
                        return Ok(());
                    }
                    if Instant::now() >= deadline {
                        return Err(CounterError::AcquireTimeout { timeout });
                    }
                    std::hint::spin_loop();
                }
            }
        }
    }
    #[inline(always)]
    pub fn value(&self) -> usize {
        match &self.cell {
            CounterCell::Unguarded(count) => count.load(Relaxed),
            CounterCell::Guarded(count) => *count.lock(),
        }
    }
}
impl Display for ConcurrentCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<policy: {}, value: {}>", asserted_short_name!("ConcurrentCounter", Self), self.policy, fmt_num!(self.value()))
    }
}
