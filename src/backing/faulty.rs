//! Fault injecting backing allocator.

use super::{AllocFailure, BackingAllocator, HeapBacking};

/// A single allocation attempt seen by a [`FaultyBacking`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocAttempt {
    /// Requested buffer size in bytes.
    pub size: u64,
    /// Whether a buffer was handed out.
    pub succeeded: bool,
}

/// Wraps a backing allocator and makes allocations fail on demand.
///
/// Faults are checked in this order; the first that applies rejects the
/// attempt:
/// 1. the next `n` attempts, see [`FaultyBacking::fail_next`],
/// 2. every attempt, see [`FaultyBacking::fail_always`],
/// 3. attempts above a byte quota, see [`FaultyBacking::fail_above`],
/// 4. attempts drawn with a seeded probability, see
///    [`FaultyBacking::with_failure_rate`].
///
/// Attempts passing all checks are forwarded to the inner allocator. Every
/// attempt, successful or not, is counted and by default recorded. The record
/// grows with every attempt: long running users should either call
/// [`FaultyBacking::clear_attempts`] regularly or turn recording off with
/// [`FaultyBacking::record_attempts`].
#[derive(Debug, Clone)]
pub struct FaultyBacking<B = HeapBacking> {
    inner: B,
    fail_next: usize,
    fail_always: bool,
    quota: Option<u64>,
    failure_rate: f64,
    rng: fastrand::Rng,
    record: bool,
    attempts: Vec<AllocAttempt>,
    attempt_count: u64,
}

impl<B: BackingAllocator> FaultyBacking<B> {
    /// Wrap `inner`, injecting no faults until configured otherwise.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            fail_next: 0,
            fail_always: false,
            quota: None,
            failure_rate: 0.0,
            rng: fastrand::Rng::with_seed(0),
            record: true,
            attempts: Vec::new(),
            attempt_count: 0,
        }
    }

    /// Reject the next `n` attempts (in addition to other faults).
    pub fn fail_next(&mut self, n: usize) -> &mut Self {
        self.fail_next = n;
        self
    }

    /// Reject every attempt until [`Self::heal`] is called.
    pub fn fail_always(&mut self) -> &mut Self {
        self.fail_always = true;
        self
    }

    /// Reject attempts larger than `quota` bytes, like an engine enforcing a
    /// memory limit.
    pub fn fail_above(&mut self, quota: u64) -> &mut Self {
        self.quota = Some(quota);
        self
    }

    /// Reject attempts with probability `rate`, drawn from a generator seeded
    /// with `seed` so failures are reproducible.
    pub fn with_failure_rate(&mut self, rate: f64, seed: u64) -> &mut Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// Stop injecting faults.
    pub fn heal(&mut self) -> &mut Self {
        self.fail_next = 0;
        self.fail_always = false;
        self.quota = None;
        self.failure_rate = 0.0;
        self
    }

    /// Record attempts (the default) or only count them.
    pub fn record_attempts(&mut self, record: bool) -> &mut Self {
        self.record = record;
        self
    }

    /// Number of attempts seen so far, whether recorded or not.
    pub fn attempt_count(&self) -> u64 {
        self.attempt_count
    }

    /// All recorded attempts since the last [`Self::clear_attempts`], oldest
    /// first.
    pub fn attempts(&self) -> &[AllocAttempt] {
        &self.attempts
    }

    /// Sizes of all recorded attempts, oldest first.
    pub fn attempted_sizes(&self) -> Vec<u64> {
        self.attempts.iter().map(|attempt| attempt.size).collect()
    }

    pub fn clear_attempts(&mut self) {
        self.attempts.clear();
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn inject_fault(&mut self, size: u64) -> bool {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        if self.fail_always {
            return true;
        }
        if self.quota.is_some_and(|quota| size > quota) {
            return true;
        }
        self.failure_rate > 0.0 && self.rng.f64() < self.failure_rate
    }
}

impl<B: BackingAllocator> BackingAllocator for FaultyBacking<B> {
    type Buffer = B::Buffer;

    fn try_allocate(&mut self, size: u64) -> Result<Self::Buffer, AllocFailure> {
        let result = if self.inject_fault(size) {
            Err(AllocFailure::Injected { size })
        } else {
            self.inner.try_allocate(size)
        };
        self.attempt_count += 1;
        if self.record {
            self.attempts.push(AllocAttempt {
                size,
                succeeded: result.is_ok(),
            });
        }
        result
    }
}
