use credex_core::{Clock, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock that only moves when told to. Used to pin ledger transaction times
/// in tests and scenario runs.
#[derive(Debug)]
pub struct ManualClock {
    seconds: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            seconds: AtomicU64::new(start.as_secs()),
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.seconds.store(at.as_secs(), Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) -> Timestamp {
        let prev = self.seconds.fetch_add(seconds, Ordering::SeqCst);
        Timestamp(prev + seconds)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.seconds.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(Timestamp(100));
        assert_eq!(clock.now(), Timestamp(100));
        assert_eq!(clock.advance(10), Timestamp(110));
        clock.set(Timestamp(500));
        assert_eq!(clock.now(), Timestamp(500));
    }

    #[test]
    fn test_system_clock_is_recent() {
        assert!(SystemClock.now() > Timestamp(1_600_000_000));
    }
}
