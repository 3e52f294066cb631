//! Wrapping sequence counter for network-management exchanges.

use std::sync::atomic::{AtomicU8, Ordering};

/// A session-owned counter handing out sequence numbers in 1–255.
///
/// The counter never yields 0 and wraps from 255 back to 1. It lives on the
/// network session object and is created and torn down with it; there is no
/// process-wide instance.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    value: AtomicU8,
}

impl SequenceCounter {
    /// A fresh counter; the first [`next`](Self::next) returns 1.
    pub fn new() -> Self {
        Self {
            value: AtomicU8::new(0),
        }
    }

    /// Atomically advance and return the next sequence number.
    pub fn next(&self) -> u8 {
        let mut current = self.value.load(Ordering::Relaxed);
        loop {
            let next = if current >= u8::MAX { 1 } else { current + 1 };
            match self
                .value
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn never_yields_zero_and_wraps_to_one() {
        let counter = SequenceCounter::new();
        let values: Vec<u8> = (0..255).map(|_| counter.next()).collect();
        let expected: Vec<u8> = (1..=255).collect();
        assert_eq!(values, expected);
        // The 256th call wraps past 255 back to 1, skipping 0.
        assert_eq!(counter.next(), 1);
    }

    #[test]
    fn concurrent_use_stays_in_range() {
        let counter = Arc::new(SequenceCounter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let value = counter.next();
                        assert!((1..=255).contains(&value));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
