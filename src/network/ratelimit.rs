//! Burst bucket rate limiter for outbound traffic.
//!
//! A token bucket holding up to `capacity` tokens, refilled one token per
//! `period`. Refills are credited in whole periods and `last_refill` moves
//! forward by exactly the credited amount, so frequent polling never loses
//! the fractional remainder of a period.
//!
//! The bucket never sleeps. [`BurstBucket::get`] either takes a token and
//! returns [`Duration::ZERO`], or returns how long the caller should wait
//! before asking again. It has a single caller (the drain loop) and no
//! internal synchronization.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct BurstBucket {
    capacity: u32,
    period: Duration,
    level: u32,
    last_refill: Instant,
}

impl BurstBucket {
    /// A full bucket. A zero capacity is raised to one.
    pub fn new(capacity: u32, period: Duration) -> Self {
        Self::starting_at(capacity, period, Instant::now())
    }

    pub fn starting_at(capacity: u32, period: Duration, now: Instant) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            period: period.max(Duration::from_millis(1)),
            level: capacity,
            last_refill: now,
        }
    }

    /// Take a token now, or learn how long to wait for one.
    pub fn get(&mut self) -> Duration {
        self.get_at(Instant::now())
    }

    pub fn get_at(&mut self, now: Instant) -> Duration {
        self.refill(now);

        if self.level > 0 {
            self.level -= 1;
            return Duration::ZERO;
        }

        let elapsed = now.saturating_duration_since(self.last_refill);
        self.period.saturating_sub(elapsed).max(Duration::from_nanos(1))
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed < self.period {
            return;
        }

        let periods = elapsed.as_nanos() / self.period.as_nanos();
        let credited = u32::try_from(periods).unwrap_or(u32::MAX);
        self.level = self.level.saturating_add(credited).min(self.capacity);
        // `credited * period <= elapsed`, so this never passes `now`.
        self.last_refill += self.period * credited;
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
