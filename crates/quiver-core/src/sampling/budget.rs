//! Comparison budget and wall-clock circuit breaker.

use std::time::{Duration, Instant};

/// Wall-clock cutoff for one relationship calculation.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreaker {
    started: Instant,
    limit: Duration,
}

impl CircuitBreaker {
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// True once the elapsed time exceeds the limit.
    pub fn tripped(&self) -> bool {
        self.elapsed() > self.limit
    }
}

/// Counts relevance calls against a fixed maximum.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonBudget {
    max: usize,
    used: usize,
}

impl ComparisonBudget {
    pub fn new(max: usize) -> Self {
        Self { max, used: 0 }
    }

    /// Reserve one comparison. Returns false when nothing is left.
    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.max {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> usize {
        self.max - self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_stops_at_max() {
        let mut budget = ComparisonBudget::new(2);
        assert!(budget.try_consume());
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
        assert_eq!(budget.used(), 2);
        assert_eq!(budget.remaining(), 0);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn test_zero_limit_breaker_trips() {
        let breaker = CircuitBreaker::start(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        assert!(breaker.tripped());
        assert!(!CircuitBreaker::start(Duration::from_secs(60)).tripped());
    }
}
