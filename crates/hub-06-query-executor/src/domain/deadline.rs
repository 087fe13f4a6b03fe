use std::time::{Duration, Instant};

use super::errors::QueryError;

/// Point in time after which a running query gives up. Workers check it
/// between rows, so an abandoned query frees its worker promptly.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn timeout_error(&self) -> QueryError {
        QueryError::Timeout {
            ms: self.budget.as_millis() as u64,
        }
    }

    pub fn check(&self) -> Result<(), QueryError> {
        if Instant::now() >= self.at {
            Err(self.timeout_error())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_deadline_reports_budget() {
        let deadline = Deadline::after(Duration::ZERO);
        assert_eq!(deadline.check(), Err(QueryError::Timeout { ms: 0 }));
        assert!(Deadline::after(Duration::from_secs(60)).check().is_ok());
    }
}
