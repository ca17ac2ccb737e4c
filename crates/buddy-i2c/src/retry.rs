use core::ops::ControlFlow;

use crate::status::{Attempt, I2cError};

/// Bounded retry state machine.
///
/// Feed it the classification of every attempt; it says whether to go on or
/// what the final result is. At least one attempt is always allowed.
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    bound: u32,
    attempts: u32,
}

impl Retry {
    pub const fn new(bound: u32) -> Self {
        Self {
            bound: if bound == 0 { 1 } else { bound },
            attempts: 0,
        }
    }

    /// Number of attempts recorded so far.
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub const fn exhausted(&self) -> bool {
        self.attempts >= self.bound
    }

    pub fn step(
        &mut self,
        attempt: Attempt,
    ) -> ControlFlow<Result<(), I2cError>> {
        self.attempts = self.attempts.saturating_add(1);
        match attempt {
            Attempt::Done(result) => ControlFlow::Break(result),
            Attempt::Retry(err) if self.exhausted() => {
                ControlFlow::Break(Err(err))
            }
            Attempt::Retry(_) => ControlFlow::Continue(()),
        }
    }
}
