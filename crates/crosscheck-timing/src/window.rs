use std::time::Duration;

/// Accepted elapsed-time range for a transition. The lower bound is always
/// inclusive; the upper bound is inclusive unless built with [`Window::before`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub min: Duration,
    pub max: Duration,
    pub max_inclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimingViolation {
    #[error("Transition after {elapsed_ms} ms, before window opens at {min_ms} ms")]
    Premature { elapsed_ms: u64, min_ms: u64 },

    #[error("Transition after {elapsed_ms} ms, window closed at {max_ms} ms")]
    Late { elapsed_ms: u64, max_ms: u64 },
}

impl Window {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            max_inclusive: true,
        }
    }

    /// `[0, max]`.
    pub fn within(max: Duration) -> Self {
        Self::new(Duration::ZERO, max)
    }

    /// `[0, max)`.
    pub fn before(max: Duration) -> Self {
        Self {
            max_inclusive: false,
            ..Self::within(max)
        }
    }

    /// `[nominal - margin, nominal + margin]`, floored at zero.
    pub fn around(nominal: Duration, margin: Duration) -> Self {
        Self::new(nominal.saturating_sub(margin), nominal + margin)
    }

    pub fn check(&self, elapsed: Duration) -> Result<(), TimingViolation> {
        if elapsed < self.min {
            return Err(TimingViolation::Premature {
                elapsed_ms: millis(elapsed),
                min_ms: millis(self.min),
            });
        }
        if elapsed > self.max || (elapsed == self.max && !self.max_inclusive) {
            return Err(TimingViolation::Late {
                elapsed_ms: millis(elapsed),
                max_ms: millis(self.max),
            });
        }
        Ok(())
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
