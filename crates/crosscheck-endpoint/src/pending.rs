//! Single-slot rendezvous between a notification callback and a reader.
//!
//! The reader arms the slot, triggers the remote change, then waits with a
//! bound. The notification path delivers into the slot at any time; only a
//! delivery that finds the slot armed is kept. Unsolicited or late
//! deliveries are dropped so they cannot satisfy a future read.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crosscheck_signal::SignalVector;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("A read is already pending")]
    AlreadyArmed,

    #[error("Wait without a pending read")]
    NotArmed,

    #[error("No delivery within {waited_ms} ms")]
    TimedOut { waited_ms: u64 },
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Armed,
    Fulfilled(SignalVector),
}

#[derive(Debug, Default)]
pub struct PendingRead {
    slot: Mutex<Slot>,
    notify: Notify,
}

impl PendingRead {
    pub fn new() -> Self {
        Self::default()
    }

    /// `empty -> armed`. Overlapping reads are not supported.
    pub fn arm(&self) -> Result<(), SlotError> {
        let mut slot = self.lock();
        match *slot {
            Slot::Empty => {
                *slot = Slot::Armed;
                Ok(())
            }
            Slot::Armed | Slot::Fulfilled(_) => Err(SlotError::AlreadyArmed),
        }
    }

    /// Fulfill an armed slot. Returns whether the value was kept.
    pub fn deliver(&self, value: SignalVector) -> bool {
        let mut slot = self.lock();
        if !matches!(*slot, Slot::Armed) {
            return false;
        }
        *slot = Slot::Fulfilled(value);
        drop(slot);
        self.notify.notify_one();
        true
    }

    /// Wait until the armed slot is fulfilled or `timeout` elapses. Either
    /// way the slot is empty afterwards.
    pub async fn wait_bounded(&self, timeout: Duration) -> Result<SignalVector, SlotError> {
        let waited = tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                match self.take() {
                    Ok(Some(value)) => return Ok(value),
                    Ok(None) => notified.await,
                    Err(err) => return Err(err),
                }
            }
        })
        .await;

        match waited {
            Ok(result) => result,
            Err(_) => {
                self.clear();
                Err(SlotError::TimedOut {
                    waited_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// True while a read is outstanding, fulfilled or not.
    pub fn is_armed(&self) -> bool {
        !matches!(*self.lock(), Slot::Empty)
    }

    /// Drop any armed or fulfilled state.
    pub fn clear(&self) {
        *self.lock() = Slot::Empty;
    }

    fn take(&self) -> Result<Option<SignalVector>, SlotError> {
        let mut slot = self.lock();
        match std::mem::take(&mut *slot) {
            Slot::Empty => Err(SlotError::NotArmed),
            Slot::Armed => {
                *slot = Slot::Armed;
                Ok(None)
            }
            Slot::Fulfilled(value) => Ok(Some(value)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(text: &str) -> SignalVector {
        text.parse().unwrap()
    }

    #[test]
    fn test_double_arm_rejected() {
        let pending = PendingRead::new();
        pending.arm().unwrap();
        assert_eq!(pending.arm(), Err(SlotError::AlreadyArmed));
    }

    #[test]
    fn test_unsolicited_delivery_dropped() {
        let pending = PendingRead::new();
        assert!(!pending.deliver(vector("1")));
        assert!(!pending.is_armed());
    }

    #[test]
    fn test_duplicate_delivery_keeps_first() {
        let pending = PendingRead::new();
        pending.arm().unwrap();
        assert!(pending.deliver(vector("1")));
        assert!(!pending.deliver(vector("0")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_without_arm_is_violation() {
        let pending = PendingRead::new();
        let err = pending
            .wait_bounded(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err, SlotError::NotArmed);
    }
}
