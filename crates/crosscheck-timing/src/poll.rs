use std::time::Duration;

use crosscheck_endpoint::{Endpoint, EndpointError};
use crosscheck_signal::SignalVector;
use tokio::time::Instant;

use crate::window::millis;

#[derive(Debug, thiserror::Error)]
pub enum AwaitError {
    #[error("{target} not reached within {waited_ms} ms (last observed {})", display_last(.last_observed))]
    Timeout {
        target: SignalVector,
        last_observed: Option<SignalVector>,
        waited_ms: u64,
    },

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

fn display_last(last: &Option<SignalVector>) -> String {
    last.as_ref()
        .map_or_else(|| "nothing".to_string(), ToString::to_string)
}

/// Poll `endpoint` until its inputs equal `target`, giving up once `max`
/// has elapsed. Returns the elapsed time at the matching observation.
///
/// Only the first `target.len()` inputs are compared, so lines wired beyond
/// the script's channels do not matter. Reaching the target early is not an
/// error here; the caller checks the elapsed time against the lower bound of
/// its window.
pub async fn await_state(
    endpoint: &mut dyn Endpoint,
    target: &SignalVector,
    max: Duration,
    poll_interval: Duration,
) -> Result<Duration, AwaitError> {
    let started = Instant::now();
    loop {
        let observed = endpoint.get_inputs().await?.prefix(target.len());
        let elapsed = started.elapsed();
        if observed == *target {
            return Ok(elapsed);
        }
        if elapsed >= max {
            return Err(AwaitError::Timeout {
                target: target.clone(),
                last_observed: Some(observed),
                waited_ms: millis(elapsed),
            });
        }
        tokio::time::sleep(poll_interval).await;
    }
}
