use std::sync::{Arc, Mutex};

use crosscheck_endpoint::{Direction, LineDriver, TransportFault};

use crate::bench::{lock, BenchState};

/// The harness host's digital lines on a [`SimBench`](crate::SimBench).
pub struct SimLines {
    state: Arc<Mutex<BenchState>>,
}

impl SimLines {
    pub(crate) fn new(state: Arc<Mutex<BenchState>>) -> Self {
        Self { state }
    }
}

impl LineDriver for SimLines {
    fn configure_line(&mut self, pin: u32, direction: Direction) -> Result<(), TransportFault> {
        let mut state = lock(&self.state);
        let wired = match direction {
            Direction::Output => state.wiring.outputs.contains(&pin),
            Direction::Input => state.wiring.inputs.contains(&pin),
        };
        if !wired {
            return Err(TransportFault::new(format!(
                "line {pin} is not wired as {direction:?}"
            )));
        }
        state.directions.insert(pin, direction);
        Ok(())
    }

    fn write_line(&mut self, pin: u32, high: bool) -> Result<(), TransportFault> {
        let notification = {
            let mut state = lock(&self.state);
            if state.directions.get(&pin) != Some(&Direction::Output) {
                return Err(TransportFault::new(format!("line {pin} is not an output")));
            }
            state.set_harness_level(pin, high)
        };
        // Delivered outside the bench lock; the handler may take its own.
        if let Some((handler, payload)) = notification {
            handler(&payload);
        }
        Ok(())
    }

    fn read_line(&mut self, pin: u32) -> Result<bool, TransportFault> {
        let state = lock(&self.state);
        match state.directions.get(&pin) {
            Some(Direction::Input) => {
                let channel = state
                    .wiring
                    .inputs
                    .iter()
                    .position(|&p| p == pin)
                    .ok_or_else(|| TransportFault::new(format!("line {pin} is not wired")))?;
                Ok(state.peer_outputs.get(channel).copied().unwrap_or(false))
            }
            Some(Direction::Output) => Ok(state.harness_levels.get(&pin).copied().unwrap_or(false)),
            None => Err(TransportFault::new(format!("line {pin} is not configured"))),
        }
    }

    fn read_lines(&mut self, pins: &[u32]) -> Result<Vec<bool>, TransportFault> {
        pins.iter().map(|&pin| self.read_line(pin)).collect()
    }

    fn cleanup(&mut self) -> Result<(), TransportFault> {
        lock(&self.state).directions.clear();
        Ok(())
    }
}
