//! Discrete-event simulator
//!
//! Owns the event queue and the simulation clock. The clock only moves by
//! popping the next event. Exactly one event is handled at a time and runs to
//! completion before the next one is popped.

use log::{debug, info};

use crate::beam_event_queue::EventQueue;
use crate::beam_interface::{SimError, SimTime};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimState {
    Idle,
    Running,
    Stopped,
}

/// Receiver of popped events. Handlers get the simulator back so they can
/// schedule follow-up events or call `stop()`.
pub trait EventHandler<E> {
    fn handle(&mut self, sim: &mut Simulator<E>, event: E) -> Result<(), SimError>;
}

pub struct Simulator<E> {
    queue: EventQueue<E>,
    now: SimTime,
    state: SimState,
    stop_requested: bool,
    executed: u64,
}

impl<E> Simulator<E> {
    pub fn new() -> Self {
        Self {
            queue: EventQueue::new(),
            now: 0.0,
            state: SimState::Idle,
            stop_requested: false,
            executed: 0,
        }
    }

    pub fn current_time(&self) -> SimTime {
        self.now
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn next_event_time(&self) -> Option<SimTime> {
        self.queue.peek_time()
    }

    /// Number of events handled since construction or the last reset
    pub fn executed_events(&self) -> u64 {
        self.executed
    }

    /// Schedule `payload` to fire `delay` ms from now
    pub fn schedule(&mut self, delay: SimTime, payload: E) -> Result<u64, SimError> {
        if delay.is_nan() || delay < 0.0 {
            return Err(SimError::InvalidSchedule(format!(
                "delay {} at t={} is negative",
                delay, self.now
            )));
        }
        Ok(self.queue.push(self.now + delay, payload))
    }

    /// Schedule `payload` at an absolute time, which must not lie in the past
    pub fn schedule_at(&mut self, due_time: SimTime, payload: E) -> Result<u64, SimError> {
        if due_time.is_nan() || due_time < self.now {
            return Err(SimError::InvalidSchedule(format!(
                "due time {} is before the clock ({})",
                due_time, self.now
            )));
        }
        Ok(self.queue.push(due_time, payload))
    }

    /// Ask a running simulation to stop once the current event returns
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    /// Drop all pending events and rewind the clock to zero
    pub fn reset(&mut self) -> Result<(), SimError> {
        if self.state == SimState::Running {
            return Err(SimError::InvalidSchedule(
                "reset called while running".to_string(),
            ));
        }
        self.queue.clear();
        self.now = 0.0;
        self.executed = 0;
        self.stop_requested = false;
        self.state = SimState::Idle;
        Ok(())
    }

    /// Drain events until the queue is empty, `stop()` is called, or the next
    /// event is due after `max_time`. Events past `max_time` stay queued.
    ///
    /// Returns the clock value at exit, i.e. the due time of the last handled event.
    pub fn run<H: EventHandler<E>>(
        &mut self,
        handler: &mut H,
        max_time: Option<SimTime>,
    ) -> Result<SimTime, SimError> {
        if self.state == SimState::Running {
            return Err(SimError::InvalidSchedule(
                "run called while already running".to_string(),
            ));
        }

        info!(
            "simulation starting at t={} with {} pending events",
            self.now,
            self.queue.len()
        );
        self.state = SimState::Running;
        self.stop_requested = false;

        let result = self.drain(handler, max_time);
        self.state = SimState::Stopped;

        match &result {
            Ok(time) => info!(
                "simulation stopped at t={} after {} events ({} pending)",
                time,
                self.executed,
                self.queue.len()
            ),
            Err(e) => info!("simulation aborted at t={}: {}", self.now, e),
        }
        result
    }

    fn drain<H: EventHandler<E>>(
        &mut self,
        handler: &mut H,
        max_time: Option<SimTime>,
    ) -> Result<SimTime, SimError> {
        loop {
            if self.stop_requested {
                debug!("stop requested at t={}", self.now);
                break;
            }

            let next = match self.queue.peek_time() {
                Some(time) => time,
                None => break,
            };
            if let Some(max) = max_time {
                if next > max {
                    debug!("next event at t={} is past max_time {}", next, max);
                    break;
                }
            }

            let event = match self.queue.pop_earliest() {
                Some(event) => event,
                None => break,
            };
            if event.due_time < self.now {
                return Err(SimError::InvalidSchedule(format!(
                    "event #{} due at {} popped with clock at {}",
                    event.sequence, event.due_time, self.now
                )));
            }

            self.now = event.due_time;
            self.executed += 1;
            handler.handle(self, event.payload)?;
        }

        Ok(self.now)
    }
}

impl<E> Default for Simulator<E> {
    fn default() -> Self {
        Self::new()
    }
}
