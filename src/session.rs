//! Runs the session state machine: owns its timers, clock and reset signal.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::state::{Effect, Event, Machine, Phase, SessionContext, Timer, Timings};
use crate::theory::Catalog;

#[derive(Copy, Clone, Debug)]
struct PendingTimer {
    timer: Timer,
    deadline: Instant,
}

/// One training session per window, reset in place on replay.
///
/// Timers are deadlines fired by [`Session::advance`]. A timer's follow-ups are
/// scheduled from its own deadline, not from the time `advance` happened to be
/// called, so a late poll never stretches the countdown.
#[derive(Debug)]
pub struct Session {
    machine: Machine,
    catalog: Catalog,
    rng: StdRng,
    timers: Vec<PendingTimer>,
    clock_running: bool,
    piano_reset: bool,
}

impl Session {
    pub fn new(timings: Timings, rng: StdRng) -> Self {
        Self {
            machine: Machine::new(timings),
            catalog: Catalog::new(),
            rng,
            timers: Vec::new(),
            clock_running: false,
            piano_reset: false,
        }
    }

    /// Session whose chord order is reproducible when a seed is given.
    pub fn with_seed(timings: Timings, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(timings, rng)
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn context(&self) -> &SessionContext {
        self.machine.context()
    }

    /// Fraction of the catalog played so far, in `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        if self.catalog.is_empty() {
            return 0.0;
        }
        self.context().played_chords.len() as f32 / self.catalog.len() as f32
    }

    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.context().elapsed(now)
    }

    /// Whether the elapsed-time display should keep refreshing.
    pub fn is_clock_running(&self) -> bool {
        self.clock_running
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.deadline).min()
    }

    pub fn send(&mut self, event: Event, now: Instant) {
        self.dispatch(event, now);
    }

    /// Fires every timer due at `now`, earliest first.
    pub fn advance(&mut self, now: Instant) {
        while let Some(index) = self.next_due(now) {
            let due = self.timers.remove(index);
            self.dispatch(Event::TimerElapsed(due.timer), due.deadline);
        }
    }

    /// Returns whether the machine asked for the piano to be released since the last call.
    pub fn take_piano_reset(&mut self) -> bool {
        std::mem::take(&mut self.piano_reset)
    }

    fn next_due(&self, now: Instant) -> Option<usize> {
        self.timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| t.deadline)
            .map(|(index, _)| index)
    }

    fn dispatch(&mut self, event: Event, at: Instant) {
        let effects = self.machine.handle(event, &self.catalog, at, &mut self.rng);
        for effect in effects {
            self.apply(effect, at);
        }
    }

    fn apply(&mut self, effect: Effect, at: Instant) {
        match effect {
            Effect::Schedule(timer, delay) => {
                self.timers.retain(|t| t.timer != timer);
                self.timers.push(PendingTimer {
                    timer,
                    deadline: at + delay,
                });
            }
            Effect::Cancel(timer) => {
                if self.timers.iter().any(|t| t.timer == timer) {
                    debug!("Cancelling {:?} timer", timer);
                }
                self.timers.retain(|t| t.timer != timer);
            }
            Effect::ResetPiano => self.piano_reset = true,
            Effect::StartClock => self.clock_running = true,
            Effect::StopClock => self.clock_running = false,
        }
    }
}

/// Seconds with two decimals, e.g. `"12.34s"`.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}
