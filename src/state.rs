//! The session state machine: phases, events and the effects each transition asks for.

use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::input::HeldNotes;
use crate::matcher::is_match_held;
use crate::theory::{Catalog, Chord};

/// Delays of the timed phases.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timings {
    /// Time each countdown digit stays on screen.
    pub countdown_step: Duration,
    /// Time the success screen stays up after a correct chord.
    pub correct_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            countdown_step: Duration::from_millis(500),
            correct_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Countdown {
    Three,
    Two,
    One,
}

impl Countdown {
    pub fn digit(self) -> u8 {
        match self {
            Countdown::Three => 3,
            Countdown::Two => 2,
            Countdown::One => 1,
        }
    }

    fn next(self) -> Option<Countdown> {
        match self {
            Countdown::Three => Some(Countdown::Two),
            Countdown::Two => Some(Countdown::One),
            Countdown::One => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Round {
    /// Waiting for the current chord to be played.
    Idle,
    /// The current chord was played, showing success before moving on.
    Correct,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Config,
    Starting(Countdown),
    Playing(Round),
    Finished,
}

impl Phase {
    pub fn is_playing(self) -> bool {
        matches!(self, Phase::Playing(_))
    }
}

/// Timers the machine can ask the runtime to run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Timer {
    Countdown,
    Correct,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    PressStart,
    PlayNotes(HeldNotes),
    Replay,
    TimerElapsed(Timer),
}

/// Side effects requested by a transition, carried out by [`crate::session::Session`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Schedule(Timer, Duration),
    Cancel(Timer),
    /// Release every held note on every input.
    ResetPiano,
    StartClock,
    StopClock,
}

/// Progress of one run through the catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub current_chord: Option<Chord>,
    /// Chords played correctly, in order. Never contains duplicates.
    pub played_chords: Vec<Chord>,
    pub start_time: Option<Instant>,
    pub finish_time: Option<Instant>,
}

impl SessionContext {
    /// Time since `playing` was entered, frozen once the run finishes.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        let start = self.start_time?;
        let end = self.finish_time.unwrap_or(now);
        Some(end.saturating_duration_since(start))
    }
}

/// The session protocol: `config -> starting(3, 2, 1) -> playing(idle <-> correct) -> finished`.
///
/// `handle` is the whole transition function. Time and randomness come in as
/// arguments and everything the outside world must do comes back as [`Effect`]s,
/// so the machine never touches a clock, timer or input device itself.
#[derive(Clone, Debug)]
pub struct Machine {
    phase: Phase,
    context: SessionContext,
    timings: Timings,
}

impl Machine {
    pub fn new(timings: Timings) -> Self {
        Self {
            phase: Phase::Config,
            context: SessionContext::default(),
            timings,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn handle<R: Rng + ?Sized>(
        &mut self,
        event: Event,
        catalog: &Catalog,
        now: Instant,
        rng: &mut R,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        match (self.phase, event) {
            (Phase::Config, Event::PressStart) => {
                self.enter_starting(Countdown::Three, &mut effects);
            }
            (Phase::Starting(step), Event::TimerElapsed(Timer::Countdown)) => match step.next() {
                Some(next) => self.enter_starting(next, &mut effects),
                None => self.enter_playing(catalog, now, rng, &mut effects),
            },
            (Phase::Playing(Round::Idle), Event::PlayNotes(held)) => {
                let is_correct = self
                    .context
                    .current_chord
                    .as_ref()
                    .is_some_and(|chord| is_match_held(chord, &held));
                if is_correct {
                    self.enter_correct(&mut effects);
                }
            }
            (Phase::Playing(Round::Correct), Event::TimerElapsed(Timer::Correct)) => {
                if self.is_not_finished(catalog) {
                    self.enter_idle(catalog, rng, &mut effects);
                } else {
                    self.enter_finished(now, &mut effects);
                }
            }
            (Phase::Finished, Event::Replay) => self.enter_config(&mut effects),
            (phase, event) => debug!("Ignoring {:?} in {:?}", event, phase),
        }
        effects
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn enter_config(&mut self, effects: &mut Vec<Effect>) {
        self.set_phase(Phase::Config);
        self.context = SessionContext::default();
        effects.extend([
            Effect::Cancel(Timer::Countdown),
            Effect::Cancel(Timer::Correct),
            Effect::StopClock,
        ]);
    }

    fn enter_starting(&mut self, step: Countdown, effects: &mut Vec<Effect>) {
        self.set_phase(Phase::Starting(step));
        effects.push(Effect::Schedule(Timer::Countdown, self.timings.countdown_step));
    }

    fn enter_playing<R: Rng + ?Sized>(
        &mut self,
        catalog: &Catalog,
        now: Instant,
        rng: &mut R,
        effects: &mut Vec<Effect>,
    ) {
        info!("Session started with {} chords", catalog.len());
        self.context.start_time = Some(now);
        self.context.finish_time = None;
        effects.push(Effect::StartClock);
        self.enter_idle(catalog, rng, effects);
    }

    fn enter_idle<R: Rng + ?Sized>(&mut self, catalog: &Catalog, rng: &mut R, effects: &mut Vec<Effect>) {
        self.set_phase(Phase::Playing(Round::Idle));
        self.context.current_chord = self.next_chord(catalog, rng);
        if let Some(chord) = &self.context.current_chord {
            debug!("Next chord: {}", chord);
        }
        effects.push(Effect::ResetPiano);
    }

    fn enter_correct(&mut self, effects: &mut Vec<Effect>) {
        if let Some(chord) = self.context.current_chord.clone() {
            debug!("Played {}", chord);
            if !self.context.played_chords.contains(&chord) {
                self.context.played_chords.push(chord);
            }
        }
        self.set_phase(Phase::Playing(Round::Correct));
        effects.push(Effect::Schedule(Timer::Correct, self.timings.correct_delay));
    }

    fn enter_finished(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        self.set_phase(Phase::Finished);
        self.context.finish_time = Some(now);
        if let Some(elapsed) = self.context.elapsed(now) {
            info!(
                "Finished {} chords in {:.2}s",
                self.context.played_chords.len(),
                elapsed.as_secs_f64()
            );
        }
        effects.extend([Effect::Cancel(Timer::Correct), Effect::StopClock, Effect::ResetPiano]);
    }

    fn is_not_finished(&self, catalog: &Catalog) -> bool {
        catalog.remaining(&self.context.played_chords).next().is_some()
    }

    /// Uniform pick among the chords not played yet.
    fn next_chord<R: Rng + ?Sized>(&self, catalog: &Catalog, rng: &mut R) -> Option<Chord> {
        let remaining: Vec<&Chord> = catalog.remaining(&self.context.played_chords).collect();
        remaining.choose(rng).map(|chord| (*chord).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Harness {
        machine: Machine,
        catalog: Catalog,
        rng: StdRng,
        now: Instant,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                machine: Machine::new(Timings::default()),
                catalog: Catalog::new(),
                rng: StdRng::seed_from_u64(7),
                now: Instant::now(),
            }
        }

        fn send(&mut self, event: Event) -> Vec<Effect> {
            self.machine.handle(event, &self.catalog, self.now, &mut self.rng)
        }

        fn play_current(&mut self) -> Vec<Effect> {
            let chord = self.machine.context().current_chord.clone().unwrap();
            let held = chord
                .pitch_classes()
                .iter()
                .map(|pc| crate::theory::Note::new(*pc, 4))
                .collect();
            self.send(Event::PlayNotes(held))
        }

        fn start(&mut self) {
            self.send(Event::PressStart);
            for _ in 0..3 {
                self.send(Event::TimerElapsed(Timer::Countdown));
            }
        }
    }

    #[test]
    fn countdown_runs_three_two_one() {
        let mut h = Harness::new();
        let effects = h.send(Event::PressStart);
        assert_eq!(h.machine.phase(), Phase::Starting(Countdown::Three));
        assert_eq!(effects, vec![Effect::Schedule(Timer::Countdown, Duration::from_millis(500))]);

        h.send(Event::TimerElapsed(Timer::Countdown));
        assert_eq!(h.machine.phase(), Phase::Starting(Countdown::Two));
        h.send(Event::TimerElapsed(Timer::Countdown));
        assert_eq!(h.machine.phase(), Phase::Starting(Countdown::One));

        let effects = h.send(Event::TimerElapsed(Timer::Countdown));
        assert_eq!(h.machine.phase(), Phase::Playing(Round::Idle));
        assert_eq!(effects, vec![Effect::StartClock, Effect::ResetPiano]);
        assert!(h.machine.context().current_chord.is_some());
        assert_eq!(h.machine.context().start_time, Some(h.now));
    }

    #[test]
    fn correct_chord_is_recorded() {
        let mut h = Harness::new();
        h.start();
        let chord = h.machine.context().current_chord.clone().unwrap();

        let effects = h.play_current();
        assert_eq!(h.machine.phase(), Phase::Playing(Round::Correct));
        assert_eq!(h.machine.context().played_chords, vec![chord.clone()]);
        assert_eq!(effects, vec![Effect::Schedule(Timer::Correct, Duration::from_millis(500))]);

        let effects = h.send(Event::TimerElapsed(Timer::Correct));
        assert_eq!(h.machine.phase(), Phase::Playing(Round::Idle));
        assert_eq!(effects, vec![Effect::ResetPiano]);
        assert_ne!(h.machine.context().current_chord.as_ref(), Some(&chord));
    }

    #[test]
    fn wrong_or_partial_notes_stay_idle() {
        let mut h = Harness::new();
        h.start();
        let chord = h.machine.context().current_chord.clone().unwrap();
        let partial: HeldNotes = chord
            .pitch_classes()
            .iter()
            .take(2)
            .map(|pc| crate::theory::Note::new(*pc, 4))
            .collect();

        assert!(h.send(Event::PlayNotes(partial)).is_empty());
        assert!(h.send(Event::PlayNotes(HeldNotes::default())).is_empty());
        assert_eq!(h.machine.phase(), Phase::Playing(Round::Idle));
        assert!(h.machine.context().played_chords.is_empty());
    }

    #[test]
    fn events_outside_their_phase_are_ignored() {
        let mut h = Harness::new();
        assert!(h.send(Event::Replay).is_empty());
        assert!(h.send(Event::TimerElapsed(Timer::Correct)).is_empty());
        assert!(h.send(Event::PlayNotes(HeldNotes::default())).is_empty());
        assert_eq!(h.machine.phase(), Phase::Config);

        h.send(Event::PressStart);
        assert!(h.send(Event::PressStart).is_empty());
        assert_eq!(h.machine.phase(), Phase::Starting(Countdown::Three));
    }

    #[test]
    fn full_run_visits_every_chord_once_then_replays() {
        let mut h = Harness::new();
        h.start();
        for _ in 0..h.catalog.len() {
            h.play_current();
            h.send(Event::TimerElapsed(Timer::Correct));
        }
        assert_eq!(h.machine.phase(), Phase::Finished);

        let played = &h.machine.context().played_chords;
        assert_eq!(played.len(), 24);
        for chord in h.catalog.chords() {
            assert!(played.contains(chord), "{} missing", chord);
        }
        assert!(h.machine.context().finish_time.is_some());

        let effects = h.send(Event::Replay);
        assert_eq!(h.machine.phase(), Phase::Config);
        assert!(h.machine.context().played_chords.is_empty());
        assert!(effects.contains(&Effect::StopClock));
    }

    #[test]
    fn elapsed_freezes_at_finish() {
        let start = Instant::now();
        let context = SessionContext {
            start_time: Some(start),
            finish_time: Some(start + Duration::from_secs(3)),
            ..SessionContext::default()
        };
        assert_eq!(context.elapsed(start + Duration::from_secs(10)), Some(Duration::from_secs(3)));
        assert_eq!(SessionContext::default().elapsed(start), None);
    }
}
