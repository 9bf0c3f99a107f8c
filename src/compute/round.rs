//! Phase bookkeeping and termination predicates.

use crate::schema::Phase;

/// Where the vivarium is in its round cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundState {
    pub phase: Phase,
    /// Clock time the current phase began at.
    pub phase_start_time: f64,
    /// Simulation budget in seconds.
    pub phase_time_limit: f32,
    /// Evaluation budget in seconds.
    pub evaluation_time_limit: f32,
    /// Completed rounds.
    pub round_count: u64,
}

impl RoundState {
    /// Fresh state in Initialization with no completed rounds.
    pub fn new(phase_time_limit: f32, evaluation_time_limit: f32) -> Self {
        Self {
            phase: Phase::Initialization,
            phase_start_time: 0.0,
            phase_time_limit,
            evaluation_time_limit,
            round_count: 0,
        }
    }

    /// Move to the next phase and restart the phase timer.
    ///
    /// Leaving Reproduction completes a round. Returns the new phase.
    pub fn advance(&mut self, now: f64) -> Phase {
        if self.phase == Phase::Reproduction {
            self.round_count += 1;
        }
        self.phase = self.phase.next();
        self.phase_start_time = now;
        self.phase
    }

    /// Seconds since the current phase began.
    #[inline]
    pub fn elapsed(&self, now: f64) -> f32 {
        (now - self.phase_start_time).max(0.0) as f32
    }

    /// Budget of the current phase. Single-shot phases have none.
    pub fn time_limit(&self) -> Option<f32> {
        match self.phase {
            Phase::Simulation => Some(self.phase_time_limit),
            Phase::Evaluation => Some(self.evaluation_time_limit),
            Phase::Initialization | Phase::Reproduction => None,
        }
    }

    /// Whether the current phase has run past its budget.
    pub fn is_over_time_limit(&self, now: f64) -> bool {
        self.time_limit()
            .is_some_and(|limit| self.elapsed(now) > limit)
    }

    /// Simulation ends when food runs out, time runs out, or every living
    /// critter is home.
    pub fn simulation_done(&self, now: f64, food_count: usize, all_home: bool) -> bool {
        food_count == 0 || self.elapsed(now) > self.phase_time_limit || all_home
    }

    /// Evaluation ends when everyone is home or its shorter budget runs out.
    pub fn evaluation_done(&self, now: f64, all_home: bool) -> bool {
        all_home || self.elapsed(now) > self.evaluation_time_limit
    }

    /// Reproduction is single-shot.
    pub fn reproduction_done(&self) -> bool {
        true
    }
}
