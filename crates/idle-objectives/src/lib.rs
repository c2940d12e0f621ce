#![deny(warnings)]

//! Objective evaluation: immediate goals and timed challenges.
//!
//! The [`ObjectiveBook`] owns every objective of a session. Each pass it
//! reads progress through a [`ProgressView`] (the economy in production, a
//! plain ledger in tests) and pays rewards back through the same view.

use idle_core::{GameConfig, Objective, ObjectiveKind, TimedObjective, TimedStatus};
use idle_econ::Economy;
use tracing::info;

/// Read access to the numbers objectives measure, plus reward payout.
pub trait ProgressView {
    fn balance(&self) -> f64;
    /// Last computed income, before the prestige multiplier.
    fn income(&self) -> f64;
    fn total_upgrade_levels(&self) -> u64;
    /// Pay a reward; returns the amount actually credited.
    fn credit(&mut self, amount: f64) -> f64;
}

impl ProgressView for Economy {
    fn balance(&self) -> f64 {
        Economy::balance(self)
    }

    fn income(&self) -> f64 {
        Economy::income(self)
    }

    fn total_upgrade_levels(&self) -> u64 {
        Economy::total_upgrade_levels(self)
    }

    fn credit(&mut self, amount: f64) -> f64 {
        self.grant(amount)
    }
}

/// Current progress toward an objective of `kind`.
pub fn progress_of<V: ProgressView + ?Sized>(kind: ObjectiveKind, view: &V) -> f64 {
    match kind {
        ObjectiveKind::Count => view.balance(),
        ObjectiveKind::Income => view.income(),
        ObjectiveKind::Upgrades => view.total_upgrade_levels() as f64,
    }
}

/// State changes produced by an evaluation pass.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectiveEvent {
    Completed { index: usize, reward: f64 },
    TimedStarted { index: usize, at: f64 },
    TimedSucceeded { index: usize, reward: f64 },
    TimedExpired { index: usize },
}

/// All objectives of a session.
#[derive(Clone, Debug, Default)]
pub struct ObjectiveBook {
    objectives: Vec<Objective>,
    timed: Vec<TimedObjective>,
}

impl ObjectiveBook {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            objectives: config.objectives.iter().cloned().map(Objective::new).collect(),
            timed: config
                .timed_objectives
                .iter()
                .cloned()
                .map(TimedObjective::new)
                .collect(),
        }
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn timed(&self) -> &[TimedObjective] {
        &self.timed
    }

    /// Number of completed immediate objectives.
    pub fn completed_count(&self) -> usize {
        self.objectives.iter().filter(|o| o.is_completed()).count()
    }

    /// Run both evaluators, immediate objectives first.
    pub fn evaluate<V: ProgressView + ?Sized>(&mut self, view: &mut V, now: f64) -> Vec<ObjectiveEvent> {
        let mut events = self.evaluate_immediate(view);
        events.extend(self.evaluate_timed(view, now));
        events
    }

    /// Complete every open objective whose progress reached its target.
    ///
    /// Rewards are paid as soon as an objective completes, so later
    /// objectives in the same pass already see them.
    pub fn evaluate_immediate<V: ProgressView + ?Sized>(&mut self, view: &mut V) -> Vec<ObjectiveEvent> {
        let mut events = Vec::new();
        for (index, objective) in self.objectives.iter_mut().enumerate() {
            if objective.is_completed() {
                continue;
            }
            let spec = objective.spec();
            if progress_of(spec.kind, &*view) < spec.target {
                continue;
            }
            let reward = spec.reward;
            objective.complete();
            let paid = view.credit(reward);
            info!(objective = %objective.spec().description, reward = paid, "objective completed");
            events.push(ObjectiveEvent::Completed { index, reward: paid });
        }
        events
    }

    /// Advance every open timed objective.
    ///
    /// Pending objectives start at `now` and are checked in the same pass.
    /// Success is checked before expiry, so a target reached on the pass
    /// that also crosses the limit still counts.
    pub fn evaluate_timed<V: ProgressView + ?Sized>(&mut self, view: &mut V, now: f64) -> Vec<ObjectiveEvent> {
        let mut events = Vec::new();
        for (index, timed) in self.timed.iter_mut().enumerate() {
            if timed.is_completed() {
                continue;
            }
            if timed.start(now) {
                info!(objective = %timed.spec().description, at = now, "timed objective started");
                events.push(ObjectiveEvent::TimedStarted { index, at: now });
            }
            let spec = timed.spec();
            let reached = spec.kind == ObjectiveKind::Count && view.balance() >= spec.target;
            if reached {
                let reward = spec.reward;
                timed.succeed();
                let paid = view.credit(reward);
                info!(objective = %timed.spec().description, reward = paid, "timed objective completed");
                events.push(ObjectiveEvent::TimedSucceeded { index, reward: paid });
                continue;
            }
            let over = timed
                .elapsed(now)
                .is_some_and(|e| e > timed.spec().time_limit);
            if over {
                timed.expire();
                info!(objective = %timed.spec().description, "timed objective expired");
                events.push(ObjectiveEvent::TimedExpired { index });
            }
        }
        events
    }

    /// Completion flags in config order, for saves.
    pub fn completed_flags(&self) -> Vec<bool> {
        self.objectives.iter().map(Objective::is_completed).collect()
    }

    pub fn timed_completed_flags(&self) -> Vec<bool> {
        self.timed.iter().map(TimedObjective::is_completed).collect()
    }

    pub fn timed_succeeded_flags(&self) -> Vec<bool> {
        self.timed.iter().map(TimedObjective::succeeded).collect()
    }

    /// Forget all progress: every objective back to open, timers unstarted.
    pub fn reset(&mut self) {
        for o in &mut self.objectives {
            *o = Objective::new(o.spec().clone());
        }
        for t in &mut self.timed {
            *t = TimedObjective::new(t.spec().clone());
        }
    }

    /// Restore flags by index; extra entries on either side are ignored.
    pub fn restore_completed(&mut self, flags: &[bool]) {
        for (o, &done) in self.objectives.iter_mut().zip(flags) {
            o.restore(done);
        }
    }

    /// Restore timed flags by index. Missing outcome entries mean expired.
    pub fn restore_timed(&mut self, completed: &[bool], succeeded: &[bool]) {
        for (i, (t, &done)) in self.timed.iter_mut().zip(completed).enumerate() {
            let won = succeeded.get(i).copied().unwrap_or(false);
            t.restore(done, won);
        }
    }

    /// Number of timed objectives currently running.
    pub fn running_count(&self) -> usize {
        self.timed
            .iter()
            .filter(|t| matches!(t.status(), TimedStatus::Running { .. }))
            .count()
    }
}
