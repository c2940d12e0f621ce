#![deny(warnings)]

//! Session runtime: wires the economy and objectives to a clock.
//!
//! A [`Game`] owns one economy and one objective book. The external driver
//! feeds elapsed time into [`Game::update`]; a [`TickGate`] lets the
//! simulation tick at most once per `1 / ticks_per_second` window. Player
//! actions run immediately regardless of the gate. Every state change is
//! announced to the registered [`RefreshListener`]s.

use idle_core::GameConfig;
use idle_econ::{EconError, Economy, Prestige, Purchase};
use idle_objectives::{ObjectiveBook, ObjectiveEvent};
use persistence::{PersistError, SaveStore, Snapshot, SAVE_VERSION};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Source of monotonically non-decreasing elapsed seconds.
pub trait Clock {
    fn elapsed(&self) -> f64;
}

/// Clock advanced by hand; used by tests and headless simulation.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: f64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move forward by `dt` seconds. Negative steps are ignored.
    pub fn advance(&mut self, dt: f64) -> f64 {
        if dt > 0.0 {
            self.now += dt;
        }
        self.now
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> f64 {
        self.now
    }
}

/// Wall clock measured from construction.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Debounce gate: opens at most once per interval.
///
/// Windows are fixed at multiples of the interval from start, so the gate
/// does not drift when the caller's frame time does not divide the interval.
/// After a stall the watermark skips to the next window boundary after `now`
/// instead of replaying the missed windows.
#[derive(Clone, Debug)]
pub struct TickGate {
    interval: f64,
    next_allowed: f64,
}

impl TickGate {
    pub fn new(ticks_per_second: u32) -> Self {
        let interval = 1.0 / ticks_per_second.max(1) as f64;
        Self {
            interval,
            next_allowed: interval,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn next_allowed(&self) -> f64 {
        self.next_allowed
    }

    pub fn poll(&mut self, now: f64) -> bool {
        if !(now >= self.next_allowed) {
            return false;
        }
        let missed = ((now - self.next_allowed) / self.interval).floor();
        self.next_allowed += (missed + 1.0) * self.interval;
        if self.next_allowed <= now {
            self.next_allowed += self.interval;
        }
        true
    }
}

/// Outbound "state changed, re-render" notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    Clicked { value: f64, balance: f64 },
    Ticked { gain: f64, income: f64, balance: f64 },
    Purchased(Purchase),
    Prestiged(Prestige),
    Objective(ObjectiveEvent),
    Restored,
}

/// Consumer of [`GameEvent`]s. Listeners never influence the simulation.
pub trait RefreshListener: Send {
    fn on_event(&mut self, event: &GameEvent);
}

impl<F> RefreshListener for F
where
    F: FnMut(&GameEvent) + Send,
{
    fn on_event(&mut self, event: &GameEvent) {
        self(event)
    }
}

/// One play session.
pub struct Game {
    economy: Economy,
    objectives: ObjectiveBook,
    gate: TickGate,
    listeners: Vec<Box<dyn RefreshListener>>,
    ticks: u64,
}

impl Game {
    /// Fresh session. Configuration issues are logged and their fallbacks
    /// applied.
    pub fn new(config: &GameConfig) -> Self {
        for issue in config.audit() {
            warn!(%issue, "configuration problem");
        }
        let economy = Economy::new(config);
        let gate = TickGate::new(economy.ticks_per_second());
        let game = Self {
            economy,
            objectives: ObjectiveBook::new(config),
            gate,
            listeners: Vec::new(),
            ticks: 0,
        };
        info!(
            upgrades = game.economy.upgrades().len(),
            objectives = game.objectives.objectives().len(),
            timed = game.objectives.timed().len(),
            "game initialized"
        );
        game
    }

    /// Session resumed from `store`, or fresh when nothing is saved or the
    /// save cannot be read.
    pub fn from_store(config: &GameConfig, store: &dyn SaveStore) -> Self {
        let mut game = Self::new(config);
        match store.load() {
            Ok(Some(snap)) => game.restore(&snap),
            Ok(None) => info!("no save found, starting a new game"),
            Err(e) => warn!(error = %e, "could not load save, starting a new game"),
        }
        game
    }

    pub fn economy(&self) -> &Economy {
        &self.economy
    }

    pub fn objectives(&self) -> &ObjectiveBook {
        &self.objectives
    }

    pub fn gate(&self) -> &TickGate {
        &self.gate
    }

    /// Simulation ticks executed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn subscribe<L: RefreshListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, event: GameEvent) {
        for l in &mut self.listeners {
            l.on_event(&event);
        }
    }

    /// Tick if the gate allows it at `now`. Returns whether a tick ran.
    pub fn update(&mut self, now: f64) -> bool {
        if !self.gate.poll(now) {
            return false;
        }
        self.tick(now);
        true
    }

    /// [`Game::update`] reading the time from `clock`.
    pub fn poll<C: Clock + ?Sized>(&mut self, clock: &C) -> bool {
        self.update(clock.elapsed())
    }

    /// One unconditional simulation tick: accrue, then evaluate objectives.
    pub fn tick(&mut self, now: f64) {
        let gain = self.economy.accrue();
        self.ticks += 1;
        self.emit(GameEvent::Ticked {
            gain,
            income: self.economy.income(),
            balance: self.economy.balance(),
        });
        for ev in self.objectives.evaluate(&mut self.economy, now) {
            self.emit(GameEvent::Objective(ev));
        }
    }

    pub fn click(&mut self) -> f64 {
        let value = self.economy.click();
        self.emit(GameEvent::Clicked {
            value,
            balance: self.economy.balance(),
        });
        value
    }

    /// Pay `cost` for upgrade `index`; see [`Economy::purchase`].
    pub fn purchase(&mut self, index: usize, cost: u64) -> Result<Purchase, EconError> {
        let p = self.economy.purchase(index, cost)?;
        self.emit(GameEvent::Purchased(p.clone()));
        Ok(p)
    }

    /// Buy upgrade `index` at its current price.
    pub fn buy(&mut self, index: usize) -> Result<Purchase, EconError> {
        let p = self.economy.buy(index)?;
        self.emit(GameEvent::Purchased(p.clone()));
        Ok(p)
    }

    pub fn prestige(&mut self) -> Result<Prestige, EconError> {
        let p = self.economy.prestige()?;
        self.emit(GameEvent::Prestiged(p.clone()));
        Ok(p)
    }

    /// Capture the persistent state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SAVE_VERSION,
            balance: self.economy.balance(),
            prestige_level: self.economy.prestige_level(),
            prestige_multiplier: self.economy.prestige_multiplier(),
            upgrade_levels: self
                .economy
                .upgrades()
                .iter()
                .map(|u| u.level() as i64)
                .collect(),
            completed_objectives: self.objectives.completed_flags(),
            completed_timed_objectives: self.objectives.timed_completed_flags(),
            timed_objective_succeeded: self.objectives.timed_succeeded_flags(),
        }
    }

    /// Replace the session's progress with a snapshot. Arrays are zipped by
    /// index with the configured collections; entries beyond either length
    /// are ignored and configured entries the save lacks start fresh.
    pub fn restore(&mut self, snap: &Snapshot) {
        for i in 0..self.economy.upgrades().len() {
            self.economy.restore_upgrade_level(i, 0);
        }
        self.objectives.reset();
        self.economy.restore_balance(snap.balance);
        self.economy
            .restore_prestige(snap.prestige_level, Some(snap.prestige_multiplier));
        let configured = self.economy.upgrades().len();
        if snap.upgrade_levels.len() != configured {
            debug!(
                saved = snap.upgrade_levels.len(),
                configured, "upgrade count differs from save"
            );
        }
        for (i, &level) in snap.upgrade_levels.iter().enumerate().take(configured) {
            self.economy.restore_upgrade_level(i, level);
        }
        self.objectives.restore_completed(&snap.completed_objectives);
        self.objectives.restore_timed(
            &snap.completed_timed_objectives,
            &snap.timed_objective_succeeded,
        );
        info!(
            balance = self.economy.balance(),
            prestige_level = self.economy.prestige_level(),
            "game restored"
        );
        self.emit(GameEvent::Restored);
    }

    pub fn save_to(&self, store: &mut dyn SaveStore) -> Result<(), PersistError> {
        store.save(&self.snapshot())
    }
}

/// Thread-safe handle: every operation runs under one lock per session.
#[derive(Clone)]
pub struct SharedGame {
    inner: Arc<Mutex<Game>>,
}

impl SharedGame {
    pub fn new(game: Game) -> Self {
        Self {
            inner: Arc::new(Mutex::new(game)),
        }
    }

    /// Run `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut Game) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idle_core::{ObjectiveKind, ObjectiveSpec, TimedObjectiveSpec, UpgradeSpec};
    use persistence::MemoryStore;
    use proptest::prelude::*;

    fn config() -> GameConfig {
        GameConfig {
            ticks_per_second: 5,
            upgrades: vec![
                UpgradeSpec::new("Cursor", 15.0, 1.15, 0.1),
                UpgradeSpec::new("Grandma", 100.0, 1.15, 1.0),
            ],
            objectives: vec![ObjectiveSpec {
                description: "Bake 10".to_string(),
                kind: ObjectiveKind::Count,
                target: 10.0,
                reward: 5.0,
            }],
            timed_objectives: vec![TimedObjectiveSpec {
                description: "Bake 50 in 10s".to_string(),
                kind: ObjectiveKind::Count,
                target: 50.0,
                reward: 25.0,
                time_limit: 10.0,
            }],
            ..GameConfig::default()
        }
    }

    fn recorder(game: &mut Game) -> Arc<Mutex<Vec<GameEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        game.subscribe(move |e: &GameEvent| sink.lock().unwrap().push(e.clone()));
        log
    }

    #[test]
    fn gate_opens_once_per_interval() {
        let mut gate = TickGate::new(5);
        assert!(!gate.poll(0.0));
        assert!(!gate.poll(0.19));
        assert!(gate.poll(0.2));
        assert!(!gate.poll(0.3));
        assert!(gate.poll(0.45));
        assert!((gate.next_allowed() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn gate_skips_stalled_windows_without_bursting() {
        let mut gate = TickGate::new(5);
        assert!(gate.poll(5.05));
        assert!(!gate.poll(5.1));
        assert!((gate.next_allowed() - 5.2).abs() < 1e-9);
        assert!(gate.poll(5.2 + 1e-9));
        assert!(!gate.poll(f64::NAN));
    }

    #[test]
    fn gated_income_matches_the_per_second_rate() {
        let cfg = GameConfig {
            objectives: vec![],
            timed_objectives: vec![],
            ..config()
        };
        let mut game = Game::new(&cfg);
        game.restore(&Snapshot {
            upgrade_levels: vec![0, 5],
            ..Snapshot::default()
        });
        let mut clock = ManualClock::new();
        // 60 fps for 60 s, plus one frame so the last window is reached
        for _ in 0..=3_600 {
            clock.advance(1.0 / 60.0);
            game.poll(&clock);
        }
        // 5 cookies/s * multiplier 1 * 60 s
        assert_eq!(game.ticks(), 300);
        assert_eq!(game.economy().balance(), 300.0);
    }

    #[test]
    fn zero_rate_gate_does_not_divide_by_zero() {
        let gate = TickGate::new(0);
        assert_eq!(gate.interval(), 1.0);
    }

    #[test]
    fn update_is_debounced() {
        let mut game = Game::new(&config());
        let mut clock = ManualClock::new();
        let mut ran = 0;
        // 60 fps for one second
        for _ in 0..60 {
            clock.advance(1.0 / 60.0);
            if game.poll(&clock) {
                ran += 1;
            }
        }
        assert!(ran <= 5, "ran {ran} ticks");
        assert!(ran >= 4, "ran {ran} ticks");
        assert_eq!(game.ticks(), ran);
    }

    #[test]
    fn fixed_step_driver_ticks_every_step() {
        let mut game = Game::new(&config());
        let mut clock = ManualClock::new();
        let step = game.gate().interval();
        for _ in 0..50 {
            clock.advance(step);
            game.poll(&clock);
        }
        assert_eq!(game.ticks(), 50);
    }

    #[test]
    fn actions_ignore_the_gate() {
        let mut game = Game::new(&config());
        for _ in 0..15 {
            game.click();
        }
        assert!(!game.update(0.0));
        assert_eq!(game.ticks(), 0);
        assert_eq!(game.economy().balance(), 15.0);
        game.buy(0).unwrap();
        assert_eq!(game.economy().balance(), 0.0);
    }

    #[test]
    fn tick_accrues_and_pays_objectives() {
        let mut game = Game::new(&config());
        let log = recorder(&mut game);
        for _ in 0..10 {
            game.click();
        }
        game.tick(0.2);
        // 10 clicks + 5 reward
        assert_eq!(game.economy().balance(), 15.0);
        let events = log.lock().unwrap().clone();
        assert!(events.contains(&GameEvent::Objective(ObjectiveEvent::Completed {
            index: 0,
            reward: 5.0
        })));
        assert!(events.contains(&GameEvent::Objective(ObjectiveEvent::TimedStarted {
            index: 0,
            at: 0.2
        })));
    }

    #[test]
    fn every_change_is_announced() {
        let mut game = Game::new(&config());
        let log = recorder(&mut game);
        for _ in 0..1_100 {
            game.click();
        }
        game.buy(0).unwrap();
        game.prestige().unwrap();
        let _ = game.prestige();
        let events = log.lock().unwrap();
        assert_eq!(
            events.iter().filter(|e| matches!(e, GameEvent::Clicked { .. })).count(),
            1_100
        );
        assert!(events.iter().any(|e| matches!(e, GameEvent::Purchased(_))));
        // the declined second prestige is not announced
        assert_eq!(
            events.iter().filter(|e| matches!(e, GameEvent::Prestiged(_))).count(),
            1
        );
    }

    #[test]
    fn timed_objective_runs_on_session_clock() {
        let mut game = Game::new(&GameConfig {
            objectives: vec![],
            ..config()
        });
        let mut clock = ManualClock::new();
        let step = game.gate().interval();
        let mut t = 0.0;
        while t < 9.0 {
            t = clock.advance(step);
            game.poll(&clock);
        }
        for _ in 0..50 {
            game.click();
        }
        clock.advance(step);
        game.poll(&clock);
        assert!(game.objectives().timed()[0].succeeded());
        assert_eq!(game.economy().balance(), 75.0);
    }

    #[test]
    fn snapshot_roundtrip_through_store() {
        let mut game = Game::new(&config());
        for _ in 0..200 {
            game.click();
        }
        game.buy(1).unwrap();
        game.buy(0).unwrap();
        game.tick(0.2);
        let mut store = MemoryStore::new();
        game.save_to(&mut store).unwrap();

        let resumed = Game::from_store(&config(), &store);
        assert_eq!(resumed.snapshot(), game.snapshot());
        assert_eq!(resumed.economy().upgrades()[1].level(), 1);
        assert!(resumed.objectives().objectives()[0].is_completed());
    }

    #[test]
    fn restore_zips_shorter_and_longer_arrays() {
        let snap = Snapshot {
            balance: 42.0,
            prestige_level: 1,
            prestige_multiplier: 1.1,
            upgrade_levels: vec![4],
            completed_objectives: vec![true, true, true],
            completed_timed_objectives: vec![],
            ..Snapshot::default()
        };
        let game = Game::from_store(&config(), &MemoryStore::with(snap));
        assert_eq!(game.economy().upgrades()[0].level(), 4);
        assert_eq!(game.economy().upgrades()[1].level(), 0);
        assert_eq!(game.objectives().completed_flags(), vec![true]);
        assert!(!game.objectives().timed()[0].is_completed());
        assert!((game.economy().prestige_multiplier() - 1.1).abs() < 1e-12);
    }

    #[test]
    fn restore_skips_negative_levels() {
        let snap = Snapshot {
            upgrade_levels: vec![-3, 2],
            ..Snapshot::default()
        };
        let game = Game::from_store(&config(), &MemoryStore::with(snap));
        assert_eq!(game.economy().upgrades()[0].level(), 0);
        assert_eq!(game.economy().upgrades()[1].level(), 2);
    }

    #[test]
    fn restore_over_a_running_session_replaces_progress() {
        let mut game = Game::new(&config());
        for _ in 0..200 {
            game.click();
        }
        game.buy(0).unwrap();
        game.buy(1).unwrap();
        game.tick(0.2);
        assert!(game.objectives().objectives()[0].is_completed());
        assert!(game.objectives().timed()[0].succeeded());

        game.restore(&Snapshot {
            balance: 3.0,
            upgrade_levels: vec![2],
            ..Snapshot::default()
        });
        assert_eq!(game.economy().upgrades()[0].level(), 2);
        assert_eq!(game.economy().upgrades()[1].level(), 0);
        assert_eq!(game.objectives().completed_flags(), vec![false]);
        assert!(!game.objectives().timed()[0].is_completed());
        assert!(game.objectives().timed()[0].started_at().is_none());
        assert_eq!(game.economy().balance(), 3.0);
    }

    #[test]
    fn missing_save_starts_fresh() {
        let game = Game::from_store(&config(), &MemoryStore::new());
        assert_eq!(game.economy().balance(), 0.0);
        assert_eq!(game.economy().prestige_level(), 0);
    }

    #[test]
    fn shared_game_serializes_threads() {
        let shared = SharedGame::new(Game::new(&config()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let g = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        g.with(|game| game.click());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(shared.with(|g| g.economy().balance()), 1_000.0);
    }

    proptest! {
        #[test]
        fn idle_gain_matches_rate_for_any_tick_rate(rate in 1u32..30, secs in 1u32..60, level in 1i64..100) {
            let cfg = GameConfig { ticks_per_second: rate, objectives: vec![], timed_objectives: vec![], ..config() };
            let mut game = Game::new(&cfg);
            game.restore(&Snapshot { upgrade_levels: vec![0, level], ..Snapshot::default() });
            for i in 0..(rate * secs) {
                game.tick(i as f64 / rate as f64);
            }
            let expected = level as f64 * secs as f64;
            prop_assert!((game.economy().balance() - expected).abs() < 1e-6 * expected.max(1.0));
        }
    }
}
