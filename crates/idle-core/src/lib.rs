#![deny(warnings)]

//! Core domain models and configuration for Cookie Idle.
//!
//! This crate defines the serializable building blocks shared by the
//! simulation: upgrades with their price/income formulas, immediate and
//! timed objectives, and the game configuration with validation helpers
//! that report problems without refusing to run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Static description of a purchasable upgrade (a passive income source).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpgradeSpec {
    /// Display name, e.g. "Cursor".
    pub name: String,
    /// Price of the first level (> 0).
    pub base_price: f64,
    /// Growth ratio applied per owned level (> 1 for a rising curve).
    pub price_multiplier: f64,
    /// Income added per owned level, in cookies per second (>= 0).
    pub income_per_level: f64,
}

impl UpgradeSpec {
    pub fn new(name: &str, base_price: f64, price_multiplier: f64, income_per_level: f64) -> Self {
        Self {
            name: name.to_string(),
            base_price,
            price_multiplier,
            income_per_level,
        }
    }
}

/// An upgrade owned by the economy: its spec plus the current level.
///
/// The upgrade never authorizes its own purchase. The economy checks the
/// balance and then calls [`Upgrade::purchase`] with the verdict.
#[derive(Clone, Debug, PartialEq)]
pub struct Upgrade {
    spec: UpgradeSpec,
    level: u32,
}

impl Upgrade {
    pub fn new(spec: UpgradeSpec) -> Self {
        Self { spec, level: 0 }
    }

    pub fn spec(&self) -> &UpgradeSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Price of the next level: `max(1, round(base * multiplier^level))`.
    ///
    /// A non-positive or non-finite multiplier is a configuration error
    /// (reported once by [`GameConfig::audit`]); the base price is used.
    pub fn price(&self) -> u64 {
        let m = self.spec.price_multiplier;
        let raw = if m > 0.0 && m.is_finite() {
            self.spec.base_price * m.powf(self.level as f64)
        } else {
            debug!(
                upgrade = %self.spec.name,
                multiplier = m,
                "invalid price multiplier, using base price"
            );
            self.spec.base_price
        };
        if !raw.is_finite() {
            return u64::MAX;
        }
        // `as` saturates for values beyond u64::MAX.
        raw.round().max(1.0) as u64
    }

    /// Income contributed by this upgrade: `income_per_level * level`.
    pub fn income_per_tick(&self) -> f64 {
        self.spec.income_per_level * self.level as f64
    }

    /// Apply a purchase the economy has already paid for.
    ///
    /// Returns whether the level changed.
    pub fn purchase(&mut self, authorized: bool) -> bool {
        if !authorized {
            return false;
        }
        self.level = self.level.saturating_add(1);
        true
    }

    /// Back to level 0 (prestige).
    pub fn reset(&mut self) {
        self.level = 0;
    }

    /// Restore a level from a save. Negative values are ignored.
    pub fn set_level(&mut self, level: i64) -> bool {
        if level < 0 {
            warn!(upgrade = %self.spec.name, level, "refusing negative upgrade level");
            return false;
        }
        self.level = u32::try_from(level).unwrap_or(u32::MAX);
        true
    }
}

/// What an objective measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveKind {
    /// Current cookie balance.
    Count,
    /// Last computed income (before the prestige multiplier).
    Income,
    /// Sum of all upgrade levels.
    Upgrades,
}

/// Static description of an immediate objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSpec {
    pub description: String,
    pub kind: ObjectiveKind,
    pub target: f64,
    pub reward: f64,
}

/// An immediate objective. Completion is one-way.
#[derive(Clone, Debug, PartialEq)]
pub struct Objective {
    spec: ObjectiveSpec,
    completed: bool,
}

impl Objective {
    pub fn new(spec: ObjectiveSpec) -> Self {
        Self {
            spec,
            completed: false,
        }
    }

    pub fn spec(&self) -> &ObjectiveSpec {
        &self.spec
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Mark as completed. Returns `false` when it already was.
    pub fn complete(&mut self) -> bool {
        !std::mem::replace(&mut self.completed, true)
    }

    /// Restore the flag from a save; a `false` never clears completion.
    pub fn restore(&mut self, completed: bool) {
        self.completed |= completed;
    }
}

/// Static description of a timed objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedObjectiveSpec {
    pub description: String,
    /// Only [`ObjectiveKind::Count`] is evaluated; other kinds expire.
    #[serde(default = "default_timed_kind")]
    pub kind: ObjectiveKind,
    pub target: f64,
    pub reward: f64,
    /// Seconds allowed from the first observation.
    pub time_limit: f64,
}

fn default_timed_kind() -> ObjectiveKind {
    ObjectiveKind::Count
}

/// Lifecycle of a timed objective.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimedStatus {
    /// Not yet observed by an evaluation pass.
    Pending,
    /// Clock started at `started_at` elapsed seconds.
    Running { started_at: f64 },
    /// Target reached within the limit; reward paid.
    Succeeded,
    /// Limit passed without success; no reward.
    Expired,
}

impl TimedStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TimedStatus::Succeeded | TimedStatus::Expired)
    }
}

/// A timed objective and its state machine.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedObjective {
    spec: TimedObjectiveSpec,
    status: TimedStatus,
    started_at: Option<f64>,
}

impl TimedObjective {
    pub fn new(spec: TimedObjectiveSpec) -> Self {
        Self {
            spec,
            status: TimedStatus::Pending,
            started_at: None,
        }
    }

    pub fn spec(&self) -> &TimedObjectiveSpec {
        &self.spec
    }

    pub fn status(&self) -> TimedStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<f64> {
        self.started_at
    }

    /// Success and expiry both count as completed.
    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn succeeded(&self) -> bool {
        self.status == TimedStatus::Succeeded
    }

    /// Pending -> Running. The start time is recorded only once.
    pub fn start(&mut self, now: f64) -> bool {
        if self.status != TimedStatus::Pending {
            return false;
        }
        self.started_at = Some(now);
        self.status = TimedStatus::Running { started_at: now };
        true
    }

    /// Seconds since the clock started, if it has.
    pub fn elapsed(&self, now: f64) -> Option<f64> {
        self.started_at.map(|s| now - s)
    }

    /// Time left before expiry, clamped at zero. `None` until started.
    pub fn remaining(&self, now: f64) -> Option<f64> {
        self.elapsed(now)
            .map(|e| (self.spec.time_limit - e).max(0.0))
    }

    /// Running -> Succeeded.
    pub fn succeed(&mut self) -> bool {
        if !matches!(self.status, TimedStatus::Running { .. }) {
            return false;
        }
        self.status = TimedStatus::Succeeded;
        true
    }

    /// Running -> Expired.
    pub fn expire(&mut self) -> bool {
        if !matches!(self.status, TimedStatus::Running { .. }) {
            return false;
        }
        self.status = TimedStatus::Expired;
        true
    }

    /// Restore from a save. Completed objectives without a recorded outcome
    /// are treated as expired.
    pub fn restore(&mut self, completed: bool, succeeded: bool) {
        if !completed || self.is_completed() {
            return;
        }
        self.status = if succeeded {
            TimedStatus::Succeeded
        } else {
            TimedStatus::Expired
        };
    }
}

/// Full game configuration. Missing fields fall back to the built-in preset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Economy ticks per second (default 5).
    pub ticks_per_second: u32,
    /// Balance required to prestige (default 1000).
    pub prestige_cost: f64,
    /// Additive multiplier bonus per prestige level (default 0.1).
    pub prestige_bonus: f64,
    pub upgrades: Vec<UpgradeSpec>,
    pub objectives: Vec<ObjectiveSpec>,
    pub timed_objectives: Vec<TimedObjectiveSpec>,
}

pub const DEFAULT_TICKS_PER_SECOND: u32 = 5;
pub const DEFAULT_PRESTIGE_COST: f64 = 1000.0;
pub const DEFAULT_PRESTIGE_BONUS: f64 = 0.1;

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            prestige_cost: DEFAULT_PRESTIGE_COST,
            prestige_bonus: DEFAULT_PRESTIGE_BONUS,
            upgrades: default_upgrades(),
            objectives: default_objectives(),
            timed_objectives: default_timed_objectives(),
        }
    }
}

/// The classic five-building lineup.
pub fn default_upgrades() -> Vec<UpgradeSpec> {
    vec![
        UpgradeSpec::new("Cursor", 15.0, 1.15, 0.1),
        UpgradeSpec::new("Grandma", 100.0, 1.15, 1.0),
        UpgradeSpec::new("Farm", 1_100.0, 1.15, 8.0),
        UpgradeSpec::new("Mine", 12_000.0, 1.15, 47.0),
        UpgradeSpec::new("Factory", 130_000.0, 1.15, 260.0),
    ]
}

fn objective(description: &str, kind: ObjectiveKind, target: f64, reward: f64) -> ObjectiveSpec {
    ObjectiveSpec {
        description: description.to_string(),
        kind,
        target,
        reward,
    }
}

pub fn default_objectives() -> Vec<ObjectiveSpec> {
    vec![
        objective("Bake 100 cookies", ObjectiveKind::Count, 100.0, 50.0),
        objective("Own 5 upgrades", ObjectiveKind::Upgrades, 5.0, 100.0),
        objective("Reach 5 cookies per second", ObjectiveKind::Income, 5.0, 250.0),
        objective("Bake 10,000 cookies", ObjectiveKind::Count, 10_000.0, 1_000.0),
    ]
}

pub fn default_timed_objectives() -> Vec<TimedObjectiveSpec> {
    vec![
        TimedObjectiveSpec {
            description: "Bake 50 cookies in 30 seconds".to_string(),
            kind: ObjectiveKind::Count,
            target: 50.0,
            reward: 25.0,
            time_limit: 30.0,
        },
        TimedObjectiveSpec {
            description: "Bake 500 cookies in 3 minutes".to_string(),
            kind: ObjectiveKind::Count,
            target: 500.0,
            reward: 200.0,
            time_limit: 180.0,
        },
    ]
}

/// Failures loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Non-fatal configuration problems. Each has a defined fallback.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigIssue {
    /// Tick rate 0; the default rate is used.
    #[error("ticks_per_second must be > 0, falling back to {DEFAULT_TICKS_PER_SECOND}")]
    ZeroTickRate,
    /// No upgrades: income stays at zero.
    #[error("no upgrades registered")]
    NoUpgrades,
    /// Multiplier <= 0; price stays at the base price.
    #[error("upgrade {0}: price multiplier must be > 0")]
    NonPositiveMultiplier(String),
    /// Base price <= 0; price clamps to 1.
    #[error("upgrade {0}: base price must be > 0")]
    NonPositiveBasePrice(String),
    #[error("upgrade {0}: income per level must be >= 0")]
    NegativeIncome(String),
    #[error("prestige cost must be > 0")]
    NonPositivePrestigeCost,
    #[error("prestige bonus must be >= 0")]
    NegativePrestigeBonus,
    /// Timed objectives only evaluate counts; this one will simply expire.
    #[error("timed objective {0:?} uses kind {1:?}, only count is evaluated")]
    TimedKindIgnored(String, ObjectiveKind),
    #[error("non-finite numeric value in {0}")]
    NonFinite(String),
}

impl GameConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Tick rate with the zero-rate fallback applied.
    pub fn effective_ticks_per_second(&self) -> u32 {
        if self.ticks_per_second == 0 {
            DEFAULT_TICKS_PER_SECOND
        } else {
            self.ticks_per_second
        }
    }

    /// Collect every configuration problem. An empty list means clean.
    pub fn audit(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.ticks_per_second == 0 {
            issues.push(ConfigIssue::ZeroTickRate);
        }
        if !self.prestige_cost.is_finite() || !self.prestige_bonus.is_finite() {
            issues.push(ConfigIssue::NonFinite("prestige".to_string()));
        }
        if self.prestige_cost <= 0.0 {
            issues.push(ConfigIssue::NonPositivePrestigeCost);
        }
        if self.prestige_bonus < 0.0 {
            issues.push(ConfigIssue::NegativePrestigeBonus);
        }
        if self.upgrades.is_empty() {
            issues.push(ConfigIssue::NoUpgrades);
        }
        for u in &self.upgrades {
            if !(u.base_price.is_finite()
                && u.price_multiplier.is_finite()
                && u.income_per_level.is_finite())
            {
                issues.push(ConfigIssue::NonFinite(u.name.clone()));
                continue;
            }
            if u.price_multiplier <= 0.0 {
                issues.push(ConfigIssue::NonPositiveMultiplier(u.name.clone()));
            }
            if u.base_price <= 0.0 {
                issues.push(ConfigIssue::NonPositiveBasePrice(u.name.clone()));
            }
            if u.income_per_level < 0.0 {
                issues.push(ConfigIssue::NegativeIncome(u.name.clone()));
            }
        }
        for o in &self.objectives {
            if !(o.target.is_finite() && o.reward.is_finite()) {
                issues.push(ConfigIssue::NonFinite(o.description.clone()));
            }
        }
        for t in &self.timed_objectives {
            if !(t.target.is_finite() && t.reward.is_finite() && t.time_limit.is_finite()) {
                issues.push(ConfigIssue::NonFinite(t.description.clone()));
            }
            if t.kind != ObjectiveKind::Count {
                issues.push(ConfigIssue::TimedKindIgnored(t.description.clone(), t.kind));
            }
        }
        issues
    }
}
