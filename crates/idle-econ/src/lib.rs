#![deny(warnings)]

//! Economy engine: balance, passive income, purchases and prestige.
//!
//! The [`Economy`] exclusively owns the cookie balance, the upgrade
//! collection and the prestige state. Every balance mutation goes through
//! one of its methods:
//! - [`Economy::accrue`] adds one tick of passive income
//! - [`Economy::click`] adds one manual click
//! - [`Economy::purchase`] pays for an upgrade level
//! - [`Economy::prestige`] trades the run for a permanent multiplier
//! - [`Economy::grant`] pays objective rewards

use idle_core::{GameConfig, Upgrade};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Outcomes that decline an economy operation. Nothing is mutated when
/// one of these is returned.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Not enough cookies for the upgrade; a normal decline.
    #[error("need {cost} cookies, have {balance:.1}")]
    InsufficientFunds { cost: u64, balance: f64 },
    /// Not enough cookies to prestige; a normal decline.
    #[error("need {required} cookies to prestige, have {balance:.1}")]
    InsufficientForPrestige { required: f64, balance: f64 },
    /// Purchases must cost at least one cookie.
    #[error("purchase cost must be > 0")]
    InvalidCost,
    /// No upgrade at this index.
    #[error("unknown upgrade index {0}")]
    UnknownUpgrade(usize),
    /// Prestige level cannot go any higher.
    #[error("prestige level {0} is already the maximum")]
    PrestigeCapped(u32),
}

impl EconError {
    /// True for the "not enough cookies" declines, false for invalid input.
    pub fn is_insufficient(&self) -> bool {
        matches!(
            self,
            EconError::InsufficientFunds { .. } | EconError::InsufficientForPrestige { .. }
        )
    }
}

/// A completed upgrade purchase.
#[derive(Clone, Debug, PartialEq)]
pub struct Purchase {
    pub index: usize,
    pub cost: u64,
    /// Level after the purchase.
    pub level: u32,
}

/// A completed prestige.
#[derive(Clone, Debug, PartialEq)]
pub struct Prestige {
    pub level: u32,
    pub multiplier: f64,
}

/// Multiplier granted by `level` prestiges: `1 + level * bonus`, additive.
pub fn prestige_multiplier(level: u32, bonus: f64) -> f64 {
    1.0 + level as f64 * bonus
}

/// Balance, income, upgrades and prestige state for one session.
#[derive(Clone, Debug)]
pub struct Economy {
    upgrades: Vec<Upgrade>,
    balance: f64,
    income: f64,
    prestige_level: u32,
    prestige_multiplier: f64,
    ticks_per_second: u32,
    prestige_cost: f64,
    prestige_bonus: f64,
}

impl Economy {
    /// Build a fresh economy. Invalid settings are replaced by their
    /// fallbacks; call [`GameConfig::audit`] to report them.
    pub fn new(config: &GameConfig) -> Self {
        let prestige_bonus = if config.prestige_bonus.is_finite() && config.prestige_bonus >= 0.0 {
            config.prestige_bonus
        } else {
            idle_core::DEFAULT_PRESTIGE_BONUS
        };
        let prestige_cost = if config.prestige_cost.is_finite() && config.prestige_cost > 0.0 {
            config.prestige_cost
        } else {
            idle_core::DEFAULT_PRESTIGE_COST
        };
        Self {
            upgrades: config.upgrades.iter().cloned().map(Upgrade::new).collect(),
            balance: 0.0,
            income: 0.0,
            prestige_level: 0,
            prestige_multiplier: 1.0,
            ticks_per_second: config.effective_ticks_per_second(),
            prestige_cost,
            prestige_bonus,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Income computed by the last [`Economy::accrue`], before the prestige
    /// multiplier.
    pub fn income(&self) -> f64 {
        self.income
    }

    /// Effective cookies per second at the last accrual.
    pub fn effective_income(&self) -> f64 {
        self.income * self.prestige_multiplier
    }

    pub fn prestige_level(&self) -> u32 {
        self.prestige_level
    }

    pub fn prestige_multiplier(&self) -> f64 {
        self.prestige_multiplier
    }

    pub fn prestige_cost(&self) -> f64 {
        self.prestige_cost
    }

    pub fn prestige_bonus(&self) -> f64 {
        self.prestige_bonus
    }

    pub fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }

    pub fn upgrades(&self) -> &[Upgrade] {
        &self.upgrades
    }

    pub fn upgrade(&self, index: usize) -> Option<&Upgrade> {
        self.upgrades.get(index)
    }

    /// Sum of all upgrade levels.
    pub fn total_upgrade_levels(&self) -> u64 {
        self.upgrades.iter().map(|u| u.level() as u64).sum()
    }

    /// Sum of every upgrade's current income, without the multiplier.
    pub fn current_income(&self) -> f64 {
        self.upgrades.iter().map(Upgrade::income_per_tick).sum()
    }

    pub fn can_afford(&self, cost: u64) -> bool {
        self.balance >= cost as f64
    }

    pub fn can_prestige(&self) -> bool {
        self.balance >= self.prestige_cost
    }

    /// One tick of passive income: `income * multiplier / ticks_per_second`.
    ///
    /// The per-second rate does not depend on the tick rate. Returns the
    /// amount added.
    pub fn accrue(&mut self) -> f64 {
        self.income = self.current_income();
        let gain = self.income * self.prestige_multiplier / self.ticks_per_second as f64;
        self.balance += gain;
        gain
    }

    /// One manual click worth `1 * multiplier`. Returns the amount added.
    pub fn click(&mut self) -> f64 {
        let value = self.prestige_multiplier;
        self.balance += value;
        value
    }

    /// Pay `cost` for one level of upgrade `index`.
    ///
    /// The caller passes the price it read; on a decline it should re-read
    /// [`Upgrade::price`] before retrying.
    pub fn purchase(&mut self, index: usize, cost: u64) -> Result<Purchase, EconError> {
        if cost == 0 {
            warn!(index, "rejecting zero-cost purchase");
            return Err(EconError::InvalidCost);
        }
        let balance = self.balance;
        let authorized = balance >= cost as f64;
        let upgrade = self.upgrades.get_mut(index).ok_or_else(|| {
            warn!(index, "purchase of unknown upgrade");
            EconError::UnknownUpgrade(index)
        })?;
        if !authorized {
            info!(upgrade = %upgrade.name(), cost, balance, "not enough cookies");
            return Err(EconError::InsufficientFunds { cost, balance });
        }
        self.balance -= cost as f64;
        upgrade.purchase(true);
        debug!(upgrade = %upgrade.name(), cost, level = upgrade.level(), "purchased");
        Ok(Purchase {
            index,
            cost,
            level: upgrade.level(),
        })
    }

    /// Buy upgrade `index` at its current price.
    pub fn buy(&mut self, index: usize) -> Result<Purchase, EconError> {
        let price = self
            .upgrades
            .get(index)
            .map(Upgrade::price)
            .ok_or(EconError::UnknownUpgrade(index))?;
        self.purchase(index, price)
    }

    /// Reset balance and upgrades for a permanent multiplier bump.
    pub fn prestige(&mut self) -> Result<Prestige, EconError> {
        if !self.can_prestige() {
            info!(
                required = self.prestige_cost,
                balance = self.balance,
                "not enough cookies to prestige"
            );
            return Err(EconError::InsufficientForPrestige {
                required: self.prestige_cost,
                balance: self.balance,
            });
        }
        let Some(level) = self.prestige_level.checked_add(1) else {
            warn!(level = self.prestige_level, "prestige level at maximum");
            return Err(EconError::PrestigeCapped(self.prestige_level));
        };
        self.balance = 0.0;
        for u in &mut self.upgrades {
            u.reset();
        }
        self.prestige_level = level;
        self.prestige_multiplier = prestige_multiplier(self.prestige_level, self.prestige_bonus);
        info!(
            level = self.prestige_level,
            multiplier = self.prestige_multiplier,
            "prestiged"
        );
        Ok(Prestige {
            level: self.prestige_level,
            multiplier: self.prestige_multiplier,
        })
    }

    /// Pay out a reward. Non-positive or non-finite amounts are ignored.
    pub fn grant(&mut self, amount: f64) -> f64 {
        if !(amount.is_finite() && amount > 0.0) {
            return 0.0;
        }
        self.balance += amount;
        amount
    }

    /// Restore the balance from a save. Negative or non-finite values
    /// become 0.
    pub fn restore_balance(&mut self, balance: f64) {
        if !(balance.is_finite() && balance >= 0.0) {
            warn!(balance, "invalid saved balance, starting from 0");
            self.balance = 0.0;
            return;
        }
        self.balance = balance;
    }

    /// Restore the prestige level. The multiplier is always recomputed from
    /// the level; a disagreeing stored value is reported and dropped.
    pub fn restore_prestige(&mut self, level: u32, stored_multiplier: Option<f64>) {
        self.prestige_level = level;
        self.prestige_multiplier = prestige_multiplier(level, self.prestige_bonus);
        if let Some(stored) = stored_multiplier {
            if (stored - self.prestige_multiplier).abs() > 1e-6 {
                warn!(
                    stored,
                    computed = self.prestige_multiplier,
                    "saved prestige multiplier disagrees with level, using computed"
                );
            }
        }
    }

    /// Restore one upgrade level; see [`Upgrade::set_level`].
    pub fn restore_upgrade_level(&mut self, index: usize, level: i64) -> bool {
        match self.upgrades.get_mut(index) {
            Some(u) => u.set_level(level),
            None => false,
        }
    }
}
