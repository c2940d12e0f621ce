#![deny(warnings)]

//! Headless driver: plays a session on a simulated clock and prints a report.

mod report;

use anyhow::{Context, Result};
use idle_core::GameConfig;
use idle_econ::EconError;
use idle_objectives::ObjectiveEvent;
use idle_runtime::{Game, GameEvent, ManualClock};
use persistence::{default_save_path, JsonFileStore, SaveStore};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    save: Option<String>,
    seconds: Option<f64>,
    clicks_per_second: Option<f64>,
    auto_buy: bool,
    auto_prestige: bool,
    fresh: bool,
    version: bool,
}

fn parse_args<I: Iterator<Item = String>>(mut it: I) -> Args {
    let mut args = Args::default();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next(),
            "--save" => args.save = it.next(),
            "--seconds" => args.seconds = it.next().and_then(|s| s.parse().ok()),
            "--clicks-per-second" => {
                args.clicks_per_second = it.next().and_then(|s| s.parse().ok())
            }
            "--auto-buy" => args.auto_buy = true,
            "--auto-prestige" => args.auto_prestige = true,
            "--fresh" => args.fresh = true,
            "--version" => args.version = true,
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    args
}

/// Running totals of what the session announced.
#[derive(Debug, Default)]
struct Tally {
    clicks: u64,
    ticks: u64,
    purchases: u64,
    prestiges: u64,
    objectives: u64,
    timed_won: u64,
    timed_lost: u64,
}

impl Tally {
    fn record(&mut self, event: &GameEvent) {
        match event {
            GameEvent::Clicked { .. } => self.clicks += 1,
            GameEvent::Ticked { .. } => self.ticks += 1,
            GameEvent::Purchased(_) => self.purchases += 1,
            GameEvent::Prestiged(_) => self.prestiges += 1,
            GameEvent::Objective(ObjectiveEvent::Completed { .. }) => self.objectives += 1,
            GameEvent::Objective(ObjectiveEvent::TimedSucceeded { .. }) => self.timed_won += 1,
            GameEvent::Objective(ObjectiveEvent::TimedExpired { .. }) => self.timed_lost += 1,
            GameEvent::Objective(ObjectiveEvent::TimedStarted { .. }) | GameEvent::Restored => {}
        }
    }
}

/// Index of the cheapest upgrade the balance covers.
fn cheapest_affordable(game: &Game) -> Option<usize> {
    let econ = game.economy();
    econ.upgrades()
        .iter()
        .enumerate()
        .filter(|(_, u)| econ.can_afford(u.price()))
        .min_by_key(|(_, u)| u.price())
        .map(|(i, _)| i)
}

fn auto_buy(game: &mut Game) {
    while let Some(index) = cheapest_affordable(game) {
        match game.buy(index) {
            Ok(p) => debug!(index = p.index, level = p.level, "auto-buy"),
            Err(e) if e.is_insufficient() => break,
            Err(e) => {
                warn!(error = %e, "auto-buy stopped");
                break;
            }
        }
    }
}

fn auto_prestige(game: &mut Game) {
    if !game.economy().can_prestige() {
        return;
    }
    match game.prestige() {
        Ok(p) => info!(level = p.level, multiplier = p.multiplier, "auto-prestige"),
        Err(EconError::InsufficientForPrestige { .. } | EconError::PrestigeCapped(_)) => {}
        Err(e) => warn!(error = %e, "auto-prestige failed"),
    }
}

fn load_config(path: Option<&str>) -> Result<GameConfig> {
    match path {
        Some(p) => GameConfig::load_yaml(p).with_context(|| format!("loading config {p}")),
        None => Ok(GameConfig::default()),
    }
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args(std::env::args().skip(1));
    if args.version {
        println!(
            "cookie-idle {} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
        return Ok(());
    }
    info!(?args, "starting CLI");

    let config = load_config(args.config.as_deref())?;
    let mut store = JsonFileStore::new(args.save.as_deref().unwrap_or(default_save_path()));
    let mut game = if args.fresh {
        Game::new(&config)
    } else {
        Game::from_store(&config, &store)
    };

    let tally = Arc::new(Mutex::new(Tally::default()));
    let sink = Arc::clone(&tally);
    game.subscribe(move |ev: &GameEvent| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(ev)
    });

    let seconds = args.seconds.unwrap_or(60.0).max(0.0);
    let cps = args.clicks_per_second.unwrap_or(0.0).max(0.0);
    let step = game.gate().interval();
    let mut clock = ManualClock::new();
    let mut pending_clicks = 0.0;
    let mut now = 0.0;
    while now < seconds {
        now = clock.advance(step);
        pending_clicks += cps * step;
        while pending_clicks >= 1.0 {
            game.click();
            pending_clicks -= 1.0;
        }
        game.poll(&clock);
        if args.auto_buy {
            auto_buy(&mut game);
        }
        if args.auto_prestige {
            auto_prestige(&mut game);
        }
    }

    println!("{}", report::Report { game: &game, now });
    {
        let t = tally.lock().unwrap_or_else(PoisonError::into_inner);
        println!(
            "Session | {:.1}s | ticks: {} | clicks: {} | purchases: {} | prestiges: {} | objectives: {} | timed won/lost: {}/{}",
            now, t.ticks, t.clicks, t.purchases, t.prestiges, t.objectives, t.timed_won, t.timed_lost
        );
    }

    store
        .save(&game.snapshot())
        .with_context(|| format!("saving to {}", store.path().display()))?;
    Ok(())
}
